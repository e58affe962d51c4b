mod block;
mod config;
mod params;
mod sink;
mod swizzle;
mod tile;

pub use block::*;
pub use config::*;
pub use params::*;
pub use sink::*;
pub use swizzle::*;
pub use tile::*;
