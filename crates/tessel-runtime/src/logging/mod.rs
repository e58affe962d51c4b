mod client;
mod profiling;

pub use client::*;
pub use profiling::*;
