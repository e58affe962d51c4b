mod copy;
mod fixpipe;
mod mmad;
mod task;

pub use copy::*;
pub use fixpipe::*;
pub use mmad::*;
pub use task::*;
