mod order;
mod scheduler;

pub use order::*;
pub use scheduler::*;
