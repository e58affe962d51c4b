mod accumulator;
mod mmad;
mod operand;

pub use accumulator::*;
pub use mmad::*;
pub use operand::*;
