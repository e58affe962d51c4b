/// Kernel launch config module.
pub mod kernel;
/// Off-chip memory config module.
pub mod memory;
/// Operand padding config module.
pub mod padding;
/// Profiling config module.
pub mod profiling;

mod base;
mod logger;

pub use base::*;
pub use logger::{LogCrateLevel, LogLevel, Logger, LoggerConfig};
