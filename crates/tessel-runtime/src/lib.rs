#![warn(missing_docs)]

//! Execution context of the Tessel engine: device properties, off-chip memory, configuration,
//! logging and the signals used between units and cores.

/// Compute client, the explicit context passed to every kernel.
pub mod client;

/// Global configuration.
pub mod config;

/// Per-core launch context.
pub mod kernel;

/// Launch logging and profiling.
pub mod logging;

/// Off-chip memory.
pub mod memory_management;

/// Device properties.
pub mod properties;

/// Launch errors.
pub mod server;

/// Synchronization primitives.
pub mod sync;

pub use client::ComputeClient;
pub use kernel::CoreContext;
pub use memory_management::Handle;
pub use properties::HardwareProperties;
pub use server::LaunchError;
