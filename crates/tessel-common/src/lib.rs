#![warn(missing_docs)]

//! Common types shared by the Tessel crates.

/// Captured backtraces for error reports.
pub mod backtrace;

/// Element types understood by the engine.
pub mod element;

/// Random data generation.
pub mod rand;

pub use element::{ElemKind, Element};
