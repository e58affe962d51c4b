//! Tiled, quantized matmul kernels for multi-core matrix accelerators.
//!
//! Every kernel follows the same shape: a [block scheduler](components::batch::BlockScheduler)
//! hands output tiles to cores, each core runs a [block mmad](components::global::BlockMmad)
//! that stages operands through L1 and L0 rings, and an
//! [epilogue](components::epilogue::BlockEpilogue) dequantizes the accumulators on the vector
//! sub-blocks before they reach off-chip memory.

/// Components for matrix multiplication
pub mod components;
/// Contains matmul kernels
pub mod kernels;

#[cfg(any(test, feature = "export_tests"))]
pub mod tests;

/// Host reference and comparators for checking kernel outputs
pub mod verification;

mod base;

pub use base::*;
