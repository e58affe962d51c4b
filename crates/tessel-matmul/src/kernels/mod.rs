/// Plain matmul with any operand layouts.
pub mod basic;
/// Independent problems at fixed strides.
pub mod batched;
/// Problems concatenated along K, dequantized per token and per column.
pub mod grouped;
/// Problems concatenated along M.
pub mod grouped_slice_m;
/// Quant matmul repacking unaligned operands first.
pub mod optimized;
/// Quant matmul with a per-token epilogue fed through a workspace ring.
pub mod quant;

mod base;
mod padding;

pub use padding::{PaddedOperand, needs_padding};
