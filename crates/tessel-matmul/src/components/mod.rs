/// Scheduling of output tiles over cores.
pub mod batch;
/// Dequantization of accumulators on the vector sub-blocks.
pub mod epilogue;
/// Per-core matmul driving the copy engine and the matrix unit.
pub mod global;
/// Staging of L1 tiles through the L0 buffers.
pub mod stage;
/// Matrix unit instructions on L0 tiles.
pub mod tile;

mod coord;
mod dispatch;
mod error;
mod layout;
mod problem;
mod resource;
mod selection;
mod spec;
mod tensor;
mod tiling_scheme;

pub use coord::*;
pub use dispatch::*;
pub use error::*;
pub use layout::*;
pub use problem::*;
pub use resource::*;
pub use selection::*;
pub use spec::*;
pub use tensor::*;
pub use tiling_scheme::*;
