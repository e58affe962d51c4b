use serde::{Deserialize, Serialize};

/// Bytes moved by one copy-engine block, also the granularity of vector instructions.
pub const BYTES_PER_BLOCK: usize = 32;

/// Rows and columns of the native matrix fractal.
pub const FRACTAL_SIZE: usize = 16;

/// Properties of the accelerator a compute client simulates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareProperties {
    /// Number of cores, each with one matrix unit.
    pub core_count: u32,
    /// Vector sub-blocks attached to each core.
    pub vector_cores_per_core: u32,
    /// L1 buffer capacity in bytes.
    pub l1_size: usize,
    /// L0A (left operand) buffer capacity in bytes.
    pub l0a_size: usize,
    /// L0B (right operand) buffer capacity in bytes.
    pub l0b_size: usize,
    /// L0C (accumulator) buffer capacity in bytes.
    pub l0c_size: usize,
    /// Unified (vector) buffer capacity in bytes.
    pub ub_size: usize,
}

impl HardwareProperties {
    /// An A2-class part with the given number of cores.
    pub fn atlas_a2(core_count: u32) -> Self {
        Self {
            core_count,
            vector_cores_per_core: 2,
            l1_size: 512 * 1024,
            l0a_size: 64 * 1024,
            l0b_size: 64 * 1024,
            l0c_size: 128 * 1024,
            ub_size: 192 * 1024,
        }
    }

    /// Elements of `size` bytes held by one block.
    pub fn elems_per_block(size: usize) -> usize {
        BYTES_PER_BLOCK / size
    }
}

impl Default for HardwareProperties {
    fn default() -> Self {
        Self::atlas_a2(24)
    }
}
