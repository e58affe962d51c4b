use derive_new::new;
use serde::{Deserialize, Serialize};
use tessel_runtime::properties::{BYTES_PER_BLOCK, FRACTAL_SIZE};

use super::{FormattedConfigError, GemmCoord, MatmulSetupError};

#[derive(new, Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Extents of a tile along `m`, `n` and `k`.
pub struct TileSize {
    pub m: usize,
    pub n: usize,
    pub k: usize,
}

impl TileSize {
    /// The extents as a coordinate.
    pub fn shape(&self) -> GemmCoord {
        GemmCoord::new(self.m, self.n, self.k)
    }
}

impl From<(usize, usize, usize)> for TileSize {
    fn from((m, n, k): (usize, usize, usize)) -> Self {
        Self { m, n, k }
    }
}

#[derive(new, Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Tile shapes resident at each on-chip tier.
///
/// The L1 tile is staged from off-chip memory, the L0 tile is staged from L1 into the operand
/// buffers of the matrix unit. Both tiers cover the same output region, the L0 tile splits the
/// L1 reduction depth into `l1.k / l0.k` sub-tiles.
pub struct TilingScheme {
    pub l1: TileSize,
    pub l0: TileSize,
}

impl TilingScheme {
    /// Tiles of the int8 quant matmul kernels.
    pub fn quant_matmul() -> Self {
        Self::new(TileSize::new(128, 256, 512), TileSize::new(128, 256, 128))
    }

    /// Tiles of the half precision kernels and the grouped slice-K kernel.
    pub fn half_matmul() -> Self {
        Self::new(TileSize::new(128, 256, 256), TileSize::new(128, 256, 64))
    }

    /// Tall tiles for problems where `m` dominates.
    pub fn tall_quant_matmul() -> Self {
        Self::new(TileSize::new(256, 128, 512), TileSize::new(256, 128, 128))
    }

    /// Number of L0 sub-tiles in one L1 tile.
    pub fn l0_tiles_per_l1(&self) -> usize {
        self.l1.k / self.l0.k
    }

    /// Checks the divisibility constraints of the matrix unit for inputs of `input_size` bytes.
    pub fn validate(&self, input_size: usize) -> Result<(), MatmulSetupError> {
        let k_align = BYTES_PER_BLOCK / input_size.max(1);
        let Self { l1, l0 } = *self;

        if [l1.m, l1.n, l1.k, l0.m, l0.n, l0.k].contains(&0) {
            return Err(FormattedConfigError::new(move || {
                format!("Tile extents must be positive, got l1={l1:?} l0={l0:?}")
            })
            .into());
        }

        if l0.m != l1.m || l0.n != l1.n {
            return Err(FormattedConfigError::new(move || {
                format!(
                    "L0 tile must cover the L1 output tile, got l1={}x{} l0={}x{}",
                    l1.m, l1.n, l0.m, l0.n
                )
            })
            .into());
        }

        if l1.k % l0.k != 0 {
            return Err(FormattedConfigError::new(move || {
                format!("L1 k={} must be a multiple of L0 k={}", l1.k, l0.k)
            })
            .into());
        }

        if l1.m % FRACTAL_SIZE != 0 || l1.n % FRACTAL_SIZE != 0 {
            return Err(FormattedConfigError::new(move || {
                format!(
                    "Tile m={} and n={} must be multiples of {FRACTAL_SIZE}",
                    l1.m, l1.n
                )
            })
            .into());
        }

        if l0.k % k_align != 0 {
            return Err(FormattedConfigError::new(move || {
                format!("Tile k={} must be a multiple of {k_align}", l0.k)
            })
            .into());
        }

        Ok(())
    }
}

impl Default for TilingScheme {
    fn default() -> Self {
        Self::quant_matmul()
    }
}
