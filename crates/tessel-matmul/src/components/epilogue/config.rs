use serde::{Deserialize, Serialize};
use tessel_common::Element;
use tessel_runtime::HardwareProperties;

use crate::components::{
    FormattedConfigError, MatmulSetupError, MatrixCoord, MemoryTier, OnChipFootprint, TileSize,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// How accumulators travel from the matrix unit to the vector unit.
pub enum EpilogueCadence {
    /// Accumulator tiles are moved through a bounded channel of `l0c_stages` entries.
    Direct,
    /// Accumulators go through a per-core ring of `stages` off-chip int32 slots, so the
    /// epilogue can lag behind the matmul by that many blocks.
    Workspace { stages: usize },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Requested epilogue shape.
pub struct EpilogueSelection {
    /// Rows and columns processed per UB stage.
    pub tile: MatrixCoord,
    /// Slots of the UB ring.
    pub ub_stages: usize,
    pub cadence: EpilogueCadence,
}

impl Default for EpilogueSelection {
    fn default() -> Self {
        Self {
            tile: MatrixCoord::new(32, 256),
            ub_stages: 2,
            cadence: EpilogueCadence::Workspace { stages: 2 },
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
/// Validated epilogue of one launch.
pub struct EpilogueConfig {
    pub tile: MatrixCoord,
    pub ub_stages: usize,
    pub cadence: EpilogueCadence,
    /// Vector sub-blocks sharing the rows of a block.
    pub sub_blocks: usize,
    /// Rows of an L1 block handled by each sub-block.
    pub rows_per_sub_block: usize,
}

impl EpilogueSelection {
    /// Checks the epilogue against the block tile and the UB capacity.
    ///
    /// UB holds `ub_stages` copies of the accumulator, output and scale slices of a tile plus two
    /// f32 temporaries: `ub_stages·(t_m·t_n·(S(Acc) + S(Out)) + (t_m + t_n)·S(Scale)) +
    /// 2·t_m·t_n·4` bytes.
    pub fn resolve<Acc: Element, ES: Element, EO: Element>(
        &self,
        l1: &TileSize,
        properties: &HardwareProperties,
    ) -> Result<EpilogueConfig, MatmulSetupError> {
        let tile = self.tile;
        let sub_blocks = properties.vector_cores_per_core as usize;

        if sub_blocks == 0 {
            return Err(crate::components::MatmulAvailabilityError::NoVectorCores.into());
        }

        if tile.row == 0 || tile.column == 0 || self.ub_stages == 0 {
            return Err(MatmulSetupError::invalid_config(format!(
                "Epilogue tile {}x{} with {} UB stages is empty",
                tile.row, tile.column, self.ub_stages
            )));
        }

        if let EpilogueCadence::Workspace { stages: 0 } = self.cadence {
            return Err(MatmulSetupError::invalid_config(
                "The workspace ring needs at least one stage",
            ));
        }

        let l1_m = l1.m;
        if l1_m % sub_blocks != 0 || (l1_m / sub_blocks) % tile.row != 0 {
            return Err(FormattedConfigError::new(move || {
                format!(
                    "Epilogue tile rows {} must divide the {} rows each of the {sub_blocks} vector sub-blocks handles",
                    tile.row,
                    l1_m / sub_blocks
                )
            })
            .into());
        }

        let elems = tile.count();
        let ub = self.ub_stages
            * (elems * (Acc::size() + EO::size()) + (tile.row + tile.column) * ES::size())
            + 2 * elems * size_of::<f32>();
        OnChipFootprint::default()
            .with(MemoryTier::UB, ub)
            .check(properties)?;

        Ok(EpilogueConfig {
            tile,
            ub_stages: self.ub_stages,
            cadence: self.cadence,
            sub_blocks,
            rows_per_sub_block: l1_m / sub_blocks,
        })
    }
}

#[cfg(test)]
mod tests {
    use half::f16;

    use super::*;

    #[test_log::test]
    fn default_epilogue_fits_the_unified_buffer() {
        let l1 = TileSize::new(128, 256, 512);
        let config = EpilogueSelection::default()
            .resolve::<i32, f16, f16>(&l1, &HardwareProperties::atlas_a2(1))
            .unwrap();

        assert_eq!(config.rows_per_sub_block, 64);
        assert_eq!(config.sub_blocks, 2);
    }

    #[test_log::test]
    fn rejects_oversized_tiles() {
        let l1 = TileSize::new(128, 256, 512);
        let selection = EpilogueSelection {
            tile: MatrixCoord::new(64, 256),
            ub_stages: 2,
            cadence: EpilogueCadence::Direct,
        };

        assert!(
            selection
                .resolve::<i32, f32, f32>(&l1, &HardwareProperties::atlas_a2(1))
                .is_err()
        );
    }

    #[test_log::test]
    fn rows_must_split_between_sub_blocks() {
        let l1 = TileSize::new(96, 256, 512);
        let selection = EpilogueSelection::default();

        assert!(
            selection
                .resolve::<i32, f16, f16>(&l1, &HardwareProperties::atlas_a2(1))
                .is_err()
        );
    }
}
