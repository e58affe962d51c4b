use serde::{Deserialize, Serialize};

use super::{
    DispatchPolicy, MmadSelection, TilingScheme,
    batch::BlockOrderSelection,
    epilogue::{EpilogueCadence, EpilogueSelection},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
/// Everything a kernel launch is configured with, before it is checked against the problem
/// and the device.
pub struct MatmulSelection {
    pub tiling_scheme: TilingScheme,
    pub mmad: MmadSelection,
    pub block_order: BlockOrderSelection,
    pub epilogue: EpilogueSelection,
    /// Requested number of cores. Defaults to every core of the device.
    pub block_dim: Option<u32>,
}

impl MatmulSelection {
    pub fn builder(tiling_scheme: TilingScheme) -> MatmulSelectionBuilder {
        MatmulSelectionBuilder::new().tiling_scheme(tiling_scheme)
    }

    /// Half precision matmul with a raster block order.
    pub fn basic() -> Self {
        Self::builder(TilingScheme::half_matmul()).build()
    }

    /// Int8 matmul with the fixpipe dequantization of the batched kernel.
    pub fn quant() -> Self {
        Self::builder(TilingScheme::quant_matmul())
            .mmad(MmadSelection::new(DispatchPolicy::Pingpong).unit_flag(true))
            .block_order(BlockOrderSelection::Swizzle {
                offset: BlockOrderSelection::SWIZZLE_OFFSET,
            })
            .build()
    }

    /// Int8 matmul of the padded kernel, preloading the next block with shuffled K loads.
    pub fn optimized() -> Self {
        Self::builder(TilingScheme::quant_matmul())
            .mmad(
                MmadSelection::new(DispatchPolicy::Preload)
                    .unit_flag(true)
                    .shuffle_k(true),
            )
            .block_order(BlockOrderSelection::Swizzle {
                offset: BlockOrderSelection::SWIZZLE_OFFSET,
            })
            .build()
    }

    /// Int8 matmul whose per-token epilogue trails the matrix unit through a workspace ring.
    pub fn multistage_workspace() -> Self {
        Self::builder(TilingScheme::quant_matmul())
            .mmad(
                MmadSelection::new(DispatchPolicy::PreloadAsyncWithCallback)
                    .preload_stages(1)
                    .shuffle_k(true),
            )
            .block_order(BlockOrderSelection::Swizzle {
                offset: BlockOrderSelection::SWIZZLE_OFFSET,
            })
            .epilogue(EpilogueSelection {
                cadence: EpilogueCadence::Workspace { stages: 2 },
                ..Default::default()
            })
            .build()
    }

    /// Int8 grouped matmul with a per-token epilogue, a deeper L0B ring streaming the weights.
    pub fn grouped() -> Self {
        let mut mmad = MmadSelection::new(DispatchPolicy::PreloadAsync)
            .preload_stages(1)
            .l0_stages(2)
            .l0c_stages(1);
        mmad.l0b_stages = Some(4);

        Self::builder(TilingScheme::half_matmul())
            .mmad(mmad)
            .block_order(BlockOrderSelection::Swizzle {
                offset: BlockOrderSelection::SWIZZLE_OFFSET,
            })
            .build()
    }
}

impl Default for MatmulSelection {
    fn default() -> Self {
        Self::quant()
    }
}

pub struct MatmulSelectionBuilder {
    tiling_scheme: TilingScheme,
    mmad: MmadSelection,
    block_order: BlockOrderSelection,
    epilogue: EpilogueSelection,
    block_dim: Option<u32>,
}

impl MatmulSelectionBuilder {
    fn new() -> Self {
        Self {
            tiling_scheme: TilingScheme::default(),
            mmad: MmadSelection::default(),
            block_order: BlockOrderSelection::default(),
            epilogue: EpilogueSelection::default(),
            block_dim: None,
        }
    }

    pub fn tiling_scheme(mut self, tiling_scheme: TilingScheme) -> Self {
        self.tiling_scheme = tiling_scheme;
        self
    }

    pub fn mmad(mut self, mmad: MmadSelection) -> Self {
        self.mmad = mmad;
        self
    }

    pub fn block_order(mut self, block_order: BlockOrderSelection) -> Self {
        self.block_order = block_order;
        self
    }

    pub fn epilogue(mut self, epilogue: EpilogueSelection) -> Self {
        self.epilogue = epilogue;
        self
    }

    pub fn block_dim(mut self, block_dim: u32) -> Self {
        self.block_dim = Some(block_dim);
        self
    }

    pub fn build(self) -> MatmulSelection {
        MatmulSelection {
            tiling_scheme: self.tiling_scheme,
            mmad: self.mmad,
            block_order: self.block_order,
            epilogue: self.epilogue,
            block_dim: self.block_dim,
        }
    }
}
