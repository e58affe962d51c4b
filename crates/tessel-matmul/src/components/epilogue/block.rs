use tessel_common::Element;
use tessel_runtime::{LaunchError, sync::PipelineRing};

use super::{
    DequantParams, EpilogueConfig, EpiloguePath, EpilogueTileSwizzle, TileBroadcastOneBlk,
    TileCast, TileCopy, TileMuls, TileOneBlkColumnBroadcastMul, TileRowBroadcastMul,
    tile::is_dense_row_major,
};
use crate::components::{
    Accumulator, GlobalTensor, MatmulSetupError, MatrixCoord,
    global::{BlockTask, OperandSlice, fixpipe_convert},
    tile::AccumulatorTile,
};

/// Where the epilogue reads the accumulator of a block from.
pub enum AccumulatorSource<'s, Acc: Accumulator> {
    /// An off-chip workspace region written by the matrix unit.
    Workspace {
        tensor: &'s GlobalTensor<Acc>,
        slice: OperandSlice,
    },
    /// An accumulator handed over directly.
    Tile(&'s AccumulatorTile<Acc>),
}

impl<Acc: Accumulator> AccumulatorSource<'_, Acc> {
    /// Copies the `shape` region at `origin` of the block into `dst`, row-major.
    fn load(&self, origin: MatrixCoord, shape: MatrixCoord, dst: &mut Vec<Acc>) {
        dst.clear();
        dst.resize(shape.count(), Acc::default());
        if shape.column == 0 {
            return;
        }

        match self {
            AccumulatorSource::Workspace { tensor, slice } => tensor.read(|view| {
                let contiguous = is_dense_row_major(&slice.layout);
                for (row, values) in dst.chunks_exact_mut(shape.column).enumerate() {
                    let row = origin.row + row;
                    match contiguous {
                        true => view.copy_to(slice.offset(row, origin.column), values),
                        false => {
                            for (column, value) in values.iter_mut().enumerate() {
                                *value = view.get(slice.offset(row, origin.column + column));
                            }
                        }
                    }
                }
            }),
            AccumulatorSource::Tile(tile) => {
                for (row, values) in dst.chunks_exact_mut(shape.column).enumerate() {
                    let src = tile.row(origin.row + row);
                    values.copy_from_slice(&src[origin.column..origin.column + shape.column]);
                }
            }
        }
    }
}

/// One UB stage: an accumulator tile and the scales it needs.
struct UbStage<Acc, ES> {
    acc: Vec<Acc>,
    row_scale: Vec<ES>,
    column_scale: Vec<ES>,
    /// First element of the tile inside the block.
    origin: MatrixCoord,
    shape: MatrixCoord,
}

/// Dequantizes and stores the accumulator of each block handed to the vector unit.
///
/// The rows of a block are split between the vector sub-blocks, each walks its rows tile by tile.
/// Tiles stream through a UB ring so the load of a tile overlaps the compute of the previous one.
/// Per tile: cast to f32, per-token scale, per-column scale, scalar scale, cast to the output
/// type, masked store.
pub struct BlockEpilogue<'a, Acc: Accumulator, ES: Element, EO: Element> {
    config: EpilogueConfig,
    path: EpiloguePath,
    params: DequantParams<'a, ES>,
    out: &'a GlobalTensor<EO>,
    ub: PipelineRing<UbStage<Acc, ES>>,
    compute: Vec<f32>,
    broadcast: Vec<f32>,
    columns: Vec<f32>,
    store: Vec<EO>,
    issued: u64,
}

impl<'a, Acc: Accumulator, ES: Element, EO: Element> BlockEpilogue<'a, Acc, ES, EO> {
    pub fn new(
        config: EpilogueConfig,
        params: DequantParams<'a, ES>,
        out: &'a GlobalTensor<EO>,
    ) -> Result<Self, MatmulSetupError> {
        let path = params.path()?;
        let elems = config.tile.count();
        let ub = PipelineRing::new("ub", config.ub_stages, || UbStage {
            acc: Vec::with_capacity(elems),
            row_scale: Vec::with_capacity(config.tile.row),
            column_scale: Vec::with_capacity(config.tile.column),
            origin: MatrixCoord::default(),
            shape: MatrixCoord::default(),
        });

        Ok(Self {
            config,
            path,
            params,
            out,
            ub,
            compute: Vec::with_capacity(elems),
            broadcast: Vec::with_capacity(config.tile.row * super::ONE_BLK_F32),
            columns: Vec::with_capacity(config.tile.column),
            store: Vec::with_capacity(elems),
            issued: 0,
        })
    }

    pub fn path(&self) -> EpiloguePath {
        self.path
    }

    /// Runs the epilogue over the valid region of `task`.
    pub fn run(
        &mut self,
        task: &BlockTask,
        source: &AccumulatorSource<'_, Acc>,
    ) -> Result<(), LaunchError> {
        let Self {
            config,
            path,
            params,
            out,
            ub,
            compute,
            broadcast,
            columns,
            store,
            issued,
        } = self;
        let path = *path;
        let params = *params;

        for sub_block in 0..config.sub_blocks {
            let first_row = sub_block * config.rows_per_sub_block;
            if first_row >= task.actual.m {
                break;
            }

            let rows = config.rows_per_sub_block.min(task.actual.m - first_row);
            let swizzle = EpilogueTileSwizzle::new(MatrixCoord::new(rows, task.actual.n), config.tile);
            let count = swizzle.count() as u64;

            ub.stream::<LaunchError, _, _>(
                *issued,
                count,
                |index, stage| {
                    let local = swizzle.tile_origin(index as usize);
                    stage.shape = swizzle.actual_tile_shape(local);
                    stage.origin = MatrixCoord::new(first_row, 0) + local;
                    source.load(stage.origin, stage.shape, &mut stage.acc);

                    if let Some(scales) = params.per_token.filter(|_| path.per_token()) {
                        stage.row_scale.resize(stage.shape.row, ES::default());
                        scales.read(|view| {
                            view.copy_to(task.row_scale + stage.origin.row, &mut stage.row_scale)
                        });
                    }
                    if let Some(scales) = params.per_column.filter(|_| path.per_column()) {
                        stage.column_scale.resize(stage.shape.column, ES::default());
                        scales.read(|view| {
                            view.copy_to(
                                task.column_scale + stage.origin.column,
                                &mut stage.column_scale,
                            )
                        });
                    }
                    Ok(())
                },
                |_, stage| {
                    let width = stage.shape.column;
                    match path {
                        EpiloguePath::Identity => {
                            store.clear();
                            store.extend(
                                stage
                                    .acc
                                    .iter()
                                    .map(|value| fixpipe_convert::<Acc, EO>(*value, None)),
                            );
                        }
                        _ => {
                            TileCast::to_f32(&stage.acc, compute);
                            if path.per_token() {
                                TileBroadcastOneBlk::apply(&stage.row_scale, broadcast);
                                TileOneBlkColumnBroadcastMul::apply(compute, width, broadcast);
                            }
                            if path.per_column() {
                                TileCast::to_f32(&stage.column_scale, columns);
                                TileRowBroadcastMul::apply(compute, width, columns);
                            }
                            if let Some(scalar) = params.scalar {
                                TileMuls::apply(compute, scalar);
                            }
                            TileCast::from_f32(compute, store);
                        }
                    }

                    out.write(|view| TileCopy::store(view, &task.c, stage.origin, width, store));
                    Ok(())
                },
            )?;
            *issued += count;
        }

        Ok(())
    }
}
