use tessel_common::Element;
use tessel_runtime::sync::{PipelineError, PipelineRing, StageCounter};

use super::{BlockTask, OperandSlice};
use crate::components::{GlobalTensor, GlobalView, MatrixLayout, MmadConfig, TilingScheme, tile::OperandTile};

/// The copy engine of a core, moving operand tiles from off-chip memory into the L1 rings.
pub struct CopyEngine<'a, E: Element> {
    a: &'a GlobalTensor<E>,
    b: &'a GlobalTensor<E>,
    tiling: TilingScheme,
    shuffle_offset: Option<usize>,
}

impl<'a, E: Element> CopyEngine<'a, E> {
    /// With `shuffle_k`, each core starts its loads at a different K chunk so cores hit
    /// different memory banks. Only the load order changes, never the tile contents.
    pub fn new(
        a: &'a GlobalTensor<E>,
        b: &'a GlobalTensor<E>,
        tiling: TilingScheme,
        config: &MmadConfig,
        core_idx: usize,
    ) -> Self {
        Self {
            a,
            b,
            tiling,
            shuffle_offset: config.shuffle_k.then_some(core_idx),
        }
    }

    /// Loads every L1 tile of `tasks` in order, staying at most `preload` blocks ahead of the
    /// matrix unit.
    pub fn run(
        &self,
        l1_a: &PipelineRing<OperandTile<E>>,
        l1_b: &PipelineRing<OperandTile<E>>,
        progress: &StageCounter,
        tasks: &[BlockTask],
        preload: usize,
    ) -> Result<(), PipelineError> {
        let mut stage = 0u64;

        for (block, task) in tasks.iter().enumerate() {
            progress.wait_for(block.saturating_sub(preload) as u64)?;

            for k_tile in 0..task.actual.k.div_ceil(self.tiling.l1.k) {
                l1_a.produce(stage, |dst| self.load_a(task, k_tile, dst))?;
                l1_b.produce(stage, |dst| self.load_b(task, k_tile, dst))?;
                stage += 1;
            }
        }

        Ok(())
    }

    /// Loads the `m × k` L1 tile `k_tile` of the left operand.
    pub fn load_a(&self, task: &BlockTask, k_tile: usize, dst: &mut OperandTile<E>) {
        let (k_start, width) = self.k_range(task, k_tile);
        dst.reshape(task.actual.m, width);

        self.a.read(|view| {
            for chunk in self.chunk_order(width) {
                let (start, len) = self.chunk(chunk, width);
                for row in 0..task.actual.m {
                    let out = &mut dst.row_mut(row)[start..start + len];
                    gather_row(view, &task.a, row, k_start + start, out);
                }
            }
        });
    }

    /// Loads the `k × n` L1 tile `k_tile` of the right operand.
    pub fn load_b(&self, task: &BlockTask, k_tile: usize, dst: &mut OperandTile<E>) {
        let (k_start, width) = self.k_range(task, k_tile);
        dst.reshape(width, task.actual.n);

        self.b.read(|view| {
            for chunk in self.chunk_order(width) {
                let (start, len) = self.chunk(chunk, width);
                for row in start..start + len {
                    gather_row(view, &task.b, k_start + row, 0, dst.row_mut(row));
                }
            }
        });
    }

    fn k_range(&self, task: &BlockTask, k_tile: usize) -> (usize, usize) {
        let start = k_tile * self.tiling.l1.k;
        (start, self.tiling.l1.k.min(task.actual.k - start))
    }

    fn chunk(&self, chunk: usize, width: usize) -> (usize, usize) {
        let start = chunk * self.tiling.l0.k;
        (start, self.tiling.l0.k.min(width - start))
    }

    fn chunk_order(&self, width: usize) -> impl Iterator<Item = usize> {
        let chunks = width.div_ceil(self.tiling.l0.k).max(1);
        let first = self.shuffle_offset.map(|offset| offset % chunks).unwrap_or(0);
        (0..chunks).map(move |index| (first + index) % chunks)
    }
}

// Row-major sources are contiguous along the row, everything else is gathered.
fn gather_row<E: Element>(
    view: &GlobalView<'_, E>,
    slice: &OperandSlice,
    row: usize,
    column: usize,
    out: &mut [E],
) {
    match slice.layout {
        MatrixLayout::RowMajor(_) => view.copy_to(slice.offset(row, column), out),
        _ => {
            for (index, value) in out.iter_mut().enumerate() {
                *value = view.get(slice.offset(row, column + index));
            }
        }
    }
}
