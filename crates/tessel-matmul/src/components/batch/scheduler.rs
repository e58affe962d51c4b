use core::{iter::StepBy, ops::Range};

use super::BlockOrder;
use crate::components::{GemmCoord, MatrixCoord, TileSize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Maps the loop indices of a launch to output blocks, and spreads them over cores.
///
/// A launch covers `batch_count` copies of the `ceil(m / tile.m) × ceil(n / tile.n)` block grid;
/// K is reduced inside the block mmad and never split across cores. Core `c` of `C` visits the
/// loop indices `c, c + C, c + 2C, …`, a static partition that doesn't depend on timing.
pub struct BlockScheduler {
    problem: GemmCoord,
    tile: TileSize,
    order: BlockOrder,
    loops: MatrixCoord,
    batch_count: usize,
}

impl BlockScheduler {
    pub fn new(problem: GemmCoord, tile: TileSize, order: BlockOrder, batch_count: usize) -> Self {
        let loops = MatrixCoord::new(problem.m.div_ceil(tile.m), problem.n.div_ceil(tile.n));

        Self {
            problem,
            tile,
            order,
            loops,
            batch_count,
        }
    }

    /// Blocks along M and N of one batch.
    pub fn loops_mn(&self) -> MatrixCoord {
        self.loops
    }

    /// Loop indices of the whole launch.
    pub fn core_loops(&self) -> usize {
        self.loops.count() * self.batch_count
    }

    /// Number of cores that receive work when `core_num` are available.
    pub fn cores_used(&self, core_num: usize) -> usize {
        core_num.min(self.core_loops())
    }

    /// Batch and block coordinates of loop index `index`.
    pub fn block_coord(&self, index: usize) -> (usize, GemmCoord) {
        let per_batch = self.loops.count();
        let block = self.order.block_of(index % per_batch, self.loops);

        (index / per_batch, GemmCoord::new(block.row, block.column, 0))
    }

    /// Extents of a block, clipped at the problem boundary.
    pub fn actual_block_shape(&self, block: GemmCoord) -> GemmCoord {
        GemmCoord::new(
            self.tile.m.min(self.problem.m - block.m * self.tile.m),
            self.tile.n.min(self.problem.n - block.n * self.tile.n),
            self.problem.k,
        )
    }

    /// First element of a block in the output.
    pub fn block_origin(&self, block: GemmCoord) -> MatrixCoord {
        MatrixCoord::new(block.m * self.tile.m, block.n * self.tile.n)
    }

    /// Loop indices visited by core `core_idx` out of `core_num`.
    pub fn loop_indices(&self, core_idx: usize, core_num: usize) -> StepBy<Range<usize>> {
        (core_idx..self.core_loops()).step_by(core_num.max(1))
    }

    /// Loop indices of core `core_idx` when the grid-stride loop starts at core `start_core`.
    ///
    /// Launches made of several scheduled problems rotate the start core so the partial last
    /// wave of each problem lands on different cores.
    pub fn loop_indices_from(
        &self,
        core_idx: usize,
        core_num: usize,
        start_core: usize,
    ) -> StepBy<Range<usize>> {
        let core_num = core_num.max(1);
        let first = match core_idx < start_core {
            true => core_idx + core_num - start_core,
            false => core_idx - start_core,
        };
        (first..self.core_loops()).step_by(core_num)
    }

    /// Start core of the problem scheduled after this one.
    pub fn next_start_core(&self, start_core: usize, core_num: usize) -> usize {
        (start_core + self.core_loops()) % core_num.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::batch::SwizzleDirection;

    fn scheduler(m: usize, n: usize, batch_count: usize) -> BlockScheduler {
        BlockScheduler::new(
            GemmCoord::new(m, n, 64),
            TileSize::new(128, 256, 64),
            BlockOrder::Swizzle {
                offset: 3,
                direction: SwizzleDirection::Zn,
            },
            batch_count,
        )
    }

    #[test_log::test]
    fn grid_stride_covers_every_index_once() {
        let scheduler = scheduler(1000, 700, 2);
        let core_num = 7;
        let mut visited = (0..core_num)
            .flat_map(|core| scheduler.loop_indices(core, core_num))
            .collect::<Vec<_>>();
        visited.sort_unstable();

        assert_eq!(scheduler.core_loops(), 8 * 3 * 2);
        assert_eq!(visited, (0..scheduler.core_loops()).collect::<Vec<_>>());
    }

    #[test_log::test]
    fn edge_blocks_are_clipped() {
        let scheduler = scheduler(300, 300, 1);

        assert_eq!(
            scheduler.actual_block_shape(GemmCoord::new(2, 1, 0)),
            GemmCoord::new(44, 44, 64)
        );
        assert_eq!(
            scheduler.actual_block_shape(GemmCoord::new(0, 0, 0)),
            GemmCoord::new(128, 256, 64)
        );
    }

    #[test_log::test]
    fn batches_follow_each_other() {
        let scheduler = scheduler(256, 256, 3);

        let (batch, block) = scheduler.block_coord(5);

        assert_eq!(batch, 2);
        assert_eq!(block, GemmCoord::new(1, 0, 0));
    }

    #[test_log::test]
    fn rotated_start_balances_tail_blocks() {
        // 3 blocks per problem on 4 cores.
        let scheduler = scheduler(384, 256, 1);
        let core_num = 4;

        let first = (0..core_num)
            .map(|core| scheduler.loop_indices_from(core, core_num, 0).count())
            .collect::<Vec<_>>();
        let start = scheduler.next_start_core(0, core_num);
        let second = (0..core_num)
            .map(|core| scheduler.loop_indices_from(core, core_num, start).count())
            .collect::<Vec<_>>();

        assert_eq!(first, vec![1, 1, 1, 0]);
        assert_eq!(start, 3);
        assert_eq!(second, vec![1, 1, 0, 1]);
    }
}
