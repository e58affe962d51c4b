use derive_new::new;

use crate::components::{GemmCoord, Layout, MatrixCoord, MatrixLayout};

#[derive(new, Clone, Copy, Debug, PartialEq, Eq)]
/// Where a block reads or writes one operand.
///
/// `base` selects the batch or group inside the buffer, `origin` is the first element of the
/// block in the coordinates of `layout`.
pub struct OperandSlice {
    pub base: usize,
    pub layout: MatrixLayout,
    pub origin: MatrixCoord,
}

impl OperandSlice {
    /// Buffer offset of element `(row, column)` of the block.
    pub fn offset(&self, row: usize, column: usize) -> usize {
        self.base + self.layout.offset(self.origin + MatrixCoord::new(row, column))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// One output block assigned to a core.
pub struct BlockTask {
    /// Loop index the scheduler produced the block from.
    pub index: usize,
    /// Batch or group of the block.
    pub group: usize,
    /// Tile coordinates of the block.
    pub block: GemmCoord,
    /// Extents of the block, clipped at the problem boundary. `k` is the full reduction depth.
    pub actual: GemmCoord,
    pub a: OperandSlice,
    pub b: OperandSlice,
    pub c: OperandSlice,
    /// Offset of the first per-token scale of the block.
    pub row_scale: usize,
    /// Offset of the first per-column scale of the block.
    pub column_scale: usize,
}

#[derive(new, Clone, Copy, Debug, PartialEq, Eq)]
/// Operands of one batch or group: slices at the origin of its sub-problem, plus the offsets of
/// its scales.
pub struct ProblemOperands {
    pub group: usize,
    pub a: OperandSlice,
    pub b: OperandSlice,
    pub c: OperandSlice,
    pub row_scale: usize,
    pub column_scale: usize,
}

impl ProblemOperands {
    /// Task of the block at `origin` of the sub-problem.
    pub fn task(
        &self,
        index: usize,
        block: GemmCoord,
        origin: MatrixCoord,
        actual: GemmCoord,
    ) -> BlockTask {
        let shift = |slice: &OperandSlice, by: MatrixCoord| {
            OperandSlice::new(slice.base, slice.layout, slice.origin + by)
        };

        BlockTask {
            index,
            group: self.group,
            block,
            actual,
            a: shift(&self.a, MatrixCoord::new(origin.row, 0)),
            b: shift(&self.b, MatrixCoord::new(0, origin.column)),
            c: shift(&self.c, origin),
            row_scale: self.row_scale + origin.row,
            column_scale: self.column_scale + origin.column,
        }
    }
}
