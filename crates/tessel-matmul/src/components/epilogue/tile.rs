//! Vector tile operations of the epilogue.
//!
//! Every operation works on a row-major tile held in the unified buffer. Scale vectors are
//! expanded to 32-byte blocks the way the vector unit broadcasts them.

use tessel_common::Element;
use tessel_runtime::properties::BYTES_PER_BLOCK;

use crate::components::{
    GlobalViewMut, MatrixCoord, MatrixLayout, MatrixOrder, global::OperandSlice,
};

/// `f32` values in one 32-byte block.
pub const ONE_BLK_F32: usize = BYTES_PER_BLOCK / size_of::<f32>();

/// Element-wise type conversion.
pub struct TileCast;

impl TileCast {
    pub fn to_f32<E: Element>(src: &[E], dst: &mut Vec<f32>) {
        dst.clear();
        dst.extend(src.iter().map(|value| value.to_f32()));
    }

    pub fn from_f32<E: Element>(src: &[f32], dst: &mut Vec<E>) {
        dst.clear();
        dst.extend(src.iter().map(|value| E::from_f32(*value)));
    }
}

/// Expands one scale per row into a full block of copies per row.
pub struct TileBroadcastOneBlk;

impl TileBroadcastOneBlk {
    pub fn apply<ES: Element>(scales: &[ES], dst: &mut Vec<f32>) {
        dst.clear();
        for scale in scales {
            dst.extend([scale.to_f32(); ONE_BLK_F32]);
        }
    }
}

/// Multiplies each row by the block broadcast for it by [TileBroadcastOneBlk].
pub struct TileOneBlkColumnBroadcastMul;

impl TileOneBlkColumnBroadcastMul {
    pub fn apply(data: &mut [f32], columns: usize, blocks: &[f32]) {
        if columns == 0 {
            return;
        }

        for (values, block) in data
            .chunks_exact_mut(columns)
            .zip(blocks.chunks_exact(ONE_BLK_F32))
        {
            for (column, value) in values.iter_mut().enumerate() {
                *value *= block[column % ONE_BLK_F32];
            }
        }
    }
}

/// Multiplies every row by the same vector of column scales.
pub struct TileRowBroadcastMul;

impl TileRowBroadcastMul {
    pub fn apply(data: &mut [f32], columns: usize, row: &[f32]) {
        if columns == 0 {
            return;
        }

        for values in data.chunks_exact_mut(columns) {
            for (value, scale) in values.iter_mut().zip(row) {
                *value *= *scale;
            }
        }
    }
}

/// Multiplies the tile by a scalar.
pub struct TileMuls;

impl TileMuls {
    pub fn apply(data: &mut [f32], scalar: f32) {
        for value in data.iter_mut() {
            *value *= scalar;
        }
    }
}

/// Stores a tile to off-chip memory, masked to its actual extents.
pub struct TileCopy;

impl TileCopy {
    /// Writes the `src.len() / columns` rows of `src` at `origin` inside `slice`.
    pub fn store<E: Element>(
        view: &mut GlobalViewMut<'_, E>,
        slice: &OperandSlice,
        origin: MatrixCoord,
        columns: usize,
        src: &[E],
    ) {
        if columns == 0 {
            return;
        }

        let contiguous = is_dense_row_major(&slice.layout);
        for (row, values) in src.chunks_exact(columns).enumerate() {
            let row = origin.row + row;
            match contiguous {
                true => view.copy_from(slice.offset(row, origin.column), values),
                false => {
                    for (column, value) in values.iter().enumerate() {
                        view.set(slice.offset(row, origin.column + column), *value);
                    }
                }
            }
        }
    }
}

pub(crate) fn is_dense_row_major(layout: &MatrixLayout) -> bool {
    layout.order() == MatrixOrder::RowMajor && !layout.is_padded()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn per_token_scales_apply_to_whole_rows() {
        let mut blocks = Vec::new();
        TileBroadcastOneBlk::apply(&[2.0f32, 0.5], &mut blocks);

        let mut data = vec![1.0; 2 * 11];
        TileOneBlkColumnBroadcastMul::apply(&mut data, 11, &blocks);

        assert_eq!(blocks.len(), 2 * ONE_BLK_F32);
        assert!(data[..11].iter().all(|value| *value == 2.0));
        assert!(data[11..].iter().all(|value| *value == 0.5));
    }

    #[test_log::test]
    fn column_scales_apply_to_every_row() {
        let mut data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        TileRowBroadcastMul::apply(&mut data, 3, &[1.0, 10.0, 100.0]);
        TileMuls::apply(&mut data, 2.0);

        assert_eq!(data, vec![2.0, 40.0, 600.0, 8.0, 100.0, 1200.0]);
    }

    #[test_log::test]
    fn zero_columns_is_a_no_op() {
        let mut data: Vec<f32> = Vec::new();
        TileRowBroadcastMul::apply(&mut data, 0, &[]);
        TileOneBlkColumnBroadcastMul::apply(&mut data, 0, &[]);

        assert!(data.is_empty());
    }
}
