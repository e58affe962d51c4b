use core::fmt::{Debug, Display};

use serde::{Deserialize, Serialize};

use super::MatrixCoord;

/// Maps a logical 2D index to a linear offset in a buffer.
///
/// `GetOffset` is injective over `rows() × columns()` for every layout in this module; the
/// constructors reject shape and stride combinations that would break it or overflow the
/// addressable range.
pub trait Layout: Copy + Send + Sync + Debug {
    /// Linear offset of the element at `coord`.
    fn offset(&self, coord: MatrixCoord) -> usize;

    /// Logical number of rows.
    fn rows(&self) -> usize;

    /// Logical number of columns.
    fn columns(&self) -> usize;

    /// Distance between consecutive elements along `dim` (0 for rows, 1 for columns).
    fn stride(&self, dim: usize) -> usize;

    /// Minimal number of elements a buffer needs to hold the layout.
    fn required_len(&self) -> usize;

    /// Logical extent along `dim` (0 for rows, 1 for columns).
    fn shape(&self, dim: usize) -> usize {
        match dim {
            0 => self.rows(),
            1 => self.columns(),
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Shape and stride combinations no layout can represent.
pub enum LayoutError {
    /// The leading stride is smaller than the contiguous extent.
    StrideTooSmall { stride: usize, extent: usize },
    /// The largest offset doesn't fit the addressable range.
    Overflow { rows: usize, columns: usize },
    /// A padded layout was requested with an empty block.
    EmptyBlock,
}

impl Display for LayoutError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LayoutError::StrideTooSmall { stride, extent } => {
                write!(f, "Leading stride {stride} is smaller than extent {extent}")
            }
            LayoutError::Overflow { rows, columns } => {
                write!(f, "Layout of {rows}x{columns} overflows the addressable range")
            }
            LayoutError::EmptyBlock => write!(f, "Padded layouts need non-empty blocks"),
        }
    }
}

fn checked_span(
    rows: usize,
    columns: usize,
    outer: usize,
    inner: usize,
    stride: usize,
) -> Result<usize, LayoutError> {
    if outer > 1 && stride < inner {
        return Err(LayoutError::StrideTooSmall {
            stride,
            extent: inner,
        });
    }
    if outer == 0 || inner == 0 {
        return Ok(0);
    }

    (outer - 1)
        .checked_mul(stride)
        .and_then(|span| span.checked_add(inner))
        .filter(|span| *span <= isize::MAX as usize)
        .ok_or(LayoutError::Overflow { rows, columns })
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Rows are contiguous, separated by `stride` elements.
pub struct RowMajor {
    rows: usize,
    columns: usize,
    stride: usize,
}

impl RowMajor {
    /// Densely packed layout.
    pub fn new(rows: usize, columns: usize) -> Result<Self, LayoutError> {
        Self::with_stride(rows, columns, columns)
    }

    /// Layout with an explicit leading stride.
    pub fn with_stride(rows: usize, columns: usize, stride: usize) -> Result<Self, LayoutError> {
        checked_span(rows, columns, rows, columns, stride)?;
        Ok(Self {
            rows,
            columns,
            stride,
        })
    }

    /// Leading stride.
    pub fn leading_stride(&self) -> usize {
        self.stride
    }

    // Sub-tiles of a validated layout can't overflow.
    fn tile(&self, rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            stride: self.stride,
        }
    }
}

impl Layout for RowMajor {
    fn offset(&self, coord: MatrixCoord) -> usize {
        coord.row * self.stride + coord.column
    }

    fn rows(&self) -> usize {
        self.rows
    }

    fn columns(&self) -> usize {
        self.columns
    }

    fn stride(&self, dim: usize) -> usize {
        match dim {
            0 => self.stride,
            _ => 1,
        }
    }

    fn required_len(&self) -> usize {
        match (self.rows, self.columns) {
            (0, _) | (_, 0) => 0,
            (rows, columns) => (rows - 1) * self.stride + columns,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Columns are contiguous, separated by `stride` elements.
pub struct ColumnMajor {
    rows: usize,
    columns: usize,
    stride: usize,
}

impl ColumnMajor {
    /// Densely packed layout.
    pub fn new(rows: usize, columns: usize) -> Result<Self, LayoutError> {
        Self::with_stride(rows, columns, rows)
    }

    /// Layout with an explicit leading stride.
    pub fn with_stride(rows: usize, columns: usize, stride: usize) -> Result<Self, LayoutError> {
        checked_span(rows, columns, columns, rows, stride)?;
        Ok(Self {
            rows,
            columns,
            stride,
        })
    }

    /// Leading stride.
    pub fn leading_stride(&self) -> usize {
        self.stride
    }

    fn tile(&self, rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            stride: self.stride,
        }
    }
}

impl Layout for ColumnMajor {
    fn offset(&self, coord: MatrixCoord) -> usize {
        coord.row + coord.column * self.stride
    }

    fn rows(&self) -> usize {
        self.rows
    }

    fn columns(&self) -> usize {
        self.columns
    }

    fn stride(&self, dim: usize) -> usize {
        match dim {
            0 => 1,
            _ => self.stride,
        }
    }

    fn required_len(&self) -> usize {
        match (self.rows, self.columns) {
            (0, _) | (_, 0) => 0,
            (rows, columns) => (columns - 1) * self.stride + rows,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Matrix split into `block_rows × block_columns` blocks stored one after the other.
///
/// Blocks follow each other in row-major order and are row-major inside. The padded extents
/// are the logical extents rounded up to whole blocks; the padding is part of the buffer but
/// not of the logical shape.
pub struct PaddingRowMajor {
    rows: usize,
    columns: usize,
    block_rows: usize,
    block_columns: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Column-major counterpart of [PaddingRowMajor]: blocks follow each other down the columns
/// and are column-major inside.
pub struct PaddingColumnMajor {
    rows: usize,
    columns: usize,
    block_rows: usize,
    block_columns: usize,
}

fn padded_len(
    rows: usize,
    columns: usize,
    block_rows: usize,
    block_columns: usize,
) -> Result<usize, LayoutError> {
    if block_rows == 0 || block_columns == 0 {
        return Err(LayoutError::EmptyBlock);
    }

    rows.div_ceil(block_rows)
        .checked_mul(block_rows)
        .zip(columns.div_ceil(block_columns).checked_mul(block_columns))
        .and_then(|(rows, columns)| rows.checked_mul(columns))
        .filter(|len| *len <= isize::MAX as usize)
        .ok_or(LayoutError::Overflow { rows, columns })
}

macro_rules! padded_layout {
    ($name:ident) => {
        impl $name {
            /// Creates the layout of a `rows × columns` matrix blocked by the given block shape.
            pub fn new(
                rows: usize,
                columns: usize,
                block_rows: usize,
                block_columns: usize,
            ) -> Result<Self, LayoutError> {
                padded_len(rows, columns, block_rows, block_columns)?;
                Ok(Self {
                    rows,
                    columns,
                    block_rows,
                    block_columns,
                })
            }

            /// Rows including the padding of the last block row.
            pub fn padded_rows(&self) -> usize {
                self.rows.div_ceil(self.block_rows) * self.block_rows
            }

            /// Columns including the padding of the last block column.
            pub fn padded_columns(&self) -> usize {
                self.columns.div_ceil(self.block_columns) * self.block_columns
            }

            /// Shape of one block.
            pub fn block(&self) -> MatrixCoord {
                MatrixCoord::new(self.block_rows, self.block_columns)
            }
        }
    };
}

padded_layout!(PaddingRowMajor);
padded_layout!(PaddingColumnMajor);

impl Layout for PaddingRowMajor {
    fn offset(&self, coord: MatrixCoord) -> usize {
        let block_size = self.block_rows * self.block_columns;
        let block_row = coord.row / self.block_rows;
        let block_column = coord.column / self.block_columns;

        block_row * self.block_rows * self.padded_columns()
            + block_column * block_size
            + (coord.row % self.block_rows) * self.block_columns
            + coord.column % self.block_columns
    }

    fn rows(&self) -> usize {
        self.rows
    }

    fn columns(&self) -> usize {
        self.columns
    }

    fn stride(&self, dim: usize) -> usize {
        match dim {
            0 => self.block_columns,
            _ => 1,
        }
    }

    fn required_len(&self) -> usize {
        self.padded_rows() * self.padded_columns()
    }
}

impl Layout for PaddingColumnMajor {
    fn offset(&self, coord: MatrixCoord) -> usize {
        let block_size = self.block_rows * self.block_columns;
        let block_row = coord.row / self.block_rows;
        let block_column = coord.column / self.block_columns;

        block_column * self.block_columns * self.padded_rows()
            + block_row * block_size
            + (coord.column % self.block_columns) * self.block_rows
            + coord.row % self.block_rows
    }

    fn rows(&self) -> usize {
        self.rows
    }

    fn columns(&self) -> usize {
        self.columns
    }

    fn stride(&self, dim: usize) -> usize {
        match dim {
            0 => 1,
            _ => self.block_rows,
        }
    }

    fn required_len(&self) -> usize {
        self.padded_rows() * self.padded_columns()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Contiguous 1D layout, viewed as a single row.
pub struct VectorLayout {
    len: usize,
}

impl VectorLayout {
    pub fn new(len: usize) -> Self {
        Self { len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Layout for VectorLayout {
    fn offset(&self, coord: MatrixCoord) -> usize {
        coord.column
    }

    fn rows(&self) -> usize {
        1
    }

    fn columns(&self) -> usize {
        self.len
    }

    fn stride(&self, _dim: usize) -> usize {
        1
    }

    fn required_len(&self) -> usize {
        self.len
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Any of the matrix layouts an operand can have.
pub enum MatrixLayout {
    RowMajor(RowMajor),
    ColumnMajor(ColumnMajor),
    PaddingRowMajor(PaddingRowMajor),
    PaddingColumnMajor(PaddingColumnMajor),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Storage order of a matrix, ignoring strides.
pub enum MatrixOrder {
    RowMajor,
    ColumnMajor,
}

impl MatrixLayout {
    /// Densely packed row-major layout.
    pub fn row_major(rows: usize, columns: usize) -> Result<Self, LayoutError> {
        RowMajor::new(rows, columns).map(Self::RowMajor)
    }

    /// Densely packed column-major layout.
    pub fn column_major(rows: usize, columns: usize) -> Result<Self, LayoutError> {
        ColumnMajor::new(rows, columns).map(Self::ColumnMajor)
    }

    /// Densely packed layout of the given order.
    pub fn dense(order: MatrixOrder, rows: usize, columns: usize) -> Result<Self, LayoutError> {
        match order {
            MatrixOrder::RowMajor => Self::row_major(rows, columns),
            MatrixOrder::ColumnMajor => Self::column_major(rows, columns),
        }
    }

    /// Storage order of the layout.
    pub fn order(&self) -> MatrixOrder {
        match self {
            MatrixLayout::RowMajor(_) | MatrixLayout::PaddingRowMajor(_) => MatrixOrder::RowMajor,
            MatrixLayout::ColumnMajor(_) | MatrixLayout::PaddingColumnMajor(_) => {
                MatrixOrder::ColumnMajor
            }
        }
    }

    /// Whether the layout is one of the padded, blocked layouts.
    pub fn is_padded(&self) -> bool {
        matches!(
            self,
            MatrixLayout::PaddingRowMajor(_) | MatrixLayout::PaddingColumnMajor(_)
        )
    }

    /// Stride between consecutive rows (row-major) or columns (column-major).
    pub fn leading_stride(&self) -> usize {
        match self {
            MatrixLayout::RowMajor(layout) => layout.leading_stride(),
            MatrixLayout::ColumnMajor(layout) => layout.leading_stride(),
            MatrixLayout::PaddingRowMajor(layout) => layout.stride(0),
            MatrixLayout::PaddingColumnMajor(layout) => layout.stride(1),
        }
    }

    /// Layout of the `rows × columns` region starting at `origin`, relative to the offset of
    /// `origin`.
    ///
    /// Only meaningful for the strided layouts; a padded layout keeps its global blocking and
    /// must be addressed from the matrix origin.
    pub fn tile_layout(&self, rows: usize, columns: usize) -> Self {
        match self {
            MatrixLayout::RowMajor(layout) => MatrixLayout::RowMajor(layout.tile(rows, columns)),
            MatrixLayout::ColumnMajor(layout) => {
                MatrixLayout::ColumnMajor(layout.tile(rows, columns))
            }
            padded => *padded,
        }
    }
}

impl Layout for MatrixLayout {
    fn offset(&self, coord: MatrixCoord) -> usize {
        match self {
            MatrixLayout::RowMajor(layout) => layout.offset(coord),
            MatrixLayout::ColumnMajor(layout) => layout.offset(coord),
            MatrixLayout::PaddingRowMajor(layout) => layout.offset(coord),
            MatrixLayout::PaddingColumnMajor(layout) => layout.offset(coord),
        }
    }

    fn rows(&self) -> usize {
        match self {
            MatrixLayout::RowMajor(layout) => layout.rows(),
            MatrixLayout::ColumnMajor(layout) => layout.rows(),
            MatrixLayout::PaddingRowMajor(layout) => layout.rows(),
            MatrixLayout::PaddingColumnMajor(layout) => layout.rows(),
        }
    }

    fn columns(&self) -> usize {
        match self {
            MatrixLayout::RowMajor(layout) => layout.columns(),
            MatrixLayout::ColumnMajor(layout) => layout.columns(),
            MatrixLayout::PaddingRowMajor(layout) => layout.columns(),
            MatrixLayout::PaddingColumnMajor(layout) => layout.columns(),
        }
    }

    fn stride(&self, dim: usize) -> usize {
        match self {
            MatrixLayout::RowMajor(layout) => layout.stride(dim),
            MatrixLayout::ColumnMajor(layout) => layout.stride(dim),
            MatrixLayout::PaddingRowMajor(layout) => layout.stride(dim),
            MatrixLayout::PaddingColumnMajor(layout) => layout.stride(dim),
        }
    }

    fn required_len(&self) -> usize {
        match self {
            MatrixLayout::RowMajor(layout) => layout.required_len(),
            MatrixLayout::ColumnMajor(layout) => layout.required_len(),
            MatrixLayout::PaddingRowMajor(layout) => layout.required_len(),
            MatrixLayout::PaddingColumnMajor(layout) => layout.required_len(),
        }
    }
}

impl From<RowMajor> for MatrixLayout {
    fn from(value: RowMajor) -> Self {
        Self::RowMajor(value)
    }
}

impl From<ColumnMajor> for MatrixLayout {
    fn from(value: ColumnMajor) -> Self {
        Self::ColumnMajor(value)
    }
}

impl From<PaddingRowMajor> for MatrixLayout {
    fn from(value: PaddingRowMajor) -> Self {
        Self::PaddingRowMajor(value)
    }
}

impl From<PaddingColumnMajor> for MatrixLayout {
    fn from(value: PaddingColumnMajor) -> Self {
        Self::PaddingColumnMajor(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offsets<L: Layout>(layout: &L) -> Vec<usize> {
        let mut offsets = Vec::new();
        for row in 0..layout.rows() {
            for column in 0..layout.columns() {
                offsets.push(layout.offset(MatrixCoord::new(row, column)));
            }
        }
        offsets
    }

    fn assert_injective<L: Layout>(layout: &L) {
        let mut offsets = offsets(layout);
        let count = offsets.len();
        offsets.sort_unstable();
        offsets.dedup();
        assert_eq!(offsets.len(), count, "{layout:?} maps two coords to one offset");
        assert!(offsets.iter().all(|offset| *offset < layout.required_len()));
    }

    #[test_log::test]
    fn strided_layouts_are_injective() {
        assert_injective(&RowMajor::with_stride(5, 7, 9).unwrap());
        assert_injective(&ColumnMajor::with_stride(5, 7, 6).unwrap());
        assert_injective(&PaddingRowMajor::new(37, 21, 16, 8).unwrap());
        assert_injective(&PaddingColumnMajor::new(37, 21, 16, 8).unwrap());
    }

    #[test_log::test]
    fn padded_row_major_blocks_are_contiguous() {
        let layout = PaddingRowMajor::new(3, 5, 2, 4).unwrap();

        assert_eq!(layout.padded_rows(), 4);
        assert_eq!(layout.padded_columns(), 8);
        assert_eq!(layout.required_len(), 32);
        // The second block of the first block row starts after one full block.
        assert_eq!(layout.offset(MatrixCoord::new(0, 4)), 8);
        assert_eq!(layout.offset(MatrixCoord::new(1, 4)), 12);
        // The second block row starts after two blocks.
        assert_eq!(layout.offset(MatrixCoord::new(2, 0)), 16);
    }

    #[test_log::test]
    fn padded_column_major_blocks_are_contiguous() {
        let layout = PaddingColumnMajor::new(5, 3, 4, 2).unwrap();

        assert_eq!(layout.offset(MatrixCoord::new(1, 0)), 1);
        assert_eq!(layout.offset(MatrixCoord::new(0, 1)), 4);
        assert_eq!(layout.offset(MatrixCoord::new(4, 0)), 8);
        assert_eq!(layout.offset(MatrixCoord::new(0, 2)), 16);
    }

    #[test_log::test]
    fn rejects_invalid_strides() {
        assert_eq!(
            RowMajor::with_stride(4, 8, 7),
            Err(LayoutError::StrideTooSmall {
                stride: 7,
                extent: 8
            })
        );
        assert!(ColumnMajor::with_stride(2, usize::MAX / 2, usize::MAX / 2).is_err());
        assert_eq!(
            PaddingRowMajor::new(4, 4, 0, 4),
            Err(LayoutError::EmptyBlock)
        );
    }

    #[test_log::test]
    fn single_row_ignores_stride() {
        let layout = RowMajor::with_stride(1, 8, 3).unwrap();

        assert_eq!(layout.required_len(), 8);
    }

    #[test_log::test]
    fn tile_layout_keeps_the_stride() {
        let layout = MatrixLayout::row_major(64, 96).unwrap();
        let tile = layout.tile_layout(16, 32);

        assert_eq!(tile.rows(), 16);
        assert_eq!(tile.leading_stride(), 96);
        assert_eq!(tile.offset(MatrixCoord::new(1, 1)), 97);
    }
}
