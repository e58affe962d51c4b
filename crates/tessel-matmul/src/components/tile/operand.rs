use tessel_common::Element;

#[derive(Debug, Clone)]
/// Row-major operand tile resident in an on-chip buffer.
///
/// The buffer is allocated once at its full tier capacity; each stage reshapes it to the
/// extents of the tile it currently holds.
pub struct OperandTile<E> {
    data: Vec<E>,
    rows: usize,
    columns: usize,
}

impl<E: Element> OperandTile<E> {
    /// Buffer able to hold `capacity` elements.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![E::default(); capacity],
            rows: 0,
            columns: 0,
        }
    }

    /// Sets the extents of the tile held by the buffer.
    ///
    /// Panics if the tile doesn't fit the buffer, which means the tiling was not validated.
    pub fn reshape(&mut self, rows: usize, columns: usize) {
        assert!(
            rows * columns <= self.data.len(),
            "Tile {rows}x{columns} exceeds a buffer of {} elements",
            self.data.len()
        );
        self.rows = rows;
        self.columns = columns;
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn get(&self, row: usize, column: usize) -> E {
        self.data[row * self.columns + column]
    }

    /// Elements of row `row`.
    pub fn row(&self, row: usize) -> &[E] {
        let start = row * self.columns;
        &self.data[start..start + self.columns]
    }

    /// Mutable elements of row `row`.
    pub fn row_mut(&mut self, row: usize) -> &mut [E] {
        let start = row * self.columns;
        &mut self.data[start..start + self.columns]
    }
}
