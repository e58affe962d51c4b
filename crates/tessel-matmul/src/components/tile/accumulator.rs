use super::super::Accumulator;

#[derive(Debug)]
/// Finished or in-progress accumulator of one output block, row-major.
///
/// The block mmad owns it until the hand-off, after which it belongs to the epilogue. It is
/// moved between units, never cloned.
pub struct AccumulatorTile<Acc> {
    data: Vec<Acc>,
    rows: usize,
    columns: usize,
}

impl<Acc: Accumulator> AccumulatorTile<Acc> {
    /// Zeroed accumulator of `rows × columns`.
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            data: vec![Acc::default(); rows * columns],
            rows,
            columns,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn get(&self, row: usize, column: usize) -> Acc {
        self.data[row * self.columns + column]
    }

    /// Elements of row `row`.
    pub fn row(&self, row: usize) -> &[Acc] {
        let start = row * self.columns;
        &self.data[start..start + self.columns]
    }

    pub(crate) fn data_mut(&mut self) -> &mut [Acc] {
        &mut self.data
    }

    /// Resets every element to zero.
    pub fn clear(&mut self) {
        self.data.fill(Acc::default());
    }
}
