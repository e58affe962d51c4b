use core::ops::Add;

use derive_new::new;
use serde::{Deserialize, Serialize};

#[derive(new, Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Position or extent in the `(m, n, k)` iteration space of a matmul.
pub struct GemmCoord {
    pub m: usize,
    pub n: usize,
    pub k: usize,
}

impl GemmCoord {
    /// The output plane of the coordinate.
    pub fn mn(&self) -> MatrixCoord {
        MatrixCoord::new(self.m, self.n)
    }

    /// The left operand plane of the coordinate.
    pub fn mk(&self) -> MatrixCoord {
        MatrixCoord::new(self.m, self.k)
    }

    /// The right operand plane of the coordinate.
    pub fn kn(&self) -> MatrixCoord {
        MatrixCoord::new(self.k, self.n)
    }

    /// Product of the extents.
    pub fn volume(&self) -> usize {
        self.m * self.n * self.k
    }
}

#[derive(new, Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Row and column of an element, or the extents of a 2D region.
pub struct MatrixCoord {
    pub row: usize,
    pub column: usize,
}

impl MatrixCoord {
    /// Number of elements of a region with these extents.
    pub fn count(&self) -> usize {
        self.row * self.column
    }
}

impl Add for MatrixCoord {
    type Output = MatrixCoord;

    fn add(self, rhs: Self) -> Self::Output {
        MatrixCoord::new(self.row + rhs.row, self.column + rhs.column)
    }
}
