use crate::components::MatrixCoord;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Horizontal walk over the epilogue tiles of a region: left to right, then top to bottom.
pub struct EpilogueTileSwizzle {
    shape: MatrixCoord,
    tile: MatrixCoord,
    loops: MatrixCoord,
}

impl EpilogueTileSwizzle {
    pub fn new(shape: MatrixCoord, tile: MatrixCoord) -> Self {
        let loops = match shape.count() {
            0 => MatrixCoord::default(),
            _ => MatrixCoord::new(
                shape.row.div_ceil(tile.row),
                shape.column.div_ceil(tile.column),
            ),
        };

        Self { shape, tile, loops }
    }

    /// Number of tiles in the region.
    pub fn count(&self) -> usize {
        self.loops.count()
    }

    /// First element of tile `index`, relative to the region.
    pub fn tile_origin(&self, index: usize) -> MatrixCoord {
        MatrixCoord::new(
            index / self.loops.column * self.tile.row,
            index % self.loops.column * self.tile.column,
        )
    }

    /// Extents of the tile starting at `origin`, clipped at the region boundary.
    pub fn actual_tile_shape(&self, origin: MatrixCoord) -> MatrixCoord {
        MatrixCoord::new(
            self.tile.row.min(self.shape.row - origin.row),
            self.tile.column.min(self.shape.column - origin.column),
        )
    }
}
