use serde::{Deserialize, Serialize};

use crate::components::{GemmCoord, MatmulSetupError, MatrixCoord};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Axis the panels of a swizzled order are stacked along.
pub enum SwizzleDirection {
    /// Panels of `offset` block rows, stacked along M.
    Zn,
    /// Panels of `offset` block columns, stacked along N.
    Nz,
}

impl SwizzleDirection {
    /// Panels follow the longer dimension of the problem.
    pub fn for_problem(problem: &GemmCoord) -> Self {
        match problem.m > problem.n {
            true => SwizzleDirection::Zn,
            false => SwizzleDirection::Nz,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Order in which loop indices visit the output blocks of one batch.
pub enum BlockOrder {
    /// N-blocks within an M-block row, rows one after the other.
    RowMajor,
    /// M-blocks within an N-block column, columns one after the other.
    ColMajor,
    /// Identity swizzle: the blocks are cut into panels `offset` blocks wide. Inside a panel the
    /// order walks across the panel first, and every other panel is walked backwards so
    /// consecutive indices keep sharing an operand tile.
    Swizzle {
        offset: usize,
        direction: SwizzleDirection,
    },
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Requested [BlockOrder], resolved once the problem is known.
pub enum BlockOrderSelection {
    /// Raster order.
    #[default]
    Default,
    /// Exactly this order.
    Fixed(BlockOrder),
    /// Identity swizzle, its direction picked from the problem shape.
    Swizzle { offset: usize },
}

impl BlockOrderSelection {
    /// Swizzle offset used by the quant kernels.
    pub const SWIZZLE_OFFSET: usize = 3;

    pub fn into_order(self, problem: &GemmCoord) -> BlockOrder {
        match self {
            BlockOrderSelection::Default => BlockOrder::RowMajor,
            BlockOrderSelection::Fixed(order) => order,
            BlockOrderSelection::Swizzle { offset } => BlockOrder::Swizzle {
                offset,
                direction: SwizzleDirection::for_problem(problem),
            },
        }
    }
}

impl BlockOrder {
    pub fn validate(&self) -> Result<(), MatmulSetupError> {
        match self {
            BlockOrder::Swizzle { offset: 0, .. } => Err(MatmulSetupError::invalid_config(
                "Swizzle offset must be at least one block",
            )),
            _ => Ok(()),
        }
    }

    /// Block visited by `index` in a grid of `loops` blocks. `index` must be in the grid.
    pub fn block_of(&self, index: usize, loops: MatrixCoord) -> MatrixCoord {
        let MatrixCoord { row: rows, column: columns } = loops;

        match *self {
            BlockOrder::RowMajor => MatrixCoord::new(index / columns, index % columns),
            BlockOrder::ColMajor => MatrixCoord::new(index % rows, index / rows),
            BlockOrder::Swizzle {
                offset,
                direction: SwizzleDirection::Zn,
            } => {
                let panel = index / (offset * columns);
                let in_panel = index % (offset * columns);
                let height = offset.min(rows - panel * offset);
                let row = panel * offset + in_panel % height;
                let column = match panel % 2 {
                    0 => in_panel / height,
                    _ => columns - in_panel / height - 1,
                };
                MatrixCoord::new(row, column)
            }
            BlockOrder::Swizzle {
                offset,
                direction: SwizzleDirection::Nz,
            } => {
                let panel = index / (offset * rows);
                let in_panel = index % (offset * rows);
                let width = offset.min(columns - panel * offset);
                let column = panel * offset + in_panel % width;
                let row = match panel % 2 {
                    0 => in_panel / width,
                    _ => rows - in_panel / width - 1,
                };
                MatrixCoord::new(row, column)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visit(order: BlockOrder, loops: MatrixCoord) -> Vec<(usize, usize)> {
        (0..loops.count())
            .map(|index| {
                let block = order.block_of(index, loops);
                (block.row, block.column)
            })
            .collect()
    }

    #[test_log::test]
    fn every_order_is_a_bijection() {
        let orders = [
            BlockOrder::RowMajor,
            BlockOrder::ColMajor,
            BlockOrder::Swizzle {
                offset: 3,
                direction: SwizzleDirection::Zn,
            },
            BlockOrder::Swizzle {
                offset: 3,
                direction: SwizzleDirection::Nz,
            },
            BlockOrder::Swizzle {
                offset: 1,
                direction: SwizzleDirection::Zn,
            },
        ];

        for (rows, columns) in [(1, 1), (4, 5), (7, 2), (3, 3), (10, 1)] {
            let loops = MatrixCoord::new(rows, columns);
            for order in orders {
                let mut blocks = visit(order, loops);
                blocks.sort_unstable();
                let expected = (0..rows)
                    .flat_map(|row| (0..columns).map(move |column| (row, column)))
                    .collect::<Vec<_>>();
                assert_eq!(blocks, expected, "{order:?} on {rows}x{columns}");
            }
        }
    }

    #[test_log::test]
    fn zn_serpentines_through_row_panels() {
        let order = BlockOrder::Swizzle {
            offset: 2,
            direction: SwizzleDirection::Zn,
        };

        let blocks = visit(order, MatrixCoord::new(3, 3));

        pretty_assertions::assert_eq!(
            blocks,
            vec![
                (0, 0),
                (1, 0),
                (0, 1),
                (1, 1),
                (0, 2),
                (1, 2),
                // The last panel is one row high and walked backwards.
                (2, 2),
                (2, 1),
                (2, 0),
            ]
        );
    }

    #[test_log::test]
    fn direction_follows_the_longer_dimension() {
        let tall = GemmCoord::new(512, 128, 64);
        let wide = GemmCoord::new(128, 512, 64);

        assert_eq!(SwizzleDirection::for_problem(&tall), SwizzleDirection::Zn);
        assert_eq!(SwizzleDirection::for_problem(&wide), SwizzleDirection::Nz);
        assert_eq!(
            BlockOrderSelection::Swizzle { offset: 3 }.into_order(&tall),
            BlockOrder::Swizzle {
                offset: 3,
                direction: SwizzleDirection::Zn
            }
        );
        assert_eq!(
            BlockOrderSelection::default().into_order(&tall),
            BlockOrder::RowMajor
        );
    }
}
