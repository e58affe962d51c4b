use tessel_runtime::sync::{PipelineError, PipelineRing};

use crate::components::{
    AccOf, InputOf, MatmulPrecision, MmadConfig, TilingScheme,
    tile::{AccumulatorInit, AccumulatorTile, OperandTile, TileMmad},
};

/// Stages the sub-tiles of one L1 tile through the L0A and L0B rings into the matrix unit.
///
/// The rings keep their stage numbering for the whole launch, so L1 tiles of consecutive blocks
/// flow through them without draining. Each ring loads `depth - 1` sub-tiles ahead of the one
/// being multiplied.
pub struct StageMmad<MP: MatmulPrecision> {
    l0a: PipelineRing<OperandTile<InputOf<MP>>>,
    l0b: PipelineRing<OperandTile<InputOf<MP>>>,
    l0_k: usize,
    unit_flag: bool,
    issued: u64,
}

impl<MP: MatmulPrecision> StageMmad<MP> {
    pub fn new(config: &MmadConfig, tiling: &TilingScheme) -> Self {
        let l0 = tiling.l0;

        Self {
            l0a: PipelineRing::new("l0a", config.l0a_stages, || {
                OperandTile::with_capacity(l0.m * l0.k)
            }),
            l0b: PipelineRing::new("l0b", config.l0b_stages, || {
                OperandTile::with_capacity(l0.k * l0.n)
            }),
            l0_k: l0.k,
            unit_flag: config.unit_flag,
            issued: 0,
        }
    }

    /// Accumulates `a · b` into `acc`, `a` being `m × k_tile` and `b` being `k_tile × n`.
    ///
    /// `first` marks the first L1 tile of a block: the accumulator is cleared, or with the unit
    /// flag the first instruction overwrites it instead.
    pub fn execute(
        &mut self,
        a: &OperandTile<InputOf<MP>>,
        b: &OperandTile<InputOf<MP>>,
        acc: &mut AccumulatorTile<AccOf<MP>>,
        first: bool,
    ) -> Result<(), PipelineError> {
        let depth = a.columns();
        let count = depth.div_ceil(self.l0_k) as u64;
        let base = self.issued;
        self.issued += count;

        if first && !self.unit_flag {
            acc.clear();
        }

        let ahead_a = (self.l0a.depth() as u64 - 1).min(count);
        let ahead_b = (self.l0b.depth() as u64 - 1).min(count);

        for sub in 0..ahead_a {
            self.load_a(a, base, sub)?;
        }
        for sub in 0..ahead_b {
            self.load_b(b, base, sub)?;
        }

        for sub in 0..count {
            if sub + ahead_a < count {
                self.load_a(a, base, sub + ahead_a)?;
            }
            if sub + ahead_b < count {
                self.load_b(b, base, sub + ahead_b)?;
            }

            let init = match first && self.unit_flag && sub == 0 {
                true => AccumulatorInit::Overwrite,
                false => AccumulatorInit::Accumulate,
            };

            let lhs = self.l0a.wait_ready(base + sub)?;
            let rhs = match self.l0b.wait_ready(base + sub) {
                Ok(rhs) => rhs,
                Err(err) => {
                    self.l0a.release(base + sub, lhs);
                    return Err(err);
                }
            };
            TileMmad::<MP>::execute(acc, &lhs, &rhs, init);
            self.l0a.release(base + sub, lhs);
            self.l0b.release(base + sub, rhs);
        }

        Ok(())
    }

    fn load_a(
        &self,
        a: &OperandTile<InputOf<MP>>,
        base: u64,
        sub: u64,
    ) -> Result<(), PipelineError> {
        let start = sub as usize * self.l0_k;
        let width = self.l0_k.min(a.columns() - start);

        self.l0a.produce(base + sub, |dst| {
            dst.reshape(a.rows(), width);
            for row in 0..a.rows() {
                dst.row_mut(row)
                    .copy_from_slice(&a.row(row)[start..start + width]);
            }
        })
    }

    fn load_b(
        &self,
        b: &OperandTile<InputOf<MP>>,
        base: u64,
        sub: u64,
    ) -> Result<(), PipelineError> {
        let start = sub as usize * self.l0_k;
        let width = self.l0_k.min(b.rows() - start);

        self.l0b.produce(base + sub, |dst| {
            dst.reshape(width, b.columns());
            for row in 0..width {
                dst.row_mut(row).copy_from_slice(b.row(start + row));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{DispatchPolicy, MmadSelection, TileSize};

    fn operand(rows: usize, columns: usize, seed: i32) -> OperandTile<i8> {
        let mut tile = OperandTile::with_capacity(rows * columns);
        tile.reshape(rows, columns);
        for row in 0..rows {
            for (column, value) in tile.row_mut(row).iter_mut().enumerate() {
                *value = ((row as i32 * 7 + column as i32 * 3 + seed) % 11 - 5) as i8;
            }
        }
        tile
    }

    fn naive(a: &OperandTile<i8>, b: &OperandTile<i8>) -> Vec<i32> {
        let mut out = Vec::new();
        for row in 0..a.rows() {
            for column in 0..b.columns() {
                out.push(
                    (0..a.columns())
                        .map(|k| a.get(row, k) as i32 * b.get(k, column) as i32)
                        .sum(),
                );
            }
        }
        out
    }

    #[test_log::test]
    fn partial_depth_matches_naive_for_every_ring_depth() {
        let tiling = TilingScheme::new(TileSize::new(16, 16, 128), TileSize::new(16, 16, 32));
        // 80 is not a multiple of the L0 depth, the last sub-tile is partial.
        let a = operand(16, 80, 1);
        let b = operand(80, 16, 2);
        let expected = naive(&a, &b);

        for stages in 1..=3 {
            for unit_flag in [false, true] {
                let config = MmadSelection::new(DispatchPolicy::Pingpong)
                    .l0_stages(stages)
                    .unit_flag(unit_flag)
                    .resolve()
                    .unwrap();
                let mut stage = StageMmad::<i8>::new(&config, &tiling);
                let mut acc = AccumulatorTile::new(16, 16);

                // Run twice to check the ring numbering carries over between blocks.
                for _ in 0..2 {
                    stage.execute(&a, &b, &mut acc, true).unwrap();
                    let actual = (0..16)
                        .flat_map(|row| acc.row(row).to_vec())
                        .collect::<Vec<_>>();
                    pretty_assertions::assert_eq!(actual, expected);
                }
            }
        }
    }
}
