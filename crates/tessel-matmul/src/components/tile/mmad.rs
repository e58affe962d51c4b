use core::marker::PhantomData;

use super::{AccumulatorTile, OperandTile};
use crate::components::{AccOf, Accumulator, InputOf, MatmulPrecision};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// What the accumulator holds before an instruction.
pub enum AccumulatorInit {
    /// Partial sums of earlier instructions; the products are added to them.
    Accumulate,
    /// Nothing yet; the instruction writes its products without reading the accumulator.
    Overwrite,
}

/// One matrix unit instruction: `acc (+)= a · b` on L0 operand tiles.
pub struct TileMmad<MP: MatmulPrecision> {
    _precision: PhantomData<MP>,
}

impl<MP: MatmulPrecision> TileMmad<MP> {
    /// Multiplies `a` (`m × k`) by `b` (`k × n`) into the `m × n` accumulator.
    ///
    /// Every element sums its products in increasing `k`, continuing from the accumulator's
    /// current value unless `init` is [AccumulatorInit::Overwrite].
    pub fn execute(
        acc: &mut AccumulatorTile<AccOf<MP>>,
        a: &OperandTile<InputOf<MP>>,
        b: &OperandTile<InputOf<MP>>,
        init: AccumulatorInit,
    ) {
        let (m, n, k) = (a.rows(), b.columns(), a.columns());
        debug_assert_eq!(k, b.rows());
        debug_assert_eq!((m, n), (acc.rows(), acc.columns()));

        let data = acc.data_mut();
        for row in 0..m {
            let lhs = a.row(row);
            let out = &mut data[row * n..(row + 1) * n];

            for (column, value) in out.iter_mut().enumerate() {
                let mut sum = match init {
                    AccumulatorInit::Accumulate => *value,
                    AccumulatorInit::Overwrite => AccOf::<MP>::default(),
                };
                for (depth, lhs) in lhs.iter().enumerate() {
                    sum = sum.accumulate(MP::multiply(*lhs, b.get(depth, column)));
                }
                *value = sum;
            }
        }
    }
}
