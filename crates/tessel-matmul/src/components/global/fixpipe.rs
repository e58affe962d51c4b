use core::marker::PhantomData;

use tessel_common::Element;
use tessel_runtime::LaunchError;

use super::{BlockSink, BlockTask};
use crate::components::{Accumulator, GlobalTensor, tile::AccumulatorTile};

/// Converts an accumulator to the output type, optionally multiplied by a scalar first.
///
/// Without a scale, accumulators already of the output type are copied bit for bit.
pub fn fixpipe_convert<Acc: Element, EO: Element>(value: Acc, scale: Option<f32>) -> EO {
    match scale {
        Some(scale) => EO::from_f32(value.to_f32() * scale),
        None if Acc::KIND == EO::KIND => EO::read(Acc::as_bytes(&[value])),
        None => EO::from_f32(value.to_f32()),
    }
}

/// Writes accumulators straight from L0C to the output, the way the fixpipe does without a
/// vector epilogue.
///
/// Only the valid region of edge blocks is written.
pub struct FixpipeSink<'a, Acc, EO: Element> {
    out: &'a GlobalTensor<EO>,
    scale: Option<f32>,
    _acc: PhantomData<Acc>,
}

impl<'a, Acc, EO: Element> FixpipeSink<'a, Acc, EO> {
    pub fn new(out: &'a GlobalTensor<EO>, scale: Option<f32>) -> Self {
        Self {
            out,
            scale,
            _acc: PhantomData,
        }
    }
}

impl<Acc: Accumulator, EO: Element> BlockSink<Acc> for FixpipeSink<'_, Acc, EO> {
    fn handoff(&mut self, task: &BlockTask, acc: AccumulatorTile<Acc>) -> Result<(), LaunchError> {
        self.out.write(|view| {
            for row in 0..task.actual.m {
                for (column, value) in acc.row(row).iter().enumerate() {
                    view.set(
                        task.c.offset(row, column),
                        fixpipe_convert(*value, self.scale),
                    );
                }
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use half::f16;

    use super::*;

    #[test_log::test]
    fn same_type_is_copied_exactly() {
        let value = 16_777_217i32;

        assert_eq!(fixpipe_convert::<i32, i32>(value, None), value);
        assert_eq!(fixpipe_convert::<i32, f16>(3, Some(0.5)), f16::from_f32(1.5));
    }
}
