use half::{bf16, f16};
use tessel_common::Element;

/// Element type the matrix unit accumulates into.
pub trait Accumulator: Element {
    /// Adds one partial product. Integer accumulators wrap like the hardware.
    fn accumulate(self, rhs: Self) -> Self;
}

impl Accumulator for i32 {
    fn accumulate(self, rhs: Self) -> Self {
        self.wrapping_add(rhs)
    }
}

impl Accumulator for f32 {
    fn accumulate(self, rhs: Self) -> Self {
        self + rhs
    }
}

/// Matrix multiplication precisions.
///
/// Implemented on the input element type: `i8` accumulates into `i32`, the half types into
/// `f32`.
pub trait MatmulPrecision: Send + Sync + Copy + 'static {
    /// Element type of both input operands.
    type Input: Element;
    /// Element type of the accumulator.
    type Acc: Accumulator;

    /// Product of two inputs, widened to the accumulator.
    fn multiply(lhs: Self::Input, rhs: Self::Input) -> Self::Acc;
}

impl MatmulPrecision for i8 {
    type Input = i8;
    type Acc = i32;

    fn multiply(lhs: i8, rhs: i8) -> i32 {
        lhs as i32 * rhs as i32
    }
}

impl MatmulPrecision for f16 {
    type Input = f16;
    type Acc = f32;

    fn multiply(lhs: f16, rhs: f16) -> f32 {
        lhs.to_f32() * rhs.to_f32()
    }
}

impl MatmulPrecision for bf16 {
    type Input = bf16;
    type Acc = f32;

    fn multiply(lhs: bf16, rhs: bf16) -> f32 {
        lhs.to_f32() * rhs.to_f32()
    }
}

/// Input element of a precision.
pub type InputOf<MP> = <MP as MatmulPrecision>::Input;
/// Accumulator element of a precision.
pub type AccOf<MP> = <MP as MatmulPrecision>::Acc;
