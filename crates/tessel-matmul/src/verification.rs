//! Host recomputation of the kernels and the comparators their outputs are checked with.
//!
//! The reference walks `k` in increasing order from a zeroed accumulator and applies the scales
//! in the same order as the epilogue, so integer paths compare bit for bit and float paths only
//! differ by the rounding of the output type.

use tessel_common::Element;

use crate::components::{
    AccOf, Accumulator, GemmCoord, GroupList, InputOf, Layout, MatmulPrecision, MatrixCoord,
    MatrixLayout, global::fixpipe_convert,
};

/// Accumulators of `A·B` as a dense row-major `m × n` matrix.
pub fn reference_matmul<MP: MatmulPrecision>(
    shape: &GemmCoord,
    a: &[InputOf<MP>],
    a_layout: &MatrixLayout,
    b: &[InputOf<MP>],
    b_layout: &MatrixLayout,
) -> Vec<AccOf<MP>> {
    let mut out = Vec::with_capacity(shape.m * shape.n);

    for row in 0..shape.m {
        for column in 0..shape.n {
            let mut sum = AccOf::<MP>::default();
            for depth in 0..shape.k {
                let lhs = a[a_layout.offset(MatrixCoord::new(row, depth))];
                let rhs = b[b_layout.offset(MatrixCoord::new(depth, column))];
                sum = sum.accumulate(MP::multiply(lhs, rhs));
            }
            out.push(sum);
        }
    }

    out
}

/// Accumulators of a matmul grouped along M, as a dense row-major `m × n` matrix.
///
/// Row `i` is multiplied by the weights of the group owning it, the `g`-th matrix of `b` being
/// `b_stride` elements after the first. Rows owned by no group are `None`.
pub fn reference_grouped_slice_m<MP: MatmulPrecision>(
    shape: &GemmCoord,
    groups: &GroupList,
    a: &[InputOf<MP>],
    a_layout: &MatrixLayout,
    b: &[InputOf<MP>],
    b_layout: &MatrixLayout,
    b_stride: usize,
) -> Vec<Option<AccOf<MP>>> {
    let mut out = Vec::with_capacity(shape.m * shape.n);

    for row in 0..shape.m {
        let Some(group) = groups.group_of(row) else {
            out.extend(core::iter::repeat_n(None, shape.n));
            continue;
        };
        let weights = &b[group * b_stride..];

        for column in 0..shape.n {
            let mut sum = AccOf::<MP>::default();
            for depth in 0..shape.k {
                let lhs = a[a_layout.offset(MatrixCoord::new(row, depth))];
                let rhs = weights[b_layout.offset(MatrixCoord::new(depth, column))];
                sum = sum.accumulate(MP::multiply(lhs, rhs));
            }
            out.push(Some(sum));
        }
    }

    out
}

#[derive(Clone, Copy, Debug)]
/// Host copies of the scales of a dequantizing launch.
pub struct HostScales<'a, ES> {
    /// One scale per row.
    pub per_token: Option<&'a [ES]>,
    /// One scale per column.
    pub per_column: Option<&'a [ES]>,
    /// One scale for the whole output.
    pub scalar: Option<f32>,
}

impl<ES> Default for HostScales<'_, ES> {
    fn default() -> Self {
        Self {
            per_token: None,
            per_column: None,
            scalar: None,
        }
    }
}

/// Dequantizes dense row-major accumulators: `cast(acc · r[i] · c[j] · s)`, absent factors
/// being one.
pub fn reference_dequant<Acc: Element, ES: Element, EO: Element>(
    acc: &[Acc],
    columns: usize,
    scales: &HostScales<'_, ES>,
) -> Vec<EO> {
    if scales.per_token.is_none() && scales.per_column.is_none() && scales.scalar.is_none() {
        return acc.iter().map(|value| fixpipe_convert(*value, None)).collect();
    }

    acc.iter()
        .enumerate()
        .map(|(index, value)| {
            let (row, column) = (index / columns, index % columns);
            let mut value = value.to_f32();
            if let Some(scales) = scales.per_token {
                value *= scales[row].to_f32();
            }
            if let Some(scales) = scales.per_column {
                value *= scales[column].to_f32();
            }
            if let Some(scalar) = scales.scalar {
                value *= scalar;
            }
            EO::from_f32(value)
        })
        .collect()
}

/// Reads the `layout.rows() × layout.columns()` matrix held in `data` into a dense row-major
/// vector.
pub fn to_row_major<E: Element>(data: &[E], layout: &MatrixLayout) -> Vec<E> {
    let mut out = Vec::with_capacity(layout.rows() * layout.columns());
    for row in 0..layout.rows() {
        for column in 0..layout.columns() {
            out.push(data[layout.offset(MatrixCoord::new(row, column))]);
        }
    }
    out
}

/// Compares two outputs element-wise with a relative tolerance.
///
/// Values pass when `|actual - expected| <= epsilon · max(1, |expected|)`.
pub fn assert_equals_approx<E: Element>(
    actual: &[E],
    expected: &[E],
    epsilon: f32,
) -> Result<(), String> {
    if actual.len() != expected.len() {
        return Err(format!(
            "Length mismatch: actual={}, expected={}",
            actual.len(),
            expected.len()
        ));
    }

    for (index, (actual, expected)) in actual.iter().zip(expected.iter()).enumerate() {
        let (actual, expected) = (actual.to_f32(), expected.to_f32());
        let difference = (actual - expected).abs();
        let tolerance = epsilon * expected.abs().max(1.0);

        if difference > tolerance || difference.is_nan() {
            return Err(format!(
                "Values differ more than epsilon: index={index} actual={actual}, expected={expected}, difference={difference}, epsilon={epsilon}"
            ));
        }
    }

    Ok(())
}

/// Compares two outputs bit for bit.
pub fn assert_equals_exact<E: Element>(actual: &[E], expected: &[E]) -> Result<(), String> {
    if actual.len() != expected.len() {
        return Err(format!(
            "Length mismatch: actual={}, expected={}",
            actual.len(),
            expected.len()
        ));
    }

    match E::as_bytes(actual) == E::as_bytes(expected) {
        true => Ok(()),
        false => {
            let index = actual
                .iter()
                .zip(expected.iter())
                .position(|(actual, expected)| {
                    E::as_bytes(core::slice::from_ref(actual))
                        != E::as_bytes(core::slice::from_ref(expected))
                })
                .unwrap_or(0);
            Err(format!(
                "Values differ at index={index}: actual={:?}, expected={:?}",
                actual[index], expected[index]
            ))
        }
    }
}
