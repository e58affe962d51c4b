use half::f16;
use tessel_runtime::ComputeClient;

use super::test_utils::{
    TestTensor, assert_ok, assert_untouched_outside, column_major, expected_output,
    output_matrix, row_major, small_tiling,
};
use crate::{
    components::{
        ColumnMajor, DispatchPolicy, GemmCoord, Layout, MatmulProblem, MatmulSelection,
        MatrixLayout, MmadSelection, RowMajor, TilingScheme,
    },
    kernels::{batched, optimized},
    verification::{HostScales, assert_equals_exact},
};

const QUANT_SCALE: f32 = 0.125;

fn launch_optimized(
    client: &ComputeClient,
    shape: GemmCoord,
    a: &TestTensor<i8>,
    b: &TestTensor<i8>,
    selection: &MatmulSelection,
) -> Vec<f16> {
    let c_layout = row_major(shape.m, shape.n);
    let c = TestTensor::<f16>::sentinel(client, c_layout, c_layout.required_len());

    optimized::launch_ref::<i8, f16>(
        client,
        &MatmulProblem::new(shape.m, shape.n, shape.k),
        &a.arg(),
        &b.arg(),
        &c.arg(),
        QUANT_SCALE,
        selection,
    )
    .unwrap();

    let out = c.read(client);
    assert_untouched_outside(&out, &c_layout, 1, 0);
    out
}

fn expected(shape: &GemmCoord, a: &TestTensor<i8>, b: &TestTensor<i8>) -> Vec<f16> {
    expected_output::<i8, f32, f16>(
        shape,
        &a.data,
        &a.layout,
        &b.data,
        &b.layout,
        &HostScales {
            scalar: Some(QUANT_SCALE),
            ..Default::default()
        },
    )
}

/// Unaligned operands are repacked, and the result is the one of the unpadded kernel.
pub fn test_padding_equivalence(client: &ComputeClient) {
    let shape = GemmCoord::new(70, 90, 300);
    let a_layout: MatrixLayout = RowMajor::with_stride(shape.m, shape.k, 310).unwrap().into();
    let b_layout: MatrixLayout = ColumnMajor::with_stride(shape.k, shape.n, 301)
        .unwrap()
        .into();
    let a = TestTensor::<i8>::random(client, a_layout, 51);
    let b = TestTensor::<i8>::random(client, b_layout, 52);
    let selection = MatmulSelection::builder(small_tiling())
        .mmad(
            MmadSelection::new(DispatchPolicy::Preload)
                .unit_flag(true)
                .shuffle_k(true),
        )
        .build();

    let padded = launch_optimized(client, shape, &a, &b, &selection);
    assert_ok(assert_equals_exact(
        &output_matrix(&padded, &row_major(shape.m, shape.n), 0, 0),
        &expected(&shape, &a, &b),
    ));

    let c_layout = row_major(shape.m, shape.n);
    let c = TestTensor::<f16>::sentinel(client, c_layout, c_layout.required_len());
    batched::launch_ref::<i8, f16>(
        client,
        &MatmulProblem::new(shape.m, shape.n, shape.k),
        1,
        None,
        &a.arg(),
        &b.arg(),
        &c.arg(),
        QUANT_SCALE,
        &selection,
    )
    .unwrap();
    assert_ok(assert_equals_exact(&padded, &c.read(client)));
}

/// Aligned operands are read in place.
pub fn test_aligned_operands(client: &ComputeClient) {
    let shape = GemmCoord::new(40, 512, 256);
    let a = TestTensor::<i8>::random(client, row_major(shape.m, shape.k), 53);
    let b = TestTensor::<i8>::random(client, row_major(shape.k, shape.n), 54);
    let selection = optimized::selection(&a.layout, &b.layout);

    let out = launch_optimized(client, shape, &a, &b, &selection);

    assert_ok(assert_equals_exact(&out, &expected(&shape, &a, &b)));
}

/// Two column-major operands select tall tiles.
pub fn test_column_major_operands(client: &ComputeClient) {
    let shape = GemmCoord::new(300, 40, 64);
    let a = TestTensor::<i8>::random(client, column_major(shape.m, shape.k), 55);
    let b = TestTensor::<i8>::random(client, column_major(shape.k, shape.n), 56);
    let selection = optimized::selection(&a.layout, &b.layout);
    assert_eq!(selection.tiling_scheme, TilingScheme::tall_quant_matmul());

    let out = launch_optimized(client, shape, &a, &b, &selection);

    assert_ok(assert_equals_exact(&out, &expected(&shape, &a, &b)));
}
