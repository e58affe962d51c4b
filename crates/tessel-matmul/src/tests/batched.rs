use half::f16;
use tessel_runtime::ComputeClient;

use super::test_utils::{
    TestTensor, assert_ok, assert_untouched_outside, expected_output, output_matrix, row_major,
    small_tiling,
};
use crate::{
    components::{
        BatchStrides, GemmCoord, Layout, MatmulProblem, MatmulSelection, MatmulSetupError,
        MatmulAvailabilityError,
    },
    kernels::batched,
    verification::{HostScales, assert_equals_exact},
};

fn test_batched(
    client: &ComputeClient,
    problem: MatmulProblem,
    batch_count: usize,
    strides: BatchStrides,
    quant_scale: f32,
    selection: &MatmulSelection,
) {
    let shape = problem.shape();
    let a_layout = row_major(shape.m, shape.k);
    let b_layout = row_major(shape.k, shape.n);
    let c_layout = row_major(shape.m, shape.n);

    let a = TestTensor::<i8>::from_data(
        client,
        tessel_common::rand::random_vec(strides.a * batch_count, 21),
        a_layout,
    );
    let b = TestTensor::<i8>::from_data(
        client,
        tessel_common::rand::random_vec(strides.b * batch_count, 22),
        b_layout,
    );
    let c = TestTensor::<f16>::sentinel(client, c_layout, strides.c * batch_count);

    batched::launch_ref::<i8, f16>(
        client,
        &problem,
        batch_count,
        Some(strides),
        &a.arg(),
        &b.arg(),
        &c.arg(),
        quant_scale,
        selection,
    )
    .unwrap();

    let out = c.read(client);
    let scales = HostScales::<f32> {
        scalar: Some(quant_scale),
        ..Default::default()
    };

    for batch in 0..batch_count {
        let expected = expected_output::<i8, f32, f16>(
            &shape,
            &a.matrix(batch, strides.a),
            &a_layout,
            &b.matrix(batch, strides.b),
            &b_layout,
            &scales,
        );
        assert_ok(assert_equals_exact(
            &output_matrix(&out, &c_layout, batch, strides.c),
            &expected,
        ));
    }
    assert_untouched_outside(&out, &c_layout, batch_count, strides.c);
}

/// Four dense batches of 256×128×128 scaled by 2.
pub fn test_four_batches_scaled(client: &ComputeClient) {
    let problem = MatmulProblem::new(256, 128, 128);

    test_batched(
        client,
        problem,
        4,
        BatchStrides::contiguous(&problem),
        2.0,
        &MatmulSelection::quant(),
    );
}

/// Batches separated by gaps the kernel must not write to.
pub fn test_strided_batches(client: &ComputeClient) {
    let problem = MatmulProblem::new(45, 40, 96);
    let strides = BatchStrides {
        a: 45 * 96 + 32,
        b: 96 * 40 + 64,
        c: 45 * 40 + 17,
    };

    test_batched(
        client,
        problem,
        3,
        strides,
        0.25,
        &MatmulSelection::builder(small_tiling()).build(),
    );
}

/// Integer outputs can't hold a scaled result.
pub fn test_rejects_integer_output(client: &ComputeClient) {
    let shape = GemmCoord::new(16, 16, 32);
    let a = TestTensor::<i8>::random(client, row_major(shape.m, shape.k), 1);
    let b = TestTensor::<i8>::random(client, row_major(shape.k, shape.n), 2);
    let c_layout = row_major(shape.m, shape.n);
    let c = TestTensor::<i32>::sentinel(client, c_layout, c_layout.required_len());

    let result = batched::launch_ref::<i8, i32>(
        client,
        &MatmulProblem::new(shape.m, shape.n, shape.k),
        1,
        None,
        &a.arg(),
        &b.arg(),
        &c.arg(),
        1.0,
        &MatmulSelection::quant(),
    );

    assert!(matches!(
        result,
        Err(MatmulSetupError::Unavailable(
            MatmulAvailabilityError::TypesUnavailable { .. }
        ))
    ));
}
