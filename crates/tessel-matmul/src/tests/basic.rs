use half::f16;
use tessel_runtime::ComputeClient;

use super::test_utils::{
    TestTensor, assert_ok, assert_untouched_outside, column_major, expected_output,
    output_matrix, row_major, small_tiling,
};
use crate::{
    components::{GemmCoord, Layout, MatmulProblem, MatmulSelection, MatrixLayout, MatrixOrder},
    kernels::basic,
    verification::{HostScales, assert_equals_exact},
};

fn layout(order: MatrixOrder, rows: usize, columns: usize) -> MatrixLayout {
    match order {
        MatrixOrder::RowMajor => row_major(rows, columns),
        MatrixOrder::ColumnMajor => column_major(rows, columns),
    }
}

fn test_basic(
    client: &ComputeClient,
    shape: GemmCoord,
    a_order: MatrixOrder,
    b_order: MatrixOrder,
    selection: &MatmulSelection,
) {
    let a = TestTensor::<f16>::random(client, layout(a_order, shape.m, shape.k), 11);
    let b = TestTensor::<f16>::random(client, layout(b_order, shape.k, shape.n), 12);
    let c_layout = row_major(shape.m, shape.n);
    let c = TestTensor::<f16>::sentinel(client, c_layout, c_layout.required_len() + 64);

    basic::launch_ref::<f16, f16>(
        client,
        &MatmulProblem::new(shape.m, shape.n, shape.k),
        &a.arg(),
        &b.arg(),
        &c.arg(),
        selection,
    )
    .unwrap();

    let out = c.read(client);
    let expected = expected_output::<f16, f32, f16>(
        &shape,
        &a.data,
        &a.layout,
        &b.data,
        &b.layout,
        &HostScales::default(),
    );
    assert_ok(assert_equals_exact(
        &output_matrix(&out, &c_layout, 0, 0),
        &expected,
    ));
    assert_untouched_outside(&out, &c_layout, 1, 0);
}

/// Every combination of operand orders on a single partial block.
pub fn test_layout_combinations(client: &ComputeClient) {
    let shape = GemmCoord::new(100, 200, 300);
    let orders = [MatrixOrder::RowMajor, MatrixOrder::ColumnMajor];

    for a_order in orders {
        for b_order in orders {
            test_basic(client, shape, a_order, b_order, &MatmulSelection::basic());
        }
    }
}

/// Many blocks with partial tiles along every dimension.
pub fn test_edge_blocks(client: &ComputeClient) {
    let selection = MatmulSelection::builder(small_tiling()).build();

    test_basic(
        client,
        GemmCoord::new(70, 50, 100),
        MatrixOrder::RowMajor,
        MatrixOrder::ColumnMajor,
        &selection,
    );
    test_basic(
        client,
        GemmCoord::new(1, 33, 7),
        MatrixOrder::ColumnMajor,
        MatrixOrder::RowMajor,
        &selection,
    );
}
