use half::bf16;
use tessel_runtime::ComputeClient;

use super::{
    quant::{ScaleSet, run_quant, small_quant_selection},
    test_utils::{TestTensor, assert_ok, row_major, small_tiling, test_client},
};
use crate::{
    components::{
        DispatchPolicy, GemmCoord, Layout, MatmulProblem, MatmulSelection, MmadSelection,
        batch::{BlockOrder, BlockOrderSelection, SwizzleDirection},
    },
    kernels::basic,
    verification::assert_equals_exact,
};

const POLICIES: [DispatchPolicy; 5] = [
    DispatchPolicy::Plain,
    DispatchPolicy::Pingpong,
    DispatchPolicy::Preload,
    DispatchPolicy::PreloadAsync,
    DispatchPolicy::PreloadAsyncWithCallback,
];

fn basic_i32(client: &ComputeClient, shape: GemmCoord, selection: &MatmulSelection) -> Vec<i32> {
    let a = TestTensor::<i8>::random(client, row_major(shape.m, shape.k), 71);
    let b = TestTensor::<i8>::random(client, row_major(shape.k, shape.n), 72);
    let c_layout = row_major(shape.m, shape.n);
    let c = TestTensor::<i32>::sentinel(client, c_layout, c_layout.required_len());

    basic::launch_ref::<i8, i32>(
        client,
        &MatmulProblem::new(shape.m, shape.n, shape.k),
        &a.arg(),
        &b.arg(),
        &c.arg(),
        selection,
    )
    .unwrap();

    c.read(client)
}

/// Every dispatch policy, stage count and knob produces the same bits.
pub fn test_policies_are_bit_identical(client: &ComputeClient) {
    let shape = GemmCoord::new(80, 96, 200);
    let reference = basic_i32(client, shape, &MatmulSelection::builder(small_tiling()).build());

    for policy in POLICIES {
        for (unit_flag, shuffle_k) in [(false, false), (true, true)] {
            let mut mmad = MmadSelection::new(policy)
                .unit_flag(unit_flag)
                .shuffle_k(shuffle_k);
            if matches!(
                policy,
                DispatchPolicy::PreloadAsync | DispatchPolicy::PreloadAsyncWithCallback
            ) {
                mmad = mmad.preload_stages(2).l0c_stages(2);
            }
            let selection = MatmulSelection::builder(small_tiling()).mmad(mmad).build();

            let out = basic_i32(client, shape, &selection);
            if let Err(err) = assert_equals_exact(&out, &reference) {
                panic!("Policy {policy} (unit_flag={unit_flag}, shuffle_k={shuffle_k}): {err}");
            }
        }
    }

    let scale_set = ScaleSet {
        per_token: true,
        per_column: true,
    };
    let quant_reference = run_quant::<bf16>(
        client,
        shape,
        scale_set,
        &small_quant_selection(DispatchPolicy::Pingpong, 2),
    )
    .unwrap();
    for policy in POLICIES {
        let out = run_quant::<bf16>(client, shape, scale_set, &small_quant_selection(policy, 2))
            .unwrap();
        if let Err(err) = assert_equals_exact(&out, &quant_reference) {
            panic!("Policy {policy} with the workspace epilogue: {err}");
        }
    }
}

/// Block orders and core counts only change which core computes a block.
pub fn test_results_independent_of_scheduling(client: &ComputeClient) {
    let shape = GemmCoord::new(150, 130, 96);
    let reference = basic_i32(client, shape, &MatmulSelection::builder(small_tiling()).build());

    let orders = [
        BlockOrderSelection::Fixed(BlockOrder::ColMajor),
        BlockOrderSelection::Swizzle { offset: 3 },
        BlockOrderSelection::Fixed(BlockOrder::Swizzle {
            offset: 2,
            direction: SwizzleDirection::Nz,
        }),
    ];
    for order in orders {
        let selection = MatmulSelection::builder(small_tiling())
            .block_order(order)
            .build();
        if let Err(err) = assert_equals_exact(&basic_i32(client, shape, &selection), &reference) {
            panic!("Order {order:?}: {err}");
        }
    }

    for cores in [1, 3, 7] {
        let other = test_client(cores);
        let selection = MatmulSelection::builder(small_tiling())
            .block_order(BlockOrderSelection::Swizzle { offset: 3 })
            .build();
        if let Err(err) = assert_equals_exact(&basic_i32(&other, shape, &selection), &reference) {
            panic!("{cores} cores: {err}");
        }
    }
}

/// Running the same launch twice gives the same bits.
pub fn test_repeated_launches(client: &ComputeClient) {
    let shape = GemmCoord::new(64, 64, 128);
    let selection = small_quant_selection(DispatchPolicy::PreloadAsyncWithCallback, 2);
    let scale_set = ScaleSet {
        per_token: true,
        per_column: false,
    };

    let first = run_quant::<bf16>(client, shape, scale_set, &selection).unwrap();
    let second = run_quant::<bf16>(client, shape, scale_set, &selection).unwrap();

    assert_ok(assert_equals_exact(&first, &second));
}
