use half::{bf16, f16};
use tessel_common::Element;
use tessel_runtime::ComputeClient;

use super::test_utils::{
    TestTensor, assert_ok, assert_untouched_outside, expected_output, row_major, scales,
    small_epilogue, small_tiling,
};
use crate::{
    components::{
        DispatchPolicy, GemmCoord, Layout, MatmulProblem, MatmulSelection, MatmulSetupError,
        MmadSelection,
        epilogue::EpilogueCadence,
    },
    kernels::quant::{self, QuantMatmulArgs},
    verification::{HostScales, assert_equals_approx},
};

/// Scales a launch of the multistage kernel is given.
#[derive(Clone, Copy, Debug)]
pub struct ScaleSet {
    pub per_token: bool,
    pub per_column: bool,
}

/// Runs the multistage kernel on random data and returns its output.
pub fn run_quant<EO: Element>(
    client: &ComputeClient,
    shape: GemmCoord,
    scale_set: ScaleSet,
    selection: &MatmulSelection,
) -> Result<Vec<EO>, MatmulSetupError> {
    let a = TestTensor::<i8>::random(client, row_major(shape.m, shape.k), 61);
    let b = TestTensor::<i8>::random(client, row_major(shape.k, shape.n), 62);
    let d_layout = row_major(shape.m, shape.n);
    let d = TestTensor::<EO>::sentinel(client, d_layout, d_layout.required_len());
    let (scale, scale_handle) = scales::<f32>(client, shape.n, 63);
    let (per_token, per_token_handle) = scales::<f32>(client, shape.m, 64);

    let args = QuantMatmulArgs {
        a: a.arg(),
        b: b.arg(),
        scale: scale_set.per_column.then_some(&scale_handle),
        per_token_scale: scale_set.per_token.then_some(&per_token_handle),
        d: d.arg(),
    };
    quant::launch_ref::<i8, f32, EO>(
        client,
        &MatmulProblem::new(shape.m, shape.n, shape.k),
        &args,
        selection,
    )?;

    let out = d.read(client);
    let host_scales = HostScales {
        per_token: scale_set.per_token.then_some(&per_token[..]),
        per_column: scale_set.per_column.then_some(&scale[..]),
        scalar: None,
    };
    let expected = expected_output::<i8, f32, EO>(
        &shape,
        &a.data,
        &a.layout,
        &b.data,
        &b.layout,
        &host_scales,
    );
    assert_ok(assert_equals_approx(&out, &expected, 1e-2));
    assert_untouched_outside(&out, &d_layout, 1, 0);

    Ok(out)
}

/// Small tiles, so blocks outnumber cores and workspace slots get reused.
pub fn small_quant_selection(policy: DispatchPolicy, stages: usize) -> MatmulSelection {
    MatmulSelection::builder(small_tiling())
        .mmad(MmadSelection::new(policy).preload_stages(1).shuffle_k(true))
        .epilogue(small_epilogue(EpilogueCadence::Workspace { stages }))
        .build()
}

/// Every fast path of the epilogue.
pub fn test_epilogue_paths(client: &ComputeClient) {
    let shape = GemmCoord::new(100, 70, 130);
    let selection = small_quant_selection(DispatchPolicy::PreloadAsyncWithCallback, 2);

    for (per_token, per_column) in [(true, true), (true, false), (false, true), (false, false)] {
        run_quant::<bf16>(
            client,
            shape,
            ScaleSet {
                per_token,
                per_column,
            },
            &selection,
        )
        .unwrap();
    }
}

/// The default tiles with per-token and per-column scales.
pub fn test_default_selection(client: &ComputeClient) {
    run_quant::<f16>(
        client,
        GemmCoord::new(256, 512, 1024),
        ScaleSet {
            per_token: true,
            per_column: true,
        },
        &MatmulSelection::multistage_workspace(),
    )
    .unwrap();
}

/// A single workspace slot serializes the matrix and vector units without changing the result.
pub fn test_single_workspace_stage(client: &ComputeClient) {
    let shape = GemmCoord::new(96, 96, 64);
    let scale_set = ScaleSet {
        per_token: true,
        per_column: true,
    };

    let single = run_quant::<bf16>(
        client,
        shape,
        scale_set,
        &small_quant_selection(DispatchPolicy::PreloadAsyncWithCallback, 1),
    )
    .unwrap();
    let deep = run_quant::<bf16>(
        client,
        shape,
        scale_set,
        &small_quant_selection(DispatchPolicy::PreloadAsyncWithCallback, 4),
    )
    .unwrap();

    pretty_assertions::assert_eq!(single, deep);
}

/// The kernel needs its workspace ring.
pub fn test_rejects_direct_cadence(client: &ComputeClient) {
    let selection = MatmulSelection::builder(small_tiling())
        .epilogue(small_epilogue(EpilogueCadence::Direct))
        .build();

    let result = run_quant::<bf16>(
        client,
        GemmCoord::new(32, 32, 64),
        ScaleSet {
            per_token: true,
            per_column: false,
        },
        &selection,
    );

    assert!(matches!(result, Err(MatmulSetupError::InvalidConfig(_))));
}
