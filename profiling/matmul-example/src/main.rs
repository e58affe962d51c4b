use std::sync::Arc;

use half::bf16;
use tessel_common::rand::{random_scales, random_vec};
use tessel_matmul::{
    components::{MatmulProblem, MatmulSelection, MatmulSetupError, MatrixLayout, TensorArg},
    kernels::{
        optimized,
        quant::{self, QuantMatmulArgs},
    },
    verification::{HostScales, assert_equals_approx, reference_dequant, reference_matmul},
};
use tessel_runtime::{
    ComputeClient, HardwareProperties,
    config::{GlobalConfig, profiling::ProfilingLogLevel},
};

fn main() {
    env_logger::init();

    let mut config = GlobalConfig::default();
    config.profiling.logger.level = ProfilingLogLevel::Basic;
    config.profiling.logger.stdout = true;
    let client = ComputeClient::with_config(HardwareProperties::atlas_a2(20), Arc::new(config));

    for (m, n, k) in [(256, 512, 1024), (1000, 700, 300)] {
        let problem = MatmulProblem::new(m, n, k);
        if let Err(err) = run_multistage(&client, &problem) {
            log::error!("Multistage matmul {m}x{n}x{k} failed: {err}");
        }
        if let Err(err) = run_optimized(&client, &problem) {
            log::error!("Optimized matmul {m}x{n}x{k} failed: {err}");
        }
    }

    client.profile_summary();
}

fn run_multistage(client: &ComputeClient, problem: &MatmulProblem) -> Result<(), MatmulSetupError> {
    let shape = problem.shape();
    let a_layout = MatrixLayout::row_major(shape.m, shape.k)?;
    let b_layout = MatrixLayout::row_major(shape.k, shape.n)?;
    let d_layout = MatrixLayout::row_major(shape.m, shape.n)?;

    let a = random_vec::<i8>(shape.m * shape.k, 1);
    let b = random_vec::<i8>(shape.k * shape.n, 2);
    let scale = random_scales::<f32>(shape.n, 3);
    let per_token = random_scales::<f32>(shape.m, 4);

    let a_handle = client.create_from_slice(&a)?;
    let b_handle = client.create_from_slice(&b)?;
    let scale_handle = client.create_from_slice(&scale)?;
    let per_token_handle = client.create_from_slice(&per_token)?;
    let d_handle = client.empty(shape.m * shape.n * 2)?;

    let args = QuantMatmulArgs {
        a: TensorArg::new(&a_handle, a_layout),
        b: TensorArg::new(&b_handle, b_layout),
        scale: Some(&scale_handle),
        per_token_scale: Some(&per_token_handle),
        d: TensorArg::new(&d_handle, d_layout),
    };
    quant::launch_ref::<i8, f32, bf16>(
        client,
        problem,
        &args,
        &MatmulSelection::multistage_workspace(),
    )?;

    let acc = reference_matmul::<i8>(&shape, &a, &a_layout, &b, &b_layout);
    let scales = HostScales {
        per_token: Some(&per_token[..]),
        per_column: Some(&scale[..]),
        scalar: None,
    };
    let expected = reference_dequant::<i32, f32, bf16>(&acc, shape.n, &scales);
    report("multistage", &client.read_elems::<bf16>(&d_handle), &expected);

    Ok(())
}

fn run_optimized(client: &ComputeClient, problem: &MatmulProblem) -> Result<(), MatmulSetupError> {
    let shape = problem.shape();
    let a_layout = MatrixLayout::row_major(shape.m, shape.k)?;
    let b_layout = MatrixLayout::row_major(shape.k, shape.n)?;
    let c_layout = MatrixLayout::row_major(shape.m, shape.n)?;

    let a = random_vec::<i8>(shape.m * shape.k, 5);
    let b = random_vec::<i8>(shape.k * shape.n, 6);

    let a_handle = client.create_from_slice(&a)?;
    let b_handle = client.create_from_slice(&b)?;
    let c_handle = client.empty(shape.m * shape.n * 2)?;

    optimized::launch_ref::<i8, bf16>(
        client,
        problem,
        &TensorArg::new(&a_handle, a_layout),
        &TensorArg::new(&b_handle, b_layout),
        &TensorArg::new(&c_handle, c_layout),
        0.5,
        &optimized::selection(&a_layout, &b_layout),
    )?;

    let acc = reference_matmul::<i8>(&shape, &a, &a_layout, &b, &b_layout);
    let scales = HostScales::<f32> {
        scalar: Some(0.5),
        ..Default::default()
    };
    let expected = reference_dequant::<i32, f32, bf16>(&acc, shape.n, &scales);
    report("optimized", &client.read_elems::<bf16>(&c_handle), &expected);

    Ok(())
}

fn report(name: &str, actual: &[bf16], expected: &[bf16]) {
    match assert_equals_approx(actual, expected, 1e-2) {
        Ok(()) => log::info!("{name}: output matches the host reference"),
        Err(err) => log::error!("{name}: {err}"),
    }
}
