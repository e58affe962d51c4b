use tessel_common::Element;
use tessel_runtime::ComputeClient;

use super::base::{KernelSetup, check_float_output, check_output_layout, core_tasks};
use crate::{
    KernelInfo, KernelKind,
    components::{
        AccOf, BatchStrides, GlobalTensor, InputOf, MatmulPrecision, MatmulProblem,
        MatmulSelection, MatmulSetupError, MatrixCoord, TensorArg,
        global::{FixpipeSink, OperandSlice, ProblemOperands},
    },
};

/// Launches `C[b] = cast(A[b]·B[b] · quant_scale)` for `batch_count` problems.
///
/// Batch `b` of an operand starts `b · stride` elements into its buffer. Strides default to the
/// dense size of one matrix.
#[allow(clippy::too_many_arguments)]
pub fn launch_ref<MP: MatmulPrecision, EO: Element>(
    client: &ComputeClient,
    problem: &MatmulProblem,
    batch_count: usize,
    strides: Option<BatchStrides>,
    a: &TensorArg<'_>,
    b: &TensorArg<'_>,
    c: &TensorArg<'_>,
    quant_scale: f32,
    selection: &MatmulSelection,
) -> Result<(), MatmulSetupError> {
    problem.validate()?;
    if batch_count == 0 {
        return Err(MatmulSetupError::invalid_problem("Batch count must be positive"));
    }
    check_float_output::<MP, EO>()?;

    let shape = problem.shape();
    let strides = strides.unwrap_or_else(|| BatchStrides::contiguous(problem));
    a.validate::<InputOf<MP>>("a", shape.m, shape.k, batch_count, strides.a)?;
    b.validate::<InputOf<MP>>("b", shape.k, shape.n, batch_count, strides.b)?;
    c.validate::<EO>("c", shape.m, shape.n, batch_count, strides.c)?;
    check_output_layout("c", &c.layout)?;

    let setup = KernelSetup::<MP>::new(client, selection, &shape)?;
    let scheduler = setup.scheduler(shape, batch_count);
    let block_dim = setup.block_dim(scheduler.core_loops());
    let mut info = KernelInfo::new(KernelKind::BatchedQuant, InputOf::<MP>::KIND, EO::KIND, shape)
        .with_layouts(&a.layout, &b.layout);
    info.batch_count = batch_count;
    client.log_launch(setup.info(info, block_dim));

    let mmad = setup.block_mmad();
    let lhs = GlobalTensor::<InputOf<MP>>::new(a.handle.clone());
    let rhs = GlobalTensor::<InputOf<MP>>::new(b.handle.clone());
    let out = GlobalTensor::<EO>::new(c.handle.clone());
    let operands = |batch: usize| {
        ProblemOperands::new(
            batch,
            OperandSlice::new(batch * strides.a, a.layout, MatrixCoord::default()),
            OperandSlice::new(batch * strides.b, b.layout, MatrixCoord::default()),
            OperandSlice::new(batch * strides.c, c.layout, MatrixCoord::default()),
            0,
            0,
        )
    };

    client.launch(KernelKind::BatchedQuant.name(), block_dim, |core| {
        let tasks = core_tasks(
            &scheduler,
            core.block_idx() as usize,
            core.block_num() as usize,
            operands,
        );
        let mut sink = FixpipeSink::<AccOf<MP>, EO>::new(&out, Some(quant_scale));
        mmad.execute(core, &lhs, &rhs, &tasks, &mut sink)
    })?;

    Ok(())
}
