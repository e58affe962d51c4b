use tessel_common::Element;
use tessel_runtime::ComputeClient;

use super::base::{KernelSetup, check_output_layout, core_tasks};
use crate::{
    KernelInfo, KernelKind,
    components::{
        AccOf, GlobalTensor, InputOf, MatmulPrecision, MatmulProblem, MatmulSelection,
        MatmulSetupError, MatrixCoord, TensorArg,
        global::{FixpipeSink, OperandSlice, ProblemOperands},
    },
};

/// Launches `C = cast(A·B)`.
///
/// A and B may be row-major or column-major, C is row-major. Accumulators go straight from the
/// matrix unit to C, copied bit for bit when C has the accumulator type.
pub fn launch_ref<MP: MatmulPrecision, EO: Element>(
    client: &ComputeClient,
    problem: &MatmulProblem,
    a: &TensorArg<'_>,
    b: &TensorArg<'_>,
    c: &TensorArg<'_>,
    selection: &MatmulSelection,
) -> Result<(), MatmulSetupError> {
    problem.validate()?;
    let shape = problem.shape();
    a.validate::<InputOf<MP>>("a", shape.m, shape.k, 1, 0)?;
    b.validate::<InputOf<MP>>("b", shape.k, shape.n, 1, 0)?;
    c.validate::<EO>("c", shape.m, shape.n, 1, 0)?;
    check_output_layout("c", &c.layout)?;

    let setup = KernelSetup::<MP>::new(client, selection, &shape)?;
    let scheduler = setup.scheduler(shape, 1);
    let block_dim = setup.block_dim(scheduler.core_loops());
    let info = KernelInfo::new(KernelKind::Basic, InputOf::<MP>::KIND, EO::KIND, shape)
        .with_layouts(&a.layout, &b.layout);
    client.log_launch(setup.info(info, block_dim));

    let mmad = setup.block_mmad();
    let lhs = GlobalTensor::<InputOf<MP>>::new(a.handle.clone());
    let rhs = GlobalTensor::<InputOf<MP>>::new(b.handle.clone());
    let out = GlobalTensor::<EO>::new(c.handle.clone());
    let operands = ProblemOperands::new(
        0,
        OperandSlice::new(0, a.layout, MatrixCoord::default()),
        OperandSlice::new(0, b.layout, MatrixCoord::default()),
        OperandSlice::new(0, c.layout, MatrixCoord::default()),
        0,
        0,
    );

    client.launch(KernelKind::Basic.name(), block_dim, |core| {
        let tasks = core_tasks(
            &scheduler,
            core.block_idx() as usize,
            core.block_num() as usize,
            |_| operands,
        );
        let mut sink = FixpipeSink::<AccOf<MP>, EO>::new(&out, None);
        mmad.execute(core, &lhs, &rhs, &tasks, &mut sink)
    })?;

    Ok(())
}
