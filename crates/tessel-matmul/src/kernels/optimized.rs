use tessel_common::Element;
use tessel_runtime::ComputeClient;

use super::{
    PaddedOperand,
    base::{KernelSetup, check_float_output, check_output_layout, core_tasks},
};
use crate::{
    KernelInfo, KernelKind,
    components::{
        AccOf, GlobalTensor, InputOf, MatmulPrecision, MatmulProblem, MatmulSelection,
        MatmulSetupError, MatrixCoord, MatrixLayout, MatrixOrder, TensorArg, TilingScheme,
        global::{FixpipeSink, OperandSlice, ProblemOperands},
    },
};

/// Selection of the padded kernel for the given operand layouts.
///
/// Two column-major operands get tall tiles.
pub fn selection(a: &MatrixLayout, b: &MatrixLayout) -> MatmulSelection {
    let mut selection = MatmulSelection::optimized();
    if a.order() == MatrixOrder::ColumnMajor && b.order() == MatrixOrder::ColumnMajor {
        selection.tiling_scheme = TilingScheme::tall_quant_matmul();
    }
    selection
}

/// Launches `C = cast(A·B · quant_scale)`, repacking unaligned operands first.
///
/// An operand whose leading stride the copy engine can't stream efficiently is copied into a
/// zero-padded, tile-blocked workspace by all cores, which then meet at a barrier before the
/// matmul starts. Aligned operands are read in place. The workspaces are released when the
/// launch returns.
#[allow(clippy::too_many_arguments)]
pub fn launch_ref<MP: MatmulPrecision, EO: Element>(
    client: &ComputeClient,
    problem: &MatmulProblem,
    a: &TensorArg<'_>,
    b: &TensorArg<'_>,
    c: &TensorArg<'_>,
    quant_scale: f32,
    selection: &MatmulSelection,
) -> Result<(), MatmulSetupError> {
    problem.validate()?;
    check_float_output::<MP, EO>()?;

    let shape = problem.shape();
    a.validate::<InputOf<MP>>("a", shape.m, shape.k, 1, 0)?;
    b.validate::<InputOf<MP>>("b", shape.k, shape.n, 1, 0)?;
    c.validate::<EO>("c", shape.m, shape.n, 1, 0)?;
    check_output_layout("c", &c.layout)?;
    if a.layout.is_padded() || b.layout.is_padded() {
        return Err(MatmulSetupError::invalid_config(
            "Operands of the padded kernel must be plain row-major or column-major",
        ));
    }

    let setup = KernelSetup::<MP>::new(client, selection, &shape)?;
    let l1 = setup.tiling.l1;
    let padded_a = PaddedOperand::prepare::<InputOf<MP>>(
        client,
        a.handle,
        a.layout,
        MatrixCoord::new(l1.m, l1.k),
    )?;
    let padded_b = PaddedOperand::prepare::<InputOf<MP>>(
        client,
        b.handle,
        b.layout,
        MatrixCoord::new(l1.k, l1.n),
    )?;

    let scheduler = setup.scheduler(shape, 1);
    let block_dim = setup.block_dim(scheduler.core_loops());
    let mut info = KernelInfo::new(KernelKind::OptimizedQuant, InputOf::<MP>::KIND, EO::KIND, shape)
        .with_layouts(&a.layout, &b.layout);
    info.padded = (padded_a.is_padded(), padded_b.is_padded());
    client.log_launch(setup.info(info, block_dim));

    let (lhs, lhs_layout) = padded_a.operand();
    let (rhs, rhs_layout) = padded_b.operand();
    let lhs = GlobalTensor::<InputOf<MP>>::new(lhs.clone());
    let rhs = GlobalTensor::<InputOf<MP>>::new(rhs.clone());
    let out = GlobalTensor::<EO>::new(c.handle.clone());
    let operands = ProblemOperands::new(
        0,
        OperandSlice::new(0, lhs_layout, MatrixCoord::default()),
        OperandSlice::new(0, rhs_layout, MatrixCoord::default()),
        OperandSlice::new(0, c.layout, MatrixCoord::default()),
        0,
        0,
    );
    let mmad = setup.block_mmad();
    let repacks = padded_a.is_padded() || padded_b.is_padded();

    client.launch(KernelKind::OptimizedQuant.name(), block_dim, |core| {
        let core_idx = core.block_idx() as usize;
        let core_num = core.block_num() as usize;

        if repacks {
            padded_a.repack::<InputOf<MP>>(core_idx, core_num);
            padded_b.repack::<InputOf<MP>>(core_idx, core_num);
            core.sync_all()?;
        }

        let tasks = core_tasks(&scheduler, core_idx, core_num, |_| operands);
        let mut sink = FixpipeSink::<AccOf<MP>, EO>::new(&out, Some(quant_scale));
        mmad.execute(core, &lhs, &rhs, &tasks, &mut sink)
    })?;

    Ok(())
}
