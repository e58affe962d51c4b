use tessel_common::Element;
use tessel_runtime::{ComputeClient, Handle};

use super::base::{
    KernelSetup, check_float_output, check_output_layout, core_tasks, run_with_epilogue,
};
use crate::{
    KernelInfo, KernelKind,
    components::{
        AccOf, GlobalTensor, InputOf, Layout, MatmulPrecision, MatmulProblem, MatmulSelection,
        MatmulSetupError, MatrixCoord, MatrixLayout, TensorArg, TileSize,
        epilogue::{DequantParams, EpilogueCadence, WorkspaceMapping},
        global::{OperandSlice, ProblemOperands},
        validate_len,
    },
};

/// Buffers of the multistage workspace quant matmul.
pub struct QuantMatmulArgs<'a> {
    /// `M × K` int8 activations.
    pub a: TensorArg<'a>,
    /// `K × N` int8 weights.
    pub b: TensorArg<'a>,
    /// `N` per-column scales.
    pub scale: Option<&'a Handle>,
    /// `M` per-token scales.
    pub per_token_scale: Option<&'a Handle>,
    /// `M × N` row-major output.
    pub d: TensorArg<'a>,
}

/// Accumulator elements of the workspace ring: `stages` L1 blocks for each of `cores` cores.
pub fn workspace_len(l1: &TileSize, cores: usize, stages: usize) -> usize {
    l1.m * l1.n * cores * stages
}

/// Launches `D = cast(A·B · r[i] · c[j])`, the epilogue trailing the matmul through a ring of
/// workspace slots.
///
/// The matrix unit of each core writes finished accumulators into its own slots of an int32
/// workspace and moves on; the vector unit dequantizes them in the order they were produced,
/// releasing each slot once done. The workspace is allocated by the launch and released with
/// it.
pub fn launch_ref<MP: MatmulPrecision, ES: Element, EO: Element>(
    client: &ComputeClient,
    problem: &MatmulProblem,
    args: &QuantMatmulArgs<'_>,
    selection: &MatmulSelection,
) -> Result<(), MatmulSetupError> {
    problem.validate()?;
    check_float_output::<MP, EO>()?;

    let shape = problem.shape();
    args.a.validate::<InputOf<MP>>("a", shape.m, shape.k, 1, 0)?;
    args.b.validate::<InputOf<MP>>("b", shape.k, shape.n, 1, 0)?;
    args.d.validate::<EO>("d", shape.m, shape.n, 1, 0)?;
    check_output_layout("d", &args.d.layout)?;
    if let Some(scale) = args.scale {
        validate_len::<ES>("scale", scale, shape.n, 1, 0)?;
    }
    if let Some(scale) = args.per_token_scale {
        validate_len::<ES>("per_token_scale", scale, shape.m, 1, 0)?;
    }

    let setup = KernelSetup::<MP>::new(client, selection, &shape)?;
    let l1 = setup.tiling.l1;
    let epilogue = selection
        .epilogue
        .resolve::<AccOf<MP>, ES, EO>(&l1, client.properties())?;
    let EpilogueCadence::Workspace { stages } = epilogue.cadence else {
        return Err(MatmulSetupError::invalid_config(
            "The multistage kernel needs the workspace cadence",
        ));
    };

    let scale = args.scale.map(|handle| GlobalTensor::<ES>::new(handle.clone()));
    let per_token_scale = args
        .per_token_scale
        .map(|handle| GlobalTensor::<ES>::new(handle.clone()));
    let mut params = DequantParams::none();
    if let Some(scale) = per_token_scale.as_ref() {
        params = params.with_per_token(scale);
    }
    if let Some(scale) = scale.as_ref() {
        params = params.with_per_column(scale);
    }
    params.path()?;

    let scheduler = setup.scheduler(shape, 1);
    let block_dim = setup.block_dim(scheduler.core_loops());
    let slot_layout = MatrixLayout::row_major(l1.m, l1.n)
        .map_err(|err| MatmulSetupError::invalid_problem(format!("{err}")))?;
    let workspace = client
        .empty(workspace_len(&l1, block_dim as usize, stages) * AccOf::<MP>::size())?;
    let workspace = GlobalTensor::<AccOf<MP>>::new(workspace);

    let info = KernelInfo::new(
        KernelKind::MultistageWorkspace,
        InputOf::<MP>::KIND,
        EO::KIND,
        shape,
    )
    .with_layouts(&args.a.layout, &args.b.layout);
    client.log_launch(setup.info(info, block_dim));

    let mmad = setup.block_mmad();
    let lhs = GlobalTensor::<InputOf<MP>>::new(args.a.handle.clone());
    let rhs = GlobalTensor::<InputOf<MP>>::new(args.b.handle.clone());
    let out = GlobalTensor::<EO>::new(args.d.handle.clone());
    let operands = ProblemOperands::new(
        0,
        OperandSlice::new(0, args.a.layout, MatrixCoord::default()),
        OperandSlice::new(0, args.b.layout, MatrixCoord::default()),
        OperandSlice::new(0, args.d.layout, MatrixCoord::default()),
        0,
        0,
    );

    client.launch(KernelKind::MultistageWorkspace.name(), block_dim, |core| {
        let core_idx = core.block_idx() as usize;
        let tasks = core_tasks(&scheduler, core_idx, core.block_num() as usize, |_| operands);
        let mapping = WorkspaceMapping::PerCoreRing {
            base: core_idx * stages * slot_layout.required_len(),
            stages,
            layout: slot_layout,
        };

        run_with_epilogue(
            core,
            &mmad,
            &lhs,
            &rhs,
            &tasks,
            epilogue,
            params,
            &out,
            Some((&workspace, mapping)),
        )
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn workspace_holds_every_stage_of_every_core() {
        let l1 = TileSize::new(128, 256, 512);

        assert_eq!(workspace_len(&l1, 20, 2), 128 * 256 * 40);
    }
}
