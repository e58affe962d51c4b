use tessel_common::Element;
use tessel_runtime::{ComputeClient, Handle};

use super::base::{
    KernelSetup, check_float_output, check_output_layout, rotated_core_tasks, run_with_epilogue,
};
use crate::{
    GroupSplit, KernelInfo, KernelKind,
    components::{
        AccOf, GemmCoord, GlobalTensor, GroupList, InputOf, Layout, MatmulPrecision,
        MatmulProblem, MatmulSelection, MatmulSetupError, MatrixCoord, MatrixLayout, TensorArg,
        epilogue::{DequantParams, EpilogueCadence, WorkspaceMapping},
        global::{OperandSlice, ProblemOperands},
        validate_len,
    },
};

/// Buffers of a grouped matmul split along K.
pub struct GroupedSliceKArgs<'a> {
    /// `group_count` cumulative ends along K, as `i64`.
    pub group_list: &'a Handle,
    pub group_count: usize,
    /// `M × K`, every group reading its own columns.
    pub a: TensorArg<'a>,
    /// `K × N`, every group reading its own rows.
    pub b: TensorArg<'a>,
    /// `group_count × N` per-column scales.
    pub scale: &'a Handle,
    /// `group_count × M` per-token scales.
    pub per_token_scale: &'a Handle,
    /// `M × N` output of one group; group `g` starts `g` output sizes into the buffer.
    pub d: TensorArg<'a>,
    /// Int32 accumulators of every group, see [workspace_len]. Unused with the direct cadence.
    pub workspace: Option<&'a Handle>,
}

/// Elements of the accumulator workspace of a grouped launch.
pub fn workspace_len(problem: &MatmulProblem, group_count: usize) -> usize {
    problem.m * problem.n * group_count
}

/// Launches `D[g] = cast(A[:, K_g]·B[K_g, :] · r_g[i] · c_g[j])` for every group `g`.
///
/// Groups are scheduled one after the other; the core that starts each group rotates so the
/// tail blocks of consecutive groups land on different cores. Empty groups produce zeros.
pub fn launch_ref<MP: MatmulPrecision, ES: Element, EO: Element>(
    client: &ComputeClient,
    problem: &MatmulProblem,
    args: &GroupedSliceKArgs<'_>,
    selection: &MatmulSelection,
) -> Result<(), MatmulSetupError> {
    problem.validate()?;
    check_float_output::<MP, EO>()?;

    let shape = problem.shape();
    let group_count = args.group_count;
    let groups = GroupList::from_handle(args.group_list, group_count)?;
    groups.validate(group_count, shape.k)?;

    let output_len = args.d.layout.required_len();
    args.a.validate::<InputOf<MP>>("a", shape.m, shape.k, 1, 0)?;
    args.b.validate::<InputOf<MP>>("b", shape.k, shape.n, 1, 0)?;
    args.d.validate::<EO>("d", shape.m, shape.n, group_count, output_len)?;
    check_output_layout("d", &args.d.layout)?;
    validate_len::<ES>("scale", args.scale, shape.n, group_count, shape.n)?;
    validate_len::<ES>("per_token_scale", args.per_token_scale, shape.m, group_count, shape.m)?;

    let setup = KernelSetup::<MP>::new(client, selection, &shape)?;
    let epilogue = selection
        .epilogue
        .resolve::<AccOf<MP>, ES, EO>(&setup.tiling.l1, client.properties())?;
    let workspace_layout = MatrixLayout::row_major(shape.m, shape.n)
        .map_err(|err| MatmulSetupError::invalid_problem(format!("{err}")))?;
    let workspace = match (epilogue.cadence, args.workspace) {
        (EpilogueCadence::Direct, _) => None,
        (EpilogueCadence::Workspace { .. }, Some(handle)) => {
            validate_len::<AccOf<MP>>(
                "workspace",
                handle,
                workspace_layout.required_len(),
                group_count,
                workspace_layout.required_len(),
            )?;
            Some(GlobalTensor::<AccOf<MP>>::new(handle.clone()))
        }
        (EpilogueCadence::Workspace { .. }, None) => {
            return Err(MatmulSetupError::invalid_problem(
                "Grouped matmul needs a workspace with the workspace cadence",
            ));
        }
    };

    let scale = GlobalTensor::<ES>::new(args.scale.clone());
    let per_token_scale = GlobalTensor::<ES>::new(args.per_token_scale.clone());
    let params = DequantParams::none()
        .with_per_token(&per_token_scale)
        .with_per_column(&scale);
    params.path()?;

    let problems = (0..group_count)
        .map(|group| {
            let range = groups.range(group);
            let sub_problem = GemmCoord::new(shape.m, shape.n, range.len());
            let operands = ProblemOperands::new(
                group,
                OperandSlice::new(0, args.a.layout, MatrixCoord::new(0, range.start)),
                OperandSlice::new(0, args.b.layout, MatrixCoord::new(range.start, 0)),
                OperandSlice::new(group * output_len, args.d.layout, MatrixCoord::default()),
                group * shape.m,
                group * shape.n,
            );
            (setup.scheduler(sub_problem, 1), operands)
        })
        .collect::<Vec<_>>();
    let loops = problems
        .iter()
        .map(|(scheduler, _)| scheduler.core_loops())
        .sum();
    let block_dim = setup.block_dim(loops);

    let mut info = KernelInfo::new(KernelKind::GroupedSliceK, InputOf::<MP>::KIND, EO::KIND, shape)
        .with_layouts(&args.a.layout, &args.b.layout);
    info.group_count = group_count;
    info.split = Some(GroupSplit::K);
    client.log_launch(setup.info(info, block_dim));

    let mmad = setup.block_mmad();
    let lhs = GlobalTensor::<InputOf<MP>>::new(args.a.handle.clone());
    let rhs = GlobalTensor::<InputOf<MP>>::new(args.b.handle.clone());
    let out = GlobalTensor::<EO>::new(args.d.handle.clone());
    let mapping = WorkspaceMapping::Full {
        layout: workspace_layout,
    };

    client.launch(KernelKind::GroupedSliceK.name(), block_dim, |core| {
        let tasks = rotated_core_tasks(
            problems.iter().copied(),
            core.block_idx() as usize,
            core.block_num() as usize,
        );
        run_with_epilogue(
            core,
            &mmad,
            &lhs,
            &rhs,
            &tasks,
            epilogue,
            params,
            &out,
            workspace.as_ref().map(|workspace| (workspace, mapping)),
        )
    })?;

    Ok(())
}
