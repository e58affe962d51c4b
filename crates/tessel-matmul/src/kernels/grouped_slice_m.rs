use tessel_common::Element;
use tessel_runtime::{ComputeClient, Handle};

use super::base::{KernelSetup, check_output_layout, rotated_core_tasks};
use crate::{
    GroupSplit, KernelInfo, KernelKind,
    components::{
        AccOf, GemmCoord, GlobalTensor, GroupList, InputOf, Layout, MatmulPrecision,
        MatmulProblem, MatmulSelection, MatmulSetupError, MatrixCoord, TensorArg,
        global::{FixpipeSink, OperandSlice, ProblemOperands},
    },
};

/// Buffers of a grouped matmul split along M.
pub struct GroupedSliceMArgs<'a> {
    /// `group_count` cumulative ends along M, as `i64`.
    pub group_list: &'a Handle,
    pub group_count: usize,
    /// `M × K`, every group reading its own rows.
    pub a: TensorArg<'a>,
    /// `K × N` weights of one group; group `g` starts `g` weight sizes into the buffer.
    pub b: TensorArg<'a>,
    /// `M × N`, every group writing its own rows.
    pub c: TensorArg<'a>,
}

/// Launches `C[M_g, :] = cast(A[M_g, :]·B[g])` for every group `g`.
pub fn launch_ref<MP: MatmulPrecision, EO: Element>(
    client: &ComputeClient,
    problem: &MatmulProblem,
    args: &GroupedSliceMArgs<'_>,
    selection: &MatmulSelection,
) -> Result<(), MatmulSetupError> {
    problem.validate()?;

    let shape = problem.shape();
    let group_count = args.group_count;
    let groups = GroupList::from_handle(args.group_list, group_count)?;
    groups.validate(group_count, shape.m)?;

    let weight_len = args.b.layout.required_len();
    args.a.validate::<InputOf<MP>>("a", shape.m, shape.k, 1, 0)?;
    args.b.validate::<InputOf<MP>>("b", shape.k, shape.n, group_count, weight_len)?;
    args.c.validate::<EO>("c", shape.m, shape.n, 1, 0)?;
    check_output_layout("c", &args.c.layout)?;

    let setup = KernelSetup::<MP>::new(client, selection, &shape)?;
    let problems = (0..group_count)
        .map(|group| {
            let range = groups.range(group);
            let sub_problem = GemmCoord::new(range.len(), shape.n, shape.k);
            let operands = ProblemOperands::new(
                group,
                OperandSlice::new(0, args.a.layout, MatrixCoord::new(range.start, 0)),
                OperandSlice::new(group * weight_len, args.b.layout, MatrixCoord::default()),
                OperandSlice::new(0, args.c.layout, MatrixCoord::new(range.start, 0)),
                0,
                0,
            );
            (setup.scheduler(sub_problem, 1), operands)
        })
        .collect::<Vec<_>>();
    let loops = problems
        .iter()
        .map(|(scheduler, _)| scheduler.core_loops())
        .sum();
    let block_dim = setup.block_dim(loops);

    let mut info = KernelInfo::new(KernelKind::GroupedSliceM, InputOf::<MP>::KIND, EO::KIND, shape)
        .with_layouts(&args.a.layout, &args.b.layout);
    info.group_count = group_count;
    info.split = Some(GroupSplit::M);
    client.log_launch(setup.info(info, block_dim));

    let mmad = setup.block_mmad();
    let lhs = GlobalTensor::<InputOf<MP>>::new(args.a.handle.clone());
    let rhs = GlobalTensor::<InputOf<MP>>::new(args.b.handle.clone());
    let out = GlobalTensor::<EO>::new(args.c.handle.clone());

    client.launch(KernelKind::GroupedSliceM.name(), block_dim, |core| {
        let tasks = rotated_core_tasks(
            problems.iter().copied(),
            core.block_idx() as usize,
            core.block_num() as usize,
        );
        let mut sink = FixpipeSink::<AccOf<MP>, EO>::new(&out, None);
        mmad.execute(core, &lhs, &rhs, &tasks, &mut sink)
    })?;

    Ok(())
}
