use core::marker::PhantomData;

use tessel_common::Element;
use tessel_runtime::{
    ComputeClient, CoreContext, LaunchError,
    sync::{CloseOnUnwind, Closeable, PipelineError, PipelineRing},
};

use crate::{
    KernelInfo,
    components::{
        AccOf, FormattedConfigError, GemmCoord, GlobalTensor, InputOf, MatmulAvailabilityError,
        MatmulPrecision, MatmulSelection, MatmulSetupError, MatrixLayout, MmadConfig,
        OnChipFootprint, TilingScheme,
        batch::{BlockOrder, BlockScheduler},
        epilogue::{
            BlockEpilogue, ChannelSink, DequantParams, EpilogueCadence, EpilogueConfig,
            WorkspaceMapping, WorkspaceSink, drain_channel, drain_workspace,
        },
        global::{BlockMmad, BlockTask, ProblemOperands},
    },
};

/// Setup shared by every kernel: the checked tiling, the resolved pipeline and the block order.
pub(crate) struct KernelSetup<MP: MatmulPrecision> {
    pub tiling: TilingScheme,
    pub mmad: MmadConfig,
    pub order: BlockOrder,
    /// Cores requested, clamped to the device.
    pub cores: u32,
    _precision: PhantomData<MP>,
}

impl<MP: MatmulPrecision> KernelSetup<MP> {
    /// Checks `selection` against the device for a problem of shape `problem`.
    pub fn new(
        client: &ComputeClient,
        selection: &MatmulSelection,
        problem: &GemmCoord,
    ) -> Result<Self, MatmulSetupError> {
        let properties = client.properties();
        let tiling = selection.tiling_scheme;
        tiling.validate(InputOf::<MP>::size())?;

        let mmad = selection.mmad.resolve()?;
        OnChipFootprint::mmad::<MP>(&tiling, &mmad).check(properties)?;

        let order = selection.block_order.into_order(problem);
        order.validate()?;

        let core_count = properties.core_count.max(1);
        let cores = selection.block_dim.unwrap_or(core_count).clamp(1, core_count);

        Ok(Self {
            tiling,
            mmad,
            order,
            cores,
            _precision: PhantomData,
        })
    }

    /// Scheduler of `batch_count` problems of shape `problem`.
    pub fn scheduler(&self, problem: GemmCoord, batch_count: usize) -> BlockScheduler {
        BlockScheduler::new(problem, self.tiling.l1, self.order, batch_count)
    }

    /// Cores launched for `loops` blocks of work.
    pub fn block_dim(&self, loops: usize) -> u32 {
        self.cores.min(loops.max(1) as u32)
    }

    pub fn block_mmad(&self) -> BlockMmad<MP> {
        BlockMmad::new(self.mmad, self.tiling)
    }

    /// Launch summary with the pipeline of this setup.
    pub fn info(&self, info: KernelInfo, block_dim: u32) -> KernelInfo {
        KernelInfo {
            policy: self.mmad.policy,
            block_dim,
            ..info
        }
    }
}

/// Rejects output types the epilogue can't dequantize into.
pub(crate) fn check_float_output<MP: MatmulPrecision, EO: Element>()
-> Result<(), MatmulSetupError> {
    match EO::KIND.is_float() {
        true => Ok(()),
        false => Err(MatmulAvailabilityError::TypesUnavailable {
            input: InputOf::<MP>::KIND,
            output: EO::KIND,
        }
        .into()),
    }
}

/// Tasks of core `core_idx` for a single scheduled problem.
pub(crate) fn core_tasks(
    scheduler: &BlockScheduler,
    core_idx: usize,
    core_num: usize,
    operands: impl Fn(usize) -> ProblemOperands,
) -> Vec<BlockTask> {
    scheduler
        .loop_indices(core_idx, core_num)
        .map(|index| {
            let (batch, block) = scheduler.block_coord(index);
            operands(batch).task(
                index,
                block,
                scheduler.block_origin(block),
                scheduler.actual_block_shape(block),
            )
        })
        .collect()
}

/// Tasks of core `core_idx` for problems scheduled one after the other, the start core rotating
/// from one problem to the next.
pub(crate) fn rotated_core_tasks(
    problems: impl Iterator<Item = (BlockScheduler, ProblemOperands)>,
    core_idx: usize,
    core_num: usize,
) -> Vec<BlockTask> {
    let mut tasks = Vec::new();
    let mut start_core = 0;

    for (scheduler, operands) in problems {
        for index in scheduler.loop_indices_from(core_idx, core_num, start_core) {
            let (_, block) = scheduler.block_coord(index);
            tasks.push(operands.task(
                index,
                block,
                scheduler.block_origin(block),
                scheduler.actual_block_shape(block),
            ));
        }
        start_core = scheduler.next_start_core(start_core, core_num);
    }

    tasks
}

/// Runs the matmul of one core with its accumulators dequantized on the vector unit.
///
/// The vector unit runs on its own thread. With the direct cadence, accumulators are moved
/// through a channel holding `l0c_stages` of them. With the workspace cadence they are written
/// to `workspace` as `mapping` places them, and a ring of workspace stages bounds how far the
/// matrix unit runs ahead.
#[allow(clippy::too_many_arguments)]
pub(crate) fn run_with_epilogue<MP: MatmulPrecision, ES: Element, EO: Element>(
    core: &CoreContext<'_>,
    mmad: &BlockMmad<MP>,
    a: &GlobalTensor<InputOf<MP>>,
    b: &GlobalTensor<InputOf<MP>>,
    tasks: &[BlockTask],
    config: EpilogueConfig,
    params: DequantParams<'_, ES>,
    out: &GlobalTensor<EO>,
    workspace: Option<(&GlobalTensor<AccOf<MP>>, WorkspaceMapping)>,
) -> Result<(), LaunchError> {
    let mut epilogue = BlockEpilogue::<AccOf<MP>, ES, EO>::new(config, params, out)
        .map_err(|err| LaunchError::unknown(format!("{err}")))?;
    let vector_name = format!("core-{}-vector", core.block_idx());

    match (config.cadence, workspace) {
        (EpilogueCadence::Workspace { stages }, Some((workspace, mapping))) => {
            let ring = PipelineRing::new("workspace", stages, || None);

            std::thread::scope(|scope| {
                let vector = std::thread::Builder::new()
                    .name(vector_name)
                    .spawn_scoped(scope, || {
                        let guard = CloseOnUnwind::new(vec![&ring as &dyn Closeable]);
                        let result = drain_workspace(&ring, workspace, &mut epilogue);
                        if result.is_err() {
                            guard.close_all();
                        }
                        result.map(|blocks| log::trace!("Vector unit dequantized {blocks} blocks"))
                    })
                    .map_err(|err| LaunchError::unknown(format!("Can't spawn vector unit: {err}")))?;

                let guard = CloseOnUnwind::new(vec![&ring as &dyn Closeable]);
                let mut sink =
                    WorkspaceSink::new(workspace, &ring, mapping, mmad.config().notifies_completion());
                let computed = mmad
                    .execute(core, a, b, tasks, &mut sink)
                    .and_then(|_| sink.finish());
                if computed.is_err() {
                    guard.close_all();
                }

                join_units(computed, join(vector))
            })
        }
        (EpilogueCadence::Workspace { .. }, None) => Err(LaunchError::unknown(
            "The workspace cadence needs a workspace",
        )),
        (EpilogueCadence::Direct, _) => {
            let (sender, receiver) = async_channel::bounded(mmad.config().l0c_stages.max(1));

            std::thread::scope(|scope| {
                let vector = std::thread::Builder::new()
                    .name(vector_name)
                    .spawn_scoped(scope, move || {
                        drain_channel(&receiver, &mut epilogue).map(|blocks| {
                            log::trace!("Vector unit dequantized {blocks} blocks");
                        })
                    })
                    .map_err(|err| LaunchError::unknown(format!("Can't spawn vector unit: {err}")))?;

                let mut sink = ChannelSink::new(sender);
                let computed = mmad.execute(core, a, b, tasks, &mut sink);
                drop(sink);

                join_units(computed, join(vector))
            })
        }
    }
}

fn join<T>(
    handle: std::thread::ScopedJoinHandle<'_, Result<T, LaunchError>>,
) -> Result<T, LaunchError> {
    match handle.join() {
        Ok(result) => result,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

/// Keeps the root cause when one unit failed because its peer closed a signal.
fn join_units(
    matrix: Result<(), LaunchError>,
    vector: Result<(), LaunchError>,
) -> Result<(), LaunchError> {
    match (matrix, vector) {
        (Err(LaunchError::Pipeline(PipelineError::Closed { .. })), Err(err)) => Err(err),
        (matrix, vector) => matrix.and(vector),
    }
}

/// Outputs are always written row-major.
pub(crate) fn check_output_layout(name: &str, layout: &MatrixLayout) -> Result<(), MatmulSetupError> {
    match layout {
        MatrixLayout::RowMajor(_) => Ok(()),
        other => {
            let name = name.to_string();
            let other = *other;
            Err(FormattedConfigError::new(move || {
                format!("Output {name} must be row-major, got {other:?}")
            })
            .into())
        }
    }
}
