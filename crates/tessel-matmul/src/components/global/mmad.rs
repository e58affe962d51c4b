use core::marker::PhantomData;
use std::collections::VecDeque;

use tessel_runtime::{
    CoreContext, LaunchError,
    sync::{CloseOnUnwind, Closeable, PipelineError, PipelineRing, StageCounter},
};

use super::{BlockTask, CopyEngine};
use crate::components::{
    AccOf, Accumulator, GlobalTensor, InputOf, MatmulPrecision, MmadConfig, TilingScheme,
    stage::StageMmad,
    tile::{AccumulatorTile, OperandTile},
};

/// Receives the accumulators produced by a [BlockMmad].
pub trait BlockSink<Acc: Accumulator> {
    /// Takes ownership of the finished accumulator of `task`.
    fn handoff(&mut self, task: &BlockTask, acc: AccumulatorTile<Acc>) -> Result<(), LaunchError>;

    /// Called after the hand-off of `task` when the policy asks for completion callbacks.
    fn on_block_complete(&mut self, _task: &BlockTask) -> Result<(), LaunchError> {
        Ok(())
    }
}

/// The matmul of one core: every block of its task list, staged through L1 and L0.
///
/// The copy engine runs on its own thread and fills the L1 rings, the calling thread plays the
/// matrix unit. They only share the rings and a counter of finished blocks, which bounds how far
/// the copy engine runs ahead.
pub struct BlockMmad<MP: MatmulPrecision> {
    config: MmadConfig,
    tiling: TilingScheme,
    _precision: PhantomData<MP>,
}

impl<MP: MatmulPrecision> BlockMmad<MP> {
    pub fn new(config: MmadConfig, tiling: TilingScheme) -> Self {
        Self {
            config,
            tiling,
            _precision: PhantomData,
        }
    }

    pub fn config(&self) -> &MmadConfig {
        &self.config
    }

    pub fn tiling(&self) -> &TilingScheme {
        &self.tiling
    }

    /// Computes the accumulator of every task, in order, and hands each one to `sink`.
    pub fn execute<S: BlockSink<AccOf<MP>>>(
        &self,
        core: &CoreContext<'_>,
        a: &GlobalTensor<InputOf<MP>>,
        b: &GlobalTensor<InputOf<MP>>,
        tasks: &[BlockTask],
        sink: &mut S,
    ) -> Result<(), LaunchError> {
        let l1 = self.tiling.l1;
        let l1_a = PipelineRing::new("l1a", self.config.l1_stages, || {
            OperandTile::with_capacity(l1.m * l1.k)
        });
        let l1_b = PipelineRing::new("l1b", self.config.l1_stages, || {
            OperandTile::with_capacity(l1.k * l1.n)
        });
        let progress = StageCounter::new("mmad-blocks");
        let copy = CopyEngine::new(a, b, self.tiling, &self.config, core.block_idx() as usize);
        let preload = self.config.preload_stages;

        std::thread::scope(|scope| {
            let copy_unit = std::thread::Builder::new()
                .name(format!("core-{}-mte", core.block_idx()))
                .spawn_scoped(scope, || {
                    let guard = CloseOnUnwind::new(vec![&l1_a as &dyn Closeable, &l1_b]);
                    let result = copy.run(&l1_a, &l1_b, &progress, tasks, preload);
                    if result.is_err() {
                        guard.close_all();
                    }
                    result
                })
                .map_err(|err| LaunchError::unknown(format!("Can't spawn copy engine: {err}")))?;

            let guard =
                CloseOnUnwind::new(vec![&l1_a as &dyn Closeable, &l1_b, &progress]);
            let computed = self.compute(&l1_a, &l1_b, &progress, tasks, sink);
            if computed.is_err() {
                guard.close_all();
            }

            let copied = match copy_unit.join() {
                Ok(result) => result,
                Err(payload) => std::panic::resume_unwind(payload),
            };

            match (computed, copied) {
                (Err(LaunchError::Pipeline(PipelineError::Closed { .. })), Err(err)) => {
                    Err(err.into())
                }
                (computed, copied) => computed.and(copied.map_err(LaunchError::from)),
            }
        })
    }

    fn compute<S: BlockSink<AccOf<MP>>>(
        &self,
        l1_a: &PipelineRing<OperandTile<InputOf<MP>>>,
        l1_b: &PipelineRing<OperandTile<InputOf<MP>>>,
        progress: &StageCounter,
        tasks: &[BlockTask],
        sink: &mut S,
    ) -> Result<(), LaunchError> {
        let mut stage_mmad = StageMmad::<MP>::new(&self.config, &self.tiling);
        let mut pending = VecDeque::with_capacity(self.config.l0c_stages);
        let deferred = self.config.deferred_blocks();
        let mut stage = 0u64;

        for task in tasks {
            let mut acc = AccumulatorTile::new(task.actual.m, task.actual.n);

            for k_tile in 0..task.actual.k.div_ceil(self.tiling.l1.k) {
                let a = l1_a.wait_ready(stage)?;
                let b = match l1_b.wait_ready(stage) {
                    Ok(b) => b,
                    Err(err) => {
                        l1_a.release(stage, a);
                        return Err(err.into());
                    }
                };
                let result = stage_mmad.execute(&a, &b, &mut acc, k_tile == 0);
                l1_a.release(stage, a);
                l1_b.release(stage, b);
                result?;
                stage += 1;
            }

            progress.advance();
            pending.push_back((task, acc));

            while pending.len() > deferred {
                if let Some((task, acc)) = pending.pop_front() {
                    self.hand_off(sink, task, acc)?;
                }
            }
        }

        while let Some((task, acc)) = pending.pop_front() {
            self.hand_off(sink, task, acc)?;
        }

        Ok(())
    }

    fn hand_off<S: BlockSink<AccOf<MP>>>(
        &self,
        sink: &mut S,
        task: &BlockTask,
        acc: AccumulatorTile<AccOf<MP>>,
    ) -> Result<(), LaunchError> {
        sink.handoff(task, acc)?;
        if self.config.notifies_completion() {
            sink.on_block_complete(task)?;
        }
        Ok(())
    }
}
