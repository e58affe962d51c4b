use std::collections::VecDeque;

use async_channel::{Receiver, Sender};
use tessel_common::Element;
use tessel_runtime::{
    LaunchError,
    sync::{PipelineError, PipelineRing},
};

use super::{AccumulatorSource, BlockEpilogue};
use crate::components::{
    Accumulator, GlobalTensor, Layout, MatrixCoord, MatrixLayout,
    global::{BlockSink, BlockTask, OperandSlice},
    tile::AccumulatorTile,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Where each block lands in the off-chip workspace.
pub enum WorkspaceMapping {
    /// `stages` slots of one block each, reused in turn by the blocks of one core.
    PerCoreRing {
        base: usize,
        stages: usize,
        /// Dense row-major layout of one slot.
        layout: MatrixLayout,
    },
    /// The whole output of every group, blocks written at their output position.
    Full { layout: MatrixLayout },
}

impl WorkspaceMapping {
    /// Region written for the `stage`-th block of a core.
    pub fn slice(&self, stage: u64, task: &BlockTask) -> OperandSlice {
        match self {
            WorkspaceMapping::PerCoreRing {
                base,
                stages,
                layout,
            } => OperandSlice::new(
                base + (stage % *stages as u64) as usize * layout.required_len(),
                *layout,
                MatrixCoord::default(),
            ),
            WorkspaceMapping::Full { layout } => OperandSlice::new(
                task.group * layout.required_len(),
                *layout,
                task.c.origin,
            ),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// A block whose accumulator is in the workspace.
pub struct WorkspaceBlock {
    pub task: BlockTask,
    pub slice: OperandSlice,
}

/// Hands accumulators to the vector unit through the workspace.
///
/// A ring of workspace stages tracks which slots the vector unit still reads. The final stage
/// carries `None` and ends the stream.
pub struct WorkspaceSink<'a, Acc: Element> {
    workspace: &'a GlobalTensor<Acc>,
    ring: &'a PipelineRing<Option<WorkspaceBlock>>,
    mapping: WorkspaceMapping,
    issued: u64,
    pending: VecDeque<(u64, Option<WorkspaceBlock>)>,
    publish_on_complete: bool,
}

impl<'a, Acc: Element> WorkspaceSink<'a, Acc> {
    /// With `publish_on_complete`, blocks are only visible to the vector unit once the
    /// completion callback ran.
    pub fn new(
        workspace: &'a GlobalTensor<Acc>,
        ring: &'a PipelineRing<Option<WorkspaceBlock>>,
        mapping: WorkspaceMapping,
        publish_on_complete: bool,
    ) -> Self {
        Self {
            workspace,
            ring,
            mapping,
            issued: 0,
            pending: VecDeque::new(),
            publish_on_complete,
        }
    }

    /// Publishes pending blocks and the end of the stream.
    pub fn finish(mut self) -> Result<(), LaunchError> {
        while let Some((stage, block)) = self.pending.pop_front() {
            self.ring.publish(stage, block);
        }

        self.ring.acquire(self.issued)?;
        self.ring.publish(self.issued, None);
        Ok(())
    }
}

impl<Acc: Accumulator> BlockSink<Acc> for WorkspaceSink<'_, Acc> {
    fn handoff(&mut self, task: &BlockTask, acc: AccumulatorTile<Acc>) -> Result<(), LaunchError> {
        let stage = self.issued;
        self.ring.acquire(stage)?;
        let slice = self.mapping.slice(stage, task);

        self.workspace.write(|view| {
            for row in 0..acc.rows() {
                view.copy_from(slice.offset(row, 0), acc.row(row));
            }
        });

        let entry = Some(WorkspaceBlock { task: *task, slice });
        self.issued += 1;
        match self.publish_on_complete {
            true => self.pending.push_back((stage, entry)),
            false => self.ring.publish(stage, entry),
        }

        Ok(())
    }

    fn on_block_complete(&mut self, _task: &BlockTask) -> Result<(), LaunchError> {
        if let Some((stage, block)) = self.pending.pop_front() {
            self.ring.publish(stage, block);
        }

        Ok(())
    }
}

/// Runs `epilogue` over every block published by a [WorkspaceSink], until the end of the stream.
///
/// Returns the number of blocks processed.
pub fn drain_workspace<Acc: Accumulator, ES: Element, EO: Element>(
    ring: &PipelineRing<Option<WorkspaceBlock>>,
    workspace: &GlobalTensor<Acc>,
    epilogue: &mut BlockEpilogue<'_, Acc, ES, EO>,
) -> Result<u64, LaunchError> {
    let mut stage = 0;

    loop {
        let entry = ring.wait_ready(stage)?;
        let Some(block) = entry else {
            ring.release(stage, entry);
            return Ok(stage);
        };

        let source = AccumulatorSource::Workspace {
            tensor: workspace,
            slice: block.slice,
        };
        let result = epilogue.run(&block.task, &source);
        ring.release(stage, entry);
        result?;
        stage += 1;
    }
}

/// Hands accumulators straight to the vector unit through a bounded channel.
pub struct ChannelSink<Acc> {
    sender: Sender<(BlockTask, AccumulatorTile<Acc>)>,
    sent: u64,
}

impl<Acc> ChannelSink<Acc> {
    pub fn new(sender: Sender<(BlockTask, AccumulatorTile<Acc>)>) -> Self {
        Self { sender, sent: 0 }
    }
}

impl<Acc: Accumulator> BlockSink<Acc> for ChannelSink<Acc> {
    fn handoff(&mut self, task: &BlockTask, acc: AccumulatorTile<Acc>) -> Result<(), LaunchError> {
        self.sender.send_blocking((*task, acc)).map_err(|_| {
            PipelineError::Closed {
                name: "accumulators",
                index: self.sent,
            }
        })?;
        self.sent += 1;
        Ok(())
    }
}

/// Runs `epilogue` over every accumulator received, until all senders are gone.
///
/// The receiver is closed on error so the matrix unit stops waiting for room.
pub fn drain_channel<Acc: Accumulator, ES: Element, EO: Element>(
    receiver: &Receiver<(BlockTask, AccumulatorTile<Acc>)>,
    epilogue: &mut BlockEpilogue<'_, Acc, ES, EO>,
) -> Result<u64, LaunchError> {
    let mut received = 0;

    while let Ok((task, acc)) = receiver.recv_blocking() {
        if let Err(err) = epilogue.run(&task, &AccumulatorSource::Tile(&acc)) {
            receiver.close();
            return Err(err);
        }
        received += 1;
    }

    Ok(received)
}

#[cfg(test)]
mod tests {
    use tessel_runtime::{ComputeClient, HardwareProperties};

    use super::*;
    use crate::components::{
        GemmCoord, MatrixLayout,
        epilogue::{DequantParams, EpilogueCadence, EpilogueConfig},
    };

    #[test_log::test]
    fn workspace_ring_reuses_slots() {
        let client = ComputeClient::new(HardwareProperties::atlas_a2(1));
        let (m, n, blocks) = (4, 8, 5);
        let out_layout = MatrixLayout::row_major(m, n * blocks).unwrap();
        let slot_layout = MatrixLayout::row_major(m, n).unwrap();
        let out = GlobalTensor::<i32>::new(client.empty(m * n * blocks * 4).unwrap());
        let workspace = GlobalTensor::<i32>::new(client.empty(2 * m * n * 4).unwrap());
        let ring = PipelineRing::new("workspace", 2, || None);
        let config = EpilogueConfig {
            tile: MatrixCoord::new(2, 8),
            ub_stages: 2,
            cadence: EpilogueCadence::Workspace { stages: 2 },
            sub_blocks: 2,
            rows_per_sub_block: 2,
        };

        let tasks = (0..blocks)
            .map(|index| {
                let c = OperandSlice::new(0, out_layout, MatrixCoord::new(0, index * n));
                BlockTask {
                    index,
                    group: 0,
                    block: GemmCoord::new(0, index, 0),
                    actual: GemmCoord::new(m, n, 1),
                    a: c,
                    b: c,
                    c,
                    row_scale: 0,
                    column_scale: 0,
                }
            })
            .collect::<Vec<_>>();

        let drained = std::thread::scope(|scope| {
            let vector = scope.spawn(|| {
                let mut epilogue =
                    BlockEpilogue::<i32, f32, i32>::new(config, DequantParams::none(), &out)
                        .unwrap();
                drain_workspace(&ring, &workspace, &mut epilogue)
            });

            let mapping = WorkspaceMapping::PerCoreRing {
                base: 0,
                stages: 2,
                layout: slot_layout,
            };
            let mut sink = WorkspaceSink::new(&workspace, &ring, mapping, true);
            for task in tasks.iter() {
                let mut acc = AccumulatorTile::<i32>::new(m, n);
                acc.data_mut().fill(task.index as i32 + 1);
                sink.handoff(task, acc).unwrap();
                sink.on_block_complete(task).unwrap();
            }
            sink.finish().unwrap();

            vector.join().unwrap()
        });

        assert_eq!(drained.unwrap(), blocks as u64);
        let result = client.read_elems::<i32>(out.handle());
        for (index, value) in result.iter().enumerate() {
            assert_eq!(*value, (index % (n * blocks) / n) as i32 + 1);
        }
    }
}
