use derive_new::new;

use crate::{
    properties::HardwareProperties,
    sync::{CoreBarrier, PipelineError},
};

/// What one core knows about the launch it takes part in.
///
/// The same kernel closure runs on every core; it tells the cores apart through
/// [CoreContext::block_idx].
#[derive(new, Debug, Clone, Copy)]
pub struct CoreContext<'a> {
    block_idx: u32,
    block_num: u32,
    properties: &'a HardwareProperties,
    barrier: &'a CoreBarrier,
}

impl<'a> CoreContext<'a> {
    /// Index of this core in the launch.
    pub fn block_idx(&self) -> u32 {
        self.block_idx
    }

    /// Number of cores in the launch.
    pub fn block_num(&self) -> u32 {
        self.block_num
    }

    /// Properties of the device.
    pub fn properties(&self) -> &'a HardwareProperties {
        self.properties
    }

    /// Waits until every core of the launch reached this point.
    pub fn sync_all(&self) -> Result<(), PipelineError> {
        self.barrier.wait()
    }
}
