use core::fmt::Display;
use std::sync::{Arc, Mutex, PoisonError};

use tessel_common::Element;

use crate::{
    config::{GlobalConfig, kernel::KernelLogLevel},
    kernel::CoreContext,
    logging::ClientLogger,
    memory_management::{Handle, MemoryManagement, MemoryUsage},
    properties::HardwareProperties,
    server::LaunchError,
    sync::{CloseOnUnwind, Closeable, CoreBarrier, PipelineError},
};

/// Explicit execution context of the simulated device.
///
/// Everything a launch needs (device properties, memory, logging, configuration) hangs off the
/// client, so several independent clients can live in one process. Cloning is cheap and shares
/// the same device.
#[derive(Clone, Debug)]
pub struct ComputeClient {
    state: Arc<ClientState>,
}

#[derive(Debug)]
struct ClientState {
    properties: HardwareProperties,
    memory: MemoryManagement,
    logger: Mutex<ClientLogger>,
    config: Arc<GlobalConfig>,
}

impl ComputeClient {
    /// Creates a client using the global configuration.
    pub fn new(properties: HardwareProperties) -> Self {
        Self::with_config(properties, GlobalConfig::get())
    }

    /// Creates a client with an explicit configuration.
    pub fn with_config(properties: HardwareProperties, config: Arc<GlobalConfig>) -> Self {
        log::debug!(
            "Creating compute client with {} cores and {} bytes of memory",
            properties.core_count,
            config.memory.capacity
        );

        Self {
            state: Arc::new(ClientState {
                memory: MemoryManagement::new(config.memory.capacity),
                logger: Mutex::new(ClientLogger::new(config.clone())),
                properties,
                config,
            }),
        }
    }

    /// Properties of the device.
    pub fn properties(&self) -> &HardwareProperties {
        &self.state.properties
    }

    /// Configuration of the client.
    pub fn config(&self) -> &GlobalConfig {
        &self.state.config
    }

    /// Given a resource as bytes, stores it and returns the handle.
    pub fn create(&self, data: &[u8]) -> Result<Handle, LaunchError> {
        let handle = self.state.memory.reserve(data.len())?;
        handle.write(|bytes| bytes.copy_from_slice(data));
        Ok(handle)
    }

    /// Stores a slice of elements and returns the handle.
    pub fn create_from_slice<E: Element>(&self, data: &[E]) -> Result<Handle, LaunchError> {
        self.create(E::as_bytes(data))
    }

    /// Reserves a zero-filled buffer of `size` bytes.
    pub fn empty(&self, size: usize) -> Result<Handle, LaunchError> {
        self.state.memory.reserve(size)
    }

    /// Copies the bytes of a buffer back to the host.
    pub fn read_one(&self, handle: &Handle) -> Vec<u8> {
        handle.read(|bytes| bytes.to_vec())
    }

    /// Copies a buffer back to the host as elements of type `E`.
    pub fn read_elems<E: Element>(&self, handle: &Handle) -> Vec<E> {
        handle.read(E::from_bytes)
    }

    /// Current usage of the device memory.
    pub fn memory_usage(&self) -> MemoryUsage {
        self.state.memory.memory_usage()
    }

    /// Verbosity of launch logs.
    pub fn kernel_log_level(&self) -> KernelLogLevel {
        self.logger().kernel_level()
    }

    /// Sends a launch summary to the kernel loggers.
    pub fn log_launch<D: Display>(&self, msg: D) {
        self.logger().log_launch(msg);
    }

    /// Number of profiled launches of `name` since the last summary.
    pub fn profiled_count(&self, name: &str) -> usize {
        self.logger().profiled().count(name)
    }

    /// Logs the profiling summary and resets it.
    pub fn profile_summary(&self) {
        self.logger().profile_summary();
    }

    /// Runs `kernel` on `block_dim` cores and waits for all of them.
    ///
    /// `block_dim` is clamped to the number of cores of the device. Every core runs on its own
    /// thread. When a core fails, cores blocked on [CoreContext::sync_all] are released and the
    /// first error that isn't a consequence of another core failing is returned. A panicking
    /// core propagates its panic. Returns the number of cores used.
    pub fn launch<F>(&self, name: &str, block_dim: u32, kernel: F) -> Result<u32, LaunchError>
    where
        F: Fn(&CoreContext<'_>) -> Result<(), LaunchError> + Sync,
    {
        let block_dim = block_dim.clamp(1, self.state.properties.core_count.max(1));
        let barrier = CoreBarrier::new(block_dim);
        let start = std::time::Instant::now();

        let results = std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(block_dim as usize);

            for block_idx in 0..block_dim {
                let core =
                    CoreContext::new(block_idx, block_dim, &self.state.properties, &barrier);
                let kernel = &kernel;
                let barrier = &barrier;

                let spawned = std::thread::Builder::new()
                    .name(format!("{name}-core-{block_idx}"))
                    .spawn_scoped(scope, move || {
                        log::trace!("Core {block_idx} started");
                        let guard = CloseOnUnwind::new(vec![barrier as &dyn Closeable]);
                        let result = kernel(&core);
                        if result.is_err() {
                            guard.close_all();
                        }
                        log::trace!("Core {block_idx} stopped");
                        result
                    });

                match spawned {
                    Ok(handle) => handles.push(Ok(handle)),
                    Err(err) => {
                        barrier.abort();
                        handles.push(Err(LaunchError::unknown(format!(
                            "Can't spawn core {block_idx}: {err}"
                        ))));
                        break;
                    }
                }
            }

            handles
                .into_iter()
                .map(|handle| match handle {
                    Ok(handle) => match handle.join() {
                        Ok(result) => result,
                        Err(payload) => std::panic::resume_unwind(payload),
                    },
                    Err(err) => Err(err),
                })
                .collect::<Vec<_>>()
        });

        let duration = start.elapsed();
        self.logger().register_profiled(name, duration, block_dim);

        let mut errors = results.into_iter().filter_map(Result::err).collect::<Vec<_>>();
        if errors.is_empty() {
            return Ok(block_dim);
        }

        let root = errors
            .iter()
            .position(|err| !matches!(err, LaunchError::Pipeline(PipelineError::Aborted)))
            .unwrap_or(0);
        Err(errors.swap_remove(root))
    }

    fn logger(&self) -> std::sync::MutexGuard<'_, ClientLogger> {
        self.state
            .logger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
