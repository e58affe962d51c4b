use core::fmt::Display;
use std::sync::Arc;

use super::Profiled;
use crate::config::{
    GlobalConfig, Logger, kernel::KernelLogLevel, profiling::ProfilingLogLevel,
};

/// Logger owned by a compute client.
///
/// Launch summaries go to the kernel loggers, launch durations are aggregated and sent to the
/// profiling loggers when [ClientLogger::profile_summary] is called.
#[derive(Debug)]
pub struct ClientLogger {
    logger: Logger,
    profiled: Profiled,
}

impl ClientLogger {
    /// Creates the logger from a configuration.
    pub fn new(config: Arc<GlobalConfig>) -> Self {
        Self {
            logger: Logger::new(config),
            profiled: Profiled::default(),
        }
    }

    /// The configured verbosity of launch logs.
    pub fn kernel_level(&self) -> KernelLogLevel {
        self.logger.log_level_kernel()
    }

    /// Whether launch durations are being recorded.
    pub fn profiling_activated(&self) -> bool {
        self.logger.log_level_profiling() != ProfilingLogLevel::Disabled
    }

    /// Log a launch summary when kernel logging is activated.
    pub fn log_launch<I: Display>(&mut self, arg: I) {
        if self.kernel_level() != KernelLogLevel::Disabled {
            self.logger.log_kernel(&arg);
        }
    }

    /// Register a profiled launch that ran on `cores` cores.
    pub fn register_profiled(&mut self, name: &str, duration: core::time::Duration, cores: u32) {
        if !self.profiling_activated() {
            return;
        }

        self.profiled.update(name, duration, cores);

        if let ProfilingLogLevel::Full = self.logger.log_level_profiling() {
            self.logger
                .log_profiling(&format!("| {duration:<10?} | {cores:>3} cores | {name}"));
        }
    }

    /// The launches profiled since the last summary.
    pub fn profiled(&self) -> &Profiled {
        &self.profiled
    }

    /// Show the profiling summary if activated and reset its state.
    pub fn profile_summary(&mut self) {
        let profiled = core::mem::take(&mut self.profiled);

        if !profiled.is_empty() {
            self.logger.log_profiling(&profiled);
        }
    }
}
