use tessel_common::backtrace::BackTrace;
use thiserror::Error;

use crate::sync::PipelineError;

/// Kernel launch errors.
#[derive(Error, Clone)]
pub enum LaunchError {
    /// The off-chip memory budget can't satisfy an allocation.
    #[error(
        "An out-of-memory error happened during launch\nCaused by:\n  {reason}\nBacktrace\n{backtrace}"
    )]
    OutOfMemory {
        /// The cause of the memory error.
        reason: String,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },

    /// A pipeline signal was abandoned by its peer.
    #[error("A pipeline error happened during launch\nCaused by:\n  {0}")]
    Pipeline(#[from] PipelineError),

    /// Unknown launch error.
    #[error(
        "An unknown error happened during launch\nCaused by:\n  {reason}\nBacktrace\n{backtrace}"
    )]
    Unknown {
        /// The cause of the unknown error.
        reason: String,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },
}

impl LaunchError {
    /// Creates an [LaunchError::Unknown] with a captured backtrace.
    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::Unknown {
            reason: reason.into(),
            backtrace: BackTrace::capture(),
        }
    }
}

impl core::fmt::Debug for LaunchError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{self}"))
    }
}
