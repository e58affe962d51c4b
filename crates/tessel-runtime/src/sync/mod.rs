//! Signals used between the units of one core and across cores.
//!
//! Every wait in this module can be interrupted by closing the primitive, so a unit that fails
//! never leaves its peers blocked.

mod barrier;
mod counter;
mod ring;

pub use barrier::*;
pub use counter::*;
pub use ring::*;

use thiserror::Error;

/// Error returned by a wait that can't complete anymore.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The primitive was closed while a unit was waiting on it.
    #[error("Pipeline `{name}` was closed while waiting for stage {index}")]
    Closed {
        /// Name of the primitive.
        name: &'static str,
        /// Stage that was being waited for.
        index: u64,
    },

    /// A slot lost its buffer, which means its signals were used out of order.
    #[error("Slot of pipeline `{name}` has no buffer at stage {index}")]
    MissingBuffer {
        /// Name of the primitive.
        name: &'static str,
        /// Stage being accessed.
        index: u64,
    },

    /// Another core aborted the launch before reaching the barrier.
    #[error("A core aborted the launch before reaching the barrier")]
    Aborted,
}

/// A primitive that can wake up all of its waiters with an error.
pub trait Closeable: Sync {
    /// Wakes every waiter; subsequent waits fail.
    fn close(&self);
}

/// Closes the registered primitives when the owning thread unwinds.
///
/// Peers blocked on a signal the panicking unit would have sent are released with
/// [PipelineError::Closed] instead of hanging the launch.
pub struct CloseOnUnwind<'a> {
    primitives: Vec<&'a dyn Closeable>,
}

impl<'a> CloseOnUnwind<'a> {
    /// Guards the given primitives.
    pub fn new(primitives: Vec<&'a dyn Closeable>) -> Self {
        Self { primitives }
    }

    /// Closes the guarded primitives now, e.g. after an error is returned.
    pub fn close_all(&self) {
        for primitive in self.primitives.iter() {
            primitive.close();
        }
    }
}

impl Drop for CloseOnUnwind<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.close_all();
        }
    }
}
