use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};

use super::{Closeable, PipelineError};

/// Monotonic counter other units can wait on.
///
/// Used to report how many blocks a unit has completed.
#[derive(Debug)]
pub struct StageCounter {
    name: &'static str,
    value: Mutex<u64>,
    signal: Condvar,
    closed: AtomicBool,
}

impl StageCounter {
    /// Creates a counter starting at zero.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            value: Mutex::new(0),
            signal: Condvar::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Increments the counter and returns the new value.
    pub fn advance(&self) -> u64 {
        let mut value = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        *value += 1;
        self.signal.notify_all();
        *value
    }

    /// Current value.
    pub fn get(&self) -> u64 {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until the counter reaches `target`.
    pub fn wait_for(&self, target: u64) -> Result<(), PipelineError> {
        let mut value = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if *value >= target {
                return Ok(());
            }
            if self.closed.load(Ordering::Acquire) {
                return Err(PipelineError::Closed {
                    name: self.name,
                    index: target,
                });
            }
            value = self
                .signal
                .wait(value)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl Closeable for StageCounter {
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let _value = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        self.signal.notify_all();
    }
}
