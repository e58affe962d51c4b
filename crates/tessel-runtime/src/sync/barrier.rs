use std::sync::{Condvar, Mutex, PoisonError};

use super::{Closeable, PipelineError};

#[derive(Debug)]
struct BarrierState {
    arrived: u32,
    generation: u64,
    aborted: bool,
}

/// Barrier across all cores of a launch.
///
/// Unlike [std::sync::Barrier] it can be aborted, releasing cores that wait for a peer that
/// failed.
#[derive(Debug)]
pub struct CoreBarrier {
    size: u32,
    state: Mutex<BarrierState>,
    signal: Condvar,
}

impl CoreBarrier {
    /// Creates a barrier for `size` cores.
    pub fn new(size: u32) -> Self {
        Self {
            size,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                aborted: false,
            }),
            signal: Condvar::new(),
        }
    }

    /// Blocks until every core reached the barrier.
    pub fn wait(&self) -> Result<(), PipelineError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.aborted {
            return Err(PipelineError::Aborted);
        }

        state.arrived += 1;
        if state.arrived >= self.size {
            state.arrived = 0;
            state.generation += 1;
            self.signal.notify_all();
            return Ok(());
        }

        let generation = state.generation;
        while state.generation == generation {
            if state.aborted {
                return Err(PipelineError::Aborted);
            }
            state = self
                .signal
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        Ok(())
    }

    /// Releases every waiting core with [PipelineError::Aborted].
    pub fn abort(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.aborted = true;
        self.signal.notify_all();
    }
}

impl Closeable for CoreBarrier {
    fn close(&self) {
        self.abort();
    }
}
