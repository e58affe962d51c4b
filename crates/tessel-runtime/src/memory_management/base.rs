use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tessel_common::backtrace::BackTrace;

use super::{Handle, StorageId};
use crate::server::LaunchError;

/// Amount of off-chip memory in use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    /// Number of live allocations.
    pub number_allocs: u64,
    /// Bytes held by live allocations.
    pub bytes_in_use: usize,
    /// Highest value of `bytes_in_use` seen so far.
    pub bytes_peak: usize,
    /// Capacity of the memory.
    pub bytes_capacity: usize,
}

impl core::fmt::Display for MemoryUsage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} allocations, {} / {} bytes in use (peak {})",
            self.number_allocs, self.bytes_in_use, self.bytes_capacity, self.bytes_peak
        )
    }
}

/// Shared byte counters of one memory.
#[derive(Debug, Default)]
pub(crate) struct MemoryCounters {
    allocs: AtomicU64,
    in_use: AtomicUsize,
    peak: AtomicUsize,
}

impl MemoryCounters {
    pub(crate) fn release(&self, size: usize) {
        self.allocs.fetch_sub(1, Ordering::AcqRel);
        self.in_use.fetch_sub(size, Ordering::AcqRel);
    }
}

/// Off-chip memory with a fixed capacity.
///
/// Every buffer is a dedicated allocation; its bytes go back to the budget when the last
/// [Handle] pointing to it is dropped.
#[derive(Debug)]
pub struct MemoryManagement {
    capacity: usize,
    counters: Arc<MemoryCounters>,
    next_id: AtomicU64,
}

impl MemoryManagement {
    /// Creates a memory holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            counters: Arc::new(MemoryCounters::default()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Reserves a zero-filled buffer of `size` bytes.
    pub fn reserve(&self, size: usize) -> Result<Handle, LaunchError> {
        let mut in_use = self.counters.in_use.load(Ordering::Acquire);
        loop {
            let requested = in_use.checked_add(size).filter(|total| *total <= self.capacity);
            let Some(total) = requested else {
                return Err(LaunchError::OutOfMemory {
                    reason: format!(
                        "Can't allocate {size} bytes, {in_use} of {} bytes are in use",
                        self.capacity
                    ),
                    backtrace: BackTrace::capture(),
                });
            };

            match self.counters.in_use.compare_exchange_weak(
                in_use,
                total,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.counters.peak.fetch_max(total, Ordering::AcqRel);
                    break;
                }
                Err(current) => in_use = current,
            }
        }

        self.counters.allocs.fetch_add(1, Ordering::AcqRel);
        let id = StorageId(self.next_id.fetch_add(1, Ordering::Relaxed));
        log::trace!("Reserved buffer {id:?} of {size} bytes");

        Ok(Handle::new(id, size, self.counters.clone()))
    }

    /// Current usage of the memory.
    pub fn memory_usage(&self) -> MemoryUsage {
        MemoryUsage {
            number_allocs: self.counters.allocs.load(Ordering::Acquire),
            bytes_in_use: self.counters.in_use.load(Ordering::Acquire),
            bytes_peak: self.counters.peak.load(Ordering::Acquire),
            bytes_capacity: self.capacity,
        }
    }
}
