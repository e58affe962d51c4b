use std::sync::{Arc, PoisonError, RwLock};

use tessel_common::Element;

use super::base::MemoryCounters;

/// Unique identifier of an allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageId(pub(crate) u64);

/// Handle to a buffer in off-chip memory.
///
/// Handles are cheap to clone; every clone points to the same bytes. Cores access the bytes
/// through [Handle::read] and [Handle::write], which take the buffer lock for the duration of
/// the closure.
#[derive(Clone, Debug)]
pub struct Handle {
    inner: Arc<Allocation>,
}

#[derive(Debug)]
struct Allocation {
    id: StorageId,
    bytes: RwLock<Vec<u8>>,
    counters: Arc<MemoryCounters>,
}

impl Drop for Allocation {
    fn drop(&mut self) {
        let size = match self.bytes.get_mut() {
            Ok(bytes) => bytes.len(),
            Err(err) => err.into_inner().len(),
        };
        self.counters.release(size);
        log::trace!("Released buffer {:?} of {size} bytes", self.id);
    }
}

impl Handle {
    pub(crate) fn new(id: StorageId, size: usize, counters: Arc<MemoryCounters>) -> Self {
        Self {
            inner: Arc::new(Allocation {
                id,
                bytes: RwLock::new(vec![0; size]),
                counters,
            }),
        }
    }

    /// The allocation this handle points to.
    pub fn id(&self) -> StorageId {
        self.inner.id
    }

    /// Size of the buffer in bytes.
    pub fn size(&self) -> usize {
        self.read(|bytes| bytes.len())
    }

    /// Number of elements of type `E` the buffer holds.
    pub fn len<E: Element>(&self) -> usize {
        self.size() / E::size()
    }

    /// Whether no other handle points to the same buffer.
    pub fn can_mut(&self) -> bool {
        Arc::strong_count(&self.inner) == 1
    }

    /// Runs `func` with shared access to the bytes.
    pub fn read<R>(&self, func: impl FnOnce(&[u8]) -> R) -> R {
        let bytes = self.inner.bytes.read().unwrap_or_else(PoisonError::into_inner);
        func(&bytes)
    }

    /// Runs `func` with exclusive access to the bytes.
    pub fn write<R>(&self, func: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut bytes = self
            .inner
            .bytes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        func(&mut bytes)
    }
}
