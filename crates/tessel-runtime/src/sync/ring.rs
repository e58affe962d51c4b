use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use super::{Closeable, PipelineError};

/// Ring of `depth` buffers shared by one producer and one consumer.
///
/// Stage `t` always maps to slot `t mod depth`. The producer of stage `t` waits until the
/// consumer released stage `t - depth` from the same slot, the consumer of stage `t` waits until
/// the producer published it. Each slot keeps its own stage counter, so the signals can't be
/// confused across laps of the ring.
///
/// Buffers are allocated once when the ring is created and cycle through the slots for the whole
/// launch.
#[derive(Debug)]
pub struct PipelineRing<T> {
    name: &'static str,
    slots: Vec<Slot<T>>,
    closed: AtomicBool,
}

#[derive(Debug)]
struct Slot<T> {
    state: Mutex<SlotState<T>>,
    signal: Condvar,
}

#[derive(Debug)]
struct SlotState<T> {
    buffer: Option<T>,
    phase: SlotPhase,
    /// Number of stages released from this slot.
    released: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotPhase {
    Free,
    Filling,
    Ready(u64),
    Draining,
}

impl<T> PipelineRing<T> {
    /// Creates a ring of `depth` slots, each buffer built by `init`.
    pub fn new(name: &'static str, depth: usize, mut init: impl FnMut() -> T) -> Self {
        let slots = (0..depth.max(1))
            .map(|_| Slot {
                state: Mutex::new(SlotState {
                    buffer: Some(init()),
                    phase: SlotPhase::Free,
                    released: 0,
                }),
                signal: Condvar::new(),
            })
            .collect();

        Self {
            name,
            slots,
            closed: AtomicBool::new(false),
        }
    }

    /// Number of slots.
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Slot holding stage `index`.
    pub fn slot_of(&self, index: u64) -> usize {
        (index % self.slots.len() as u64) as usize
    }

    /// Waits until stage `index` may be written and takes its buffer.
    ///
    /// Must be followed by [PipelineRing::publish] with the same index.
    pub fn acquire(&self, index: u64) -> Result<T, PipelineError> {
        let depth = self.slots.len() as u64;
        let lap = index / depth;
        let slot = &self.slots[self.slot_of(index)];

        let mut state = self.wait(slot, index, |state| {
            state.phase == SlotPhase::Free && state.released == lap
        })?;
        state.phase = SlotPhase::Filling;
        self.take(&mut state, index)
    }

    /// Returns the filled buffer of stage `index` and signals the consumer.
    pub fn publish(&self, index: u64, buffer: T) {
        let slot = &self.slots[self.slot_of(index)];
        let mut state = slot.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.buffer = Some(buffer);
        state.phase = SlotPhase::Ready(index);
        slot.signal.notify_all();
    }

    /// Waits until stage `index` was published and takes its buffer.
    ///
    /// Must be followed by [PipelineRing::release] with the same index.
    pub fn wait_ready(&self, index: u64) -> Result<T, PipelineError> {
        let slot = &self.slots[self.slot_of(index)];

        let mut state = self.wait(slot, index, |state| {
            state.phase == SlotPhase::Ready(index)
        })?;
        state.phase = SlotPhase::Draining;
        self.take(&mut state, index)
    }

    /// Returns the buffer of stage `index` and signals the producer the slot is free.
    pub fn release(&self, index: u64, buffer: T) {
        let slot = &self.slots[self.slot_of(index)];
        let mut state = slot.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.buffer = Some(buffer);
        state.phase = SlotPhase::Free;
        state.released += 1;
        slot.signal.notify_all();
    }

    /// Fills stage `index` with `fill` and publishes it.
    pub fn produce<R>(&self, index: u64, fill: impl FnOnce(&mut T) -> R) -> Result<R, PipelineError> {
        let mut buffer = self.acquire(index)?;
        let out = fill(&mut buffer);
        self.publish(index, buffer);
        Ok(out)
    }

    /// Reads stage `index` with `read` and releases it.
    pub fn consume<R>(&self, index: u64, read: impl FnOnce(&T) -> R) -> Result<R, PipelineError> {
        let buffer = self.wait_ready(index)?;
        let out = read(&buffer);
        self.release(index, buffer);
        Ok(out)
    }

    /// Software pipelines stages `start..start + count` through the ring on the calling thread.
    ///
    /// Stage `i + depth - 1` is filled right before stage `i` is consumed, so the ring never
    /// holds more than `depth` stages and no wait can block. `start` must follow the last stage
    /// of the previous call; the closures receive the stage index relative to `start`.
    pub fn stream<E, F, C>(&self, start: u64, count: u64, mut fill: F, mut consume: C) -> Result<(), E>
    where
        E: From<PipelineError>,
        F: FnMut(u64, &mut T) -> Result<(), E>,
        C: FnMut(u64, &T) -> Result<(), E>,
    {
        let ahead = (self.slots.len() as u64 - 1).min(count);

        for index in 0..ahead {
            let mut buffer = self.acquire(start + index)?;
            let filled = fill(index, &mut buffer);
            self.publish(start + index, buffer);
            filled?;
        }

        for index in 0..count {
            let next = index + ahead;
            if next < count {
                let mut buffer = self.acquire(start + next)?;
                let filled = fill(next, &mut buffer);
                self.publish(start + next, buffer);
                filled?;
            }

            let buffer = self.wait_ready(start + index)?;
            let consumed = consume(index, &buffer);
            self.release(start + index, buffer);
            consumed?;
        }

        Ok(())
    }

    fn wait<'a>(
        &self,
        slot: &'a Slot<T>,
        index: u64,
        ready: impl Fn(&SlotState<T>) -> bool,
    ) -> Result<MutexGuard<'a, SlotState<T>>, PipelineError> {
        let mut state = slot.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if ready(&state) {
                return Ok(state);
            }
            if self.closed.load(Ordering::Acquire) {
                return Err(PipelineError::Closed {
                    name: self.name,
                    index,
                });
            }
            state = slot
                .signal
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn take(&self, state: &mut SlotState<T>, index: u64) -> Result<T, PipelineError> {
        state.buffer.take().ok_or(PipelineError::MissingBuffer {
            name: self.name,
            index,
        })
    }
}

impl<T: Send> Closeable for PipelineRing<T> {
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        for slot in self.slots.iter() {
            let _state = slot.state.lock().unwrap_or_else(PoisonError::into_inner);
            slot.signal.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn consumer_sees_stages_in_order() {
        let ring = PipelineRing::new("test", 3, || 0u64);
        let count = 100;

        let received = std::thread::scope(|scope| {
            scope.spawn(|| {
                for index in 0..count {
                    ring.produce(index, |value| *value = index * 10).unwrap();
                }
            });

            (0..count)
                .map(|index| ring.consume(index, |value| *value).unwrap())
                .collect::<Vec<_>>()
        });

        let expected = (0..count).map(|index| index * 10).collect::<Vec<_>>();
        pretty_assertions::assert_eq!(received, expected);
    }

    #[test_log::test]
    fn producer_never_overwrites_unread_stage() {
        let ring = PipelineRing::new("test", 2, Vec::<u64>::new);
        let count = 50u64;

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for index in 0..count {
                    ring.produce(index, |buffer| {
                        buffer.clear();
                        buffer.extend((0..8).map(|_| index));
                    })
                    .unwrap();
                }
            });

            for index in 0..count {
                ring.consume(index, |buffer| {
                    std::thread::yield_now();
                    assert!(buffer.iter().all(|value| *value == index));
                })
                .unwrap();
            }
        });
    }

    #[test_log::test]
    fn close_releases_waiting_consumer() {
        let ring = PipelineRing::new("stalled", 2, || ());

        let result = std::thread::scope(|scope| {
            let waiter = scope.spawn(|| ring.wait_ready(0));
            std::thread::sleep(std::time::Duration::from_millis(10));
            ring.close();
            waiter.join().unwrap()
        });

        assert_eq!(
            result,
            Err(PipelineError::Closed {
                name: "stalled",
                index: 0
            })
        );
    }

    #[test_log::test]
    fn stream_visits_every_stage_once() {
        for depth in 1..=4 {
            let ring = PipelineRing::new("stream", depth, || 0u64);
            let mut seen = Vec::new();
            let mut start = 0;

            // Consecutive calls continue the stage numbering of the ring.
            for count in [7, 3] {
                ring.stream::<PipelineError, _, _>(
                    start,
                    count,
                    |index, value| {
                        *value = start + index + 1;
                        Ok(())
                    },
                    |index, value| {
                        assert_eq!(*value, start + index + 1);
                        seen.push(start + index);
                        Ok(())
                    },
                )
                .unwrap();
                start += count;
            }

            pretty_assertions::assert_eq!(seen, (0..10).collect::<Vec<_>>());
        }
    }
}
