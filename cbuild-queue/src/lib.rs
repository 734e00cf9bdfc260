//! Bounded lock-free multi-producer/multi-consumer ring buffer (spec §3,
//! §4.3 "Task Queue"), implementing Vyukov's bounded MPMC queue pattern.
//!
//! Each slot is cache-line padded and carries its own 32-bit sequence
//! counter; `push`/`pop` never take a lock, spinning only long enough to
//! win a single compare-and-swap on the shared index.
//!
//! Capacity is rounded up to a power of two at construction so a slot's
//! position can be found with a mask instead of a modulo. The engine is
//! expected to size the queue via [`next_pow2`] over
//! `total_targets + total_files` (spec §4.3 "Size invariant"), which
//! bounds the maximum number of tasks ever in flight and guarantees
//! `push` never observes a full queue in practice.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU32, Ordering};

use crossbeam_utils::CachePadded;

struct Slot<T> {
    sequence: AtomicU32,
    task: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: access to `task` is serialized by the sequence-number protocol in
// `push`/`pop` — only one of a push or a pop ever touches a given slot's
// cell at a time, and the acquire/release pair on `sequence` establishes
// the happens-before edge between the writer and the reader.
unsafe impl<T: Send> Sync for Slot<T> {}

/// Bounded lock-free MPMC ring buffer of build tasks.
pub struct Queue<T> {
    slots: Box<[CachePadded<Slot<T>>]>,
    mask: u32,
    write_index: CachePadded<AtomicU32>,
    read_index: CachePadded<AtomicU32>,
}

impl<T> Queue<T> {
    /// Allocates a queue with at least `capacity` slots, rounded up to the
    /// next power of two.
    pub fn new(capacity: usize) -> Self {
        let capacity = next_pow2(capacity.max(1));
        let slots = (0..capacity)
            .map(|i| {
                CachePadded::new(Slot {
                    sequence: AtomicU32::new(i as u32),
                    task: UnsafeCell::new(MaybeUninit::uninit()),
                })
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            slots,
            mask: capacity as u32 - 1,
            write_index: CachePadded::new(AtomicU32::new(0)),
            read_index: CachePadded::new(AtomicU32::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Enqueues `task`. Returns `false` only if the queue is momentarily
    /// full — callers that size the queue per the module's size invariant
    /// never observe this (spec §4.3 "this system always succeeds by the
    /// size invariant below").
    pub fn push(&self, task: T) -> bool {
        let mut task = Some(task);
        let mut index = self.write_index.load(Ordering::Relaxed);

        loop {
            let slot = &self.slots[(index & self.mask) as usize];
            let sequence = slot.sequence.load(Ordering::Acquire);
            let diff = sequence as i64 - index as i64;

            if diff == 0 {
                match self.write_index.compare_exchange_weak(
                    index,
                    index.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: this thread exclusively owns the slot from
                        // the moment it wins the CAS on `write_index` until
                        // the release store below publishes it.
                        unsafe {
                            (*slot.task.get()).write(task.take().expect("task consumed once"));
                        }
                        slot.sequence.store(index.wrapping_add(1), Ordering::Release);
                        return true;
                    }
                    Err(_) => index = self.write_index.load(Ordering::Relaxed),
                }
            } else if diff < 0 {
                return false;
            } else {
                index = self.write_index.load(Ordering::Relaxed);
            }
        }
    }

    /// Dequeues the next task, or `None` if the queue is empty.
    pub fn pop(&self) -> Option<T> {
        let mut index = self.read_index.load(Ordering::Relaxed);

        loop {
            let slot = &self.slots[(index & self.mask) as usize];
            let sequence = slot.sequence.load(Ordering::Acquire);
            let diff = sequence as i64 - (index as i64 + 1);

            if diff == 0 {
                match self.read_index.compare_exchange_weak(
                    index,
                    index.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: symmetric to the push case — exclusive
                        // ownership runs from winning this CAS to the
                        // release store below.
                        let task = unsafe { (*slot.task.get()).assume_init_read() };
                        slot.sequence
                            .store(index.wrapping_add(self.slots.len() as u32), Ordering::Release);
                        return Some(task);
                    }
                    Err(_) => index = self.read_index.load(Ordering::Relaxed),
                }
            } else if diff < 0 {
                return None;
            } else {
                index = self.read_index.load(Ordering::Relaxed);
            }
        }
    }
}

impl<T> Drop for Queue<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

/// Rounds `value` up to the next power of two (minimum 1).
pub fn next_pow2(value: usize) -> usize {
    if value <= 1 {
        1
    } else {
        value.next_power_of_two()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn push_then_pop_preserves_order() {
        let queue: Queue<u32> = Queue::new(4);
        assert!(queue.push(1));
        assert!(queue.push(2));
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn rounds_capacity_up_to_power_of_two() {
        let queue: Queue<u32> = Queue::new(5);
        assert_eq!(queue.capacity(), 8);
    }

    #[test]
    fn push_fails_when_queue_momentarily_full() {
        let queue: Queue<u32> = Queue::new(2);
        assert!(queue.push(1));
        assert!(queue.push(2));
        assert!(!queue.push(3));
        assert_eq!(queue.pop(), Some(1));
        assert!(queue.push(3));
    }

    #[test]
    fn concurrent_producers_and_consumers_never_duplicate_or_drop() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 2_000;
        const TOTAL: usize = PRODUCERS * PER_PRODUCER;

        let queue = Arc::new(Queue::<usize>::new(TOTAL));
        let mut handles = Vec::new();

        for producer in 0..PRODUCERS {
            let queue = Arc::clone(&queue);
            handles.push(thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    let value = producer * PER_PRODUCER + i;
                    while !queue.push(value) {}
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let mut seen = vec![false; TOTAL];
        let mut drained = 0;
        while drained < TOTAL {
            if let Some(value) = queue.pop() {
                assert!(!seen[value], "value {value} observed twice");
                seen[value] = true;
                drained += 1;
            }
        }
        assert!(seen.iter().all(|&s| s), "every submitted task was drained exactly once");
    }

    #[test]
    fn drop_releases_remaining_tasks() {
        struct DropCounter(Arc<std::sync::atomic::AtomicUsize>);
        impl Drop for DropCounter {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        {
            let queue: Queue<DropCounter> = Queue::new(4);
            assert!(queue.push(DropCounter(Arc::clone(&counter))));
            assert!(queue.push(DropCounter(Arc::clone(&counter))));
        }
        assert_eq!(counter.load(Ordering::Relaxed), 2);
    }
}
