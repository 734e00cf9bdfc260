use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use cbuild_queue::Queue;

/// Many producers and many consumers racing against a single queue: every
/// task submitted must be pulled exactly once (spec §4.3, testable
/// property #5 "the task queue never returns the same slot content to two
/// consumers").
#[test]
fn many_producers_many_consumers_exactly_once_delivery() {
    const PRODUCERS: usize = 6;
    const CONSUMERS: usize = 6;
    const PER_PRODUCER: usize = 5_000;
    const TOTAL: usize = PRODUCERS * PER_PRODUCER;

    let queue = Arc::new(Queue::<usize>::new(TOTAL));
    let seen_count = Arc::new(AtomicUsize::new(0));
    let duplicate_slots: Arc<Vec<AtomicUsize>> =
        Arc::new((0..TOTAL).map(|_| AtomicUsize::new(0)).collect());
    let drained = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();

    for producer in 0..PRODUCERS {
        let queue = Arc::clone(&queue);
        handles.push(thread::spawn(move || {
            for i in 0..PER_PRODUCER {
                let value = producer * PER_PRODUCER + i;
                while !queue.push(value) {
                    thread::yield_now();
                }
            }
        }));
    }

    for _ in 0..CONSUMERS {
        let queue = Arc::clone(&queue);
        let seen_count = Arc::clone(&seen_count);
        let duplicate_slots = Arc::clone(&duplicate_slots);
        let drained = Arc::clone(&drained);
        handles.push(thread::spawn(move || {
            loop {
                if drained.load(Ordering::Acquire) >= TOTAL {
                    break;
                }
                if let Some(value) = queue.pop() {
                    duplicate_slots[value].fetch_add(1, Ordering::Relaxed);
                    seen_count.fetch_add(1, Ordering::Relaxed);
                    drained.fetch_add(1, Ordering::Release);
                } else {
                    thread::yield_now();
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(seen_count.load(Ordering::Relaxed), TOTAL);
    for (value, count) in duplicate_slots.iter().enumerate() {
        assert_eq!(count.load(Ordering::Relaxed), 1, "task {value} delivered {} times", count.load(Ordering::Relaxed));
    }
}
