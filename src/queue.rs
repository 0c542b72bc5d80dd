// src/queue.rs
//! Bounded single-producer / single-consumer ring.
//!
//! [`bounded`] returns a [`Producer`]/[`Consumer`] pair sharing a fixed ring
//! of slots. The handles are the concurrency contract: each is `Send` but not
//! `Clone`, and both operations take `&mut self`, so exactly one thread can
//! produce and exactly one can consume.
//!
//! `try_push` fails (returning the value) when the ring is full; `try_pop`
//! returns `None` when it is empty. Neither blocks, and both are lock-free:
//! the producer publishes a slot with a release store of `tail` that the
//! consumer acquires, and the consumer releases the slot back by storing
//! `head`, which the producer acquires. Payload writes therefore happen
//! before the slot is observed as written, and reads complete before the
//! slot is reused.
//!
//! Head and tail are monotonically increasing counters (slot = counter mod
//! capacity). Each side keeps a cached copy of the opposite counter and only
//! re-reads the shared line when the ring looks full/empty, which keeps the
//! two hot indices from ping-ponging between cores.

use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Shared<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    /// Next slot to read; written only by the consumer.
    head: CachePadded<AtomicUsize>,
    /// Next slot to write; written only by the producer.
    tail: CachePadded<AtomicUsize>,
}

// SAFETY: slot access is partitioned by the head/tail protocol: the
// producer touches only slots in [tail, head+capacity), the consumer only
// [head, tail), and each index is advanced by exactly one side.
unsafe impl<T: Send> Sync for Shared<T> {}
unsafe impl<T: Send> Send for Shared<T> {}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        // exclusive access here: both handles are gone
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        for i in head..tail {
            let slot = &self.slots[i % self.slots.len()];
            // SAFETY: slots in [head, tail) hold produced, unconsumed values
            unsafe { (*slot.get()).assume_init_drop() };
        }
    }
}

/// Creates a ring with room for `capacity` in-flight messages.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn bounded<T: Send>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    assert!(capacity > 0, "queue capacity must be non-zero");

    let slots: Box<[UnsafeCell<MaybeUninit<T>>]> = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect();
    let shared = Arc::new(Shared {
        slots,
        head: CachePadded::new(AtomicUsize::new(0)),
        tail: CachePadded::new(AtomicUsize::new(0)),
    });

    (
        Producer {
            shared: Arc::clone(&shared),
            head_cache: 0,
        },
        Consumer {
            shared,
            tail_cache: 0,
        },
    )
}

pub struct Producer<T> {
    shared: Arc<Shared<T>>,
    head_cache: usize,
}

pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
    tail_cache: usize,
}

impl<T: Send> Producer<T> {
    /// Enqueues `value`, or hands it back if the ring is full.
    pub fn try_push(&mut self, value: T) -> Result<(), T> {
        let cap = self.shared.slots.len();
        let tail = self.shared.tail.load(Ordering::Relaxed);

        if tail - self.head_cache == cap {
            self.head_cache = self.shared.head.load(Ordering::Acquire);
            if tail - self.head_cache == cap {
                return Err(value);
            }
        }

        let slot = &self.shared.slots[tail % cap];
        // SAFETY: the slot at `tail` is outside [head, tail) and therefore
        // unobserved by the consumer until the store below
        unsafe { (*slot.get()).write(value) };
        self.shared.tail.store(tail + 1, Ordering::Release);
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.shared.slots.len()
    }
}

impl<T: Send> Consumer<T> {
    /// Dequeues the oldest message, or `None` if the ring is empty.
    pub fn try_pop(&mut self) -> Option<T> {
        let head = self.shared.head.load(Ordering::Relaxed);

        if head == self.tail_cache {
            self.tail_cache = self.shared.tail.load(Ordering::Acquire);
            if head == self.tail_cache {
                return None;
            }
        }

        let slot = &self.shared.slots[head % self.shared.slots.len()];
        // SAFETY: head < tail was acquired above, so this slot holds a
        // value the producer fully wrote before its release store
        let value = unsafe { (*slot.get()).assume_init_read() };
        self.shared.head.store(head + 1, Ordering::Release);
        Some(value)
    }

    pub fn capacity(&self) -> usize {
        self.shared.slots.len()
    }
}
