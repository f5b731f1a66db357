//! Lock-free single-producer/single-consumer ring buffer.
//!
//! ## Properties
//!
//! - Fixed capacity of `N - 1` items (one slot always stays free to tell
//!   full from empty)
//! - `enqueue` and `dequeue` are wait-free O(1) and never allocate
//! - A full queue rejects the item and hands it back; nothing is dropped
//!   implicitly and nothing blocks
//! - Head and tail indices sit on separate cache lines
//!
//! ## Publication Protocol
//!
//! Each slot carries an occupancy flag next to its storage. The producer
//! writes the value, stores the flag with `Release` and then advances the
//! tail. The consumer loads the flag with `Acquire` before reading the
//! value, and clears it with `Release` before advancing the head, so the
//! producer never reuses a slot whose value is still being moved out.
//!
//! ## SPSC by Construction
//!
//! The queue itself exposes no push/pop. [`channel`] splits it into one
//! [`Producer`] and one [`Consumer`]; neither is `Clone` and both mutate
//! through `&mut self`, so safe code cannot reach a second producer or
//! consumer.
//!
//! ```
//! use tickbook::queue;
//!
//! let (mut tx, mut rx) = queue::channel::<u32, 4>();
//! assert!(tx.enqueue(1).is_ok());
//! assert!(tx.enqueue(2).is_ok());
//! assert_eq!(rx.dequeue(), Some(1));
//! assert_eq!(rx.dequeue(), Some(2));
//! assert_eq!(rx.dequeue(), None);
//! ```

use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::utils::CachePadded;

struct Slot<T> {
    occupied: AtomicBool,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    fn empty() -> Self {
        Self {
            occupied: AtomicBool::new(false),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

/// Fixed-capacity SPSC ring of `N` slots.
pub struct LockFreeQueue<T, const N: usize> {
    slots: Box<[Slot<T>]>,
    /// Next slot to read (owned by the consumer)
    head: CachePadded<AtomicUsize>,
    /// Next slot to write (owned by the producer)
    tail: CachePadded<AtomicUsize>,
}

// Safety: values cross threads by move only and every slot access is
// serialized by the occupancy flag handshake between one producer and one
// consumer.
unsafe impl<T: Send, const N: usize> Send for LockFreeQueue<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for LockFreeQueue<T, N> {}

impl<T, const N: usize> LockFreeQueue<T, N> {
    const MIN_SLOTS: () = assert!(N >= 2, "LockFreeQueue needs at least two slots");

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::MIN_SLOTS;

        Self {
            slots: (0..N).map(|_| Slot::empty()).collect(),
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Split into the two endpoints
    pub fn split(self) -> (Producer<T, N>, Consumer<T, N>) {
        let shared = Arc::new(self);
        (
            Producer {
                queue: Arc::clone(&shared),
                enqueued: 0,
                dropped: 0,
            },
            Consumer {
                queue: shared,
                dequeued: 0,
            },
        )
    }

    /// Maximum number of items held at once
    #[inline]
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Approximate number of queued items
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (tail + N - head) % N
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    /// Producer side only.
    #[inline]
    fn push(&self, item: T) -> Result<(), T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let next = (tail + 1) % N;

        if next == self.head.load(Ordering::Acquire) {
            return Err(item);
        }

        let slot = &self.slots[tail];
        // Safety: the slot lies outside [head, tail) so the consumer is not
        // reading it, and its flag was cleared before head moved past it.
        unsafe { (*slot.value.get()).write(item) };
        slot.occupied.store(true, Ordering::Release);
        self.tail.store(next, Ordering::Release);

        Ok(())
    }

    /// Consumer side only.
    #[inline]
    fn pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);

        if head == self.tail.load(Ordering::Acquire) {
            return None;
        }

        let slot = &self.slots[head];
        if !slot.occupied.load(Ordering::Acquire) {
            return None;
        }

        // Safety: the occupied flag was published after the value was written
        // and only this consumer clears it.
        let value = unsafe { (*slot.value.get()).assume_init_read() };
        slot.occupied.store(false, Ordering::Release);
        self.head.store((head + 1) % N, Ordering::Release);

        Some(value)
    }
}

impl<T, const N: usize> Default for LockFreeQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for LockFreeQueue<T, N> {
    fn drop(&mut self) {
        for slot in self.slots.iter_mut() {
            if *slot.occupied.get_mut() {
                // Safety: occupied slots hold an initialized value nobody
                // else can reach once we have `&mut self`.
                unsafe { slot.value.get_mut().assume_init_drop() };
            }
        }
    }
}

impl<T, const N: usize> fmt::Debug for LockFreeQueue<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

/// Create a queue and split it into its endpoints
pub fn channel<T, const N: usize>() -> (Producer<T, N>, Consumer<T, N>) {
    LockFreeQueue::new().split()
}

/// Writing end of a [`LockFreeQueue`].
#[derive(Debug)]
pub struct Producer<T, const N: usize> {
    queue: Arc<LockFreeQueue<T, N>>,
    enqueued: u64,
    dropped: u64,
}

impl<T, const N: usize> Producer<T, N> {
    /// Try to queue `item` without blocking.
    ///
    /// # Errors
    ///
    /// Returns the item back if the queue is full; the drop is counted.
    #[inline]
    pub fn enqueue(&mut self, item: T) -> Result<(), T> {
        self.enqueued += 1;
        let result = self.queue.push(item);
        if result.is_err() {
            self.dropped += 1;
        }
        result
    }

    /// Calls to `enqueue`, including rejected ones
    #[inline]
    pub fn enqueued(&self) -> u64 {
        self.enqueued
    }

    /// Items rejected because the queue was full
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.queue.len() == self.queue.capacity()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

/// Reading end of a [`LockFreeQueue`].
#[derive(Debug)]
pub struct Consumer<T, const N: usize> {
    queue: Arc<LockFreeQueue<T, N>>,
    dequeued: u64,
}

impl<T, const N: usize> Consumer<T, N> {
    /// Take the oldest item, `None` if nothing is published yet
    #[inline]
    pub fn dequeue(&mut self) -> Option<T> {
        let item = self.queue.pop()?;
        self.dequeued += 1;
        Some(item)
    }

    /// Items taken so far
    #[inline]
    pub fn dequeued(&self) -> u64 {
        self.dequeued
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_queue_basic() {
        let (mut tx, mut rx) = channel::<i32, 4>();

        assert!(rx.is_empty());
        assert_eq!(tx.capacity(), 3);

        assert!(tx.enqueue(1).is_ok());
        assert!(tx.enqueue(2).is_ok());
        assert!(tx.enqueue(3).is_ok());
        assert_eq!(tx.enqueue(4), Err(4));
        assert!(tx.is_full());

        assert_eq!(rx.dequeue(), Some(1));
        assert_eq!(rx.dequeue(), Some(2));
        assert_eq!(rx.dequeue(), Some(3));
        assert_eq!(rx.dequeue(), None);

        assert_eq!(tx.enqueued(), 4);
        assert_eq!(tx.dropped(), 1);
        assert_eq!(rx.dequeued(), 3);
    }

    #[test]
    fn test_queue_wrap() {
        let (mut tx, mut rx) = channel::<i32, 4>();

        for round in 0..10 {
            for i in 0..3 {
                assert!(tx.enqueue(round * 10 + i).is_ok());
            }
            assert_eq!(rx.len(), 3);
            for i in 0..3 {
                assert_eq!(rx.dequeue(), Some(round * 10 + i));
            }
        }
        assert!(rx.is_empty());
    }

    #[test]
    fn test_queue_slot_freed_after_dequeue() {
        let (mut tx, mut rx) = channel::<String, 2>();

        assert!(tx.enqueue("a".to_string()).is_ok());
        assert!(tx.enqueue("b".to_string()).is_err());
        assert_eq!(rx.dequeue().as_deref(), Some("a"));
        assert!(tx.enqueue("b".to_string()).is_ok());
        assert_eq!(rx.dequeue().as_deref(), Some("b"));
    }

    #[test]
    fn test_queue_drops_leftovers() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Tracked;
        impl Drop for Tracked {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        let (mut tx, mut rx) = channel::<Tracked, 8>();
        for _ in 0..5 {
            assert!(tx.enqueue(Tracked).is_ok());
        }
        drop(rx.dequeue());
        assert_eq!(DROPS.load(Ordering::SeqCst), 1);

        drop(tx);
        drop(rx);
        assert_eq!(DROPS.load(Ordering::SeqCst), 5);
    }
}
