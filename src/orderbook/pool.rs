//! Slab-backed order arena.
//!
//! ## Design
//!
//! Every resting order lives in one slot of a [`Slab`]. The slot key is
//! wrapped in an [`OrderHandle`] and is the only way the rest of the book
//! refers to an order, so there are no raw pointers to dangle.
//!
//! ## Slab Integration
//!
//! Per official slab docs (https://docs.rs/slab/0.4.11):
//! - Keys are `usize` values returned by `slab.insert()`
//! - Keys are reused after `slab.remove()` (the free list)
//! - O(1) insert, remove, and lookup; growth is amortized like `Vec`

use std::ops::{Index, IndexMut};

use slab::Slab;

use crate::types::Order;

/// Stable handle to an order slot in the [`OrderPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderHandle(usize);

/// Arena of order records with O(1) acquire/release.
#[derive(Debug, Default)]
pub struct OrderPool {
    slots: Slab<Order>,
}

impl OrderPool {
    /// Create a pool with `capacity` pre-allocated slots
    ///
    /// # Example
    ///
    /// ```
    /// use tickbook::orderbook::OrderPool;
    ///
    /// let pool = OrderPool::with_capacity(1_000);
    /// assert!(pool.capacity() >= 1_000);
    /// assert!(pool.is_empty());
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Slab::with_capacity(capacity),
        }
    }

    /// Place `order` into a free slot, growing the backing storage if exhausted.
    #[inline]
    pub fn acquire(&mut self, order: Order) -> OrderHandle {
        OrderHandle(self.slots.insert(order))
    }

    /// Return a slot to the free list.
    ///
    /// # Returns
    ///
    /// The order that occupied the slot, or `None` if the handle was
    /// already released.
    #[inline]
    pub fn release(&mut self, handle: OrderHandle) -> Option<Order> {
        self.slots.try_remove(handle.0)
    }

    #[inline]
    pub fn get(&self, handle: OrderHandle) -> Option<&Order> {
        self.slots.get(handle.0)
    }

    /// Number of outstanding orders
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Release every slot, keeping the allocation
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

impl Index<OrderHandle> for OrderPool {
    type Output = Order;

    #[inline]
    fn index(&self, handle: OrderHandle) -> &Order {
        self.slots.get(handle.0).expect("Invalid order handle")
    }
}

impl IndexMut<OrderHandle> for OrderPool {
    #[inline]
    fn index_mut(&mut self, handle: OrderHandle) -> &mut Order {
        self.slots.get_mut(handle.0).expect("Invalid order handle")
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;

    #[test]
    fn test_pool_acquire_release() {
        let mut pool = OrderPool::with_capacity(4);

        let a = pool.acquire(Order::new(1, 100, 5, Side::Bid, 0));
        let b = pool.acquire(Order::new(2, 101, 6, Side::Ask, 0));

        assert_eq!(pool.len(), 2);
        assert_eq!(pool[a].id, 1);
        assert_eq!(pool[b].id, 2);

        let released = pool.release(a).unwrap();
        assert_eq!(released.id, 1);
        assert_eq!(pool.len(), 1);
        assert!(pool.get(a).is_none());
    }

    #[test]
    fn test_pool_double_release_is_none() {
        let mut pool = OrderPool::with_capacity(1);
        let handle = pool.acquire(Order::new(1, 100, 5, Side::Bid, 0));

        assert!(pool.release(handle).is_some());
        assert!(pool.release(handle).is_none());
    }

    #[test]
    fn test_pool_reuses_released_slot() {
        let mut pool = OrderPool::with_capacity(2);
        let first = pool.acquire(Order::new(1, 100, 5, Side::Bid, 0));
        pool.release(first);

        let second = pool.acquire(Order::new(2, 100, 5, Side::Bid, 0));
        assert_eq!(first, second, "Should reuse freed slot");
    }

    #[test]
    fn test_pool_grows_past_capacity() {
        let mut pool = OrderPool::with_capacity(2);
        for id in 0..100 {
            pool.acquire(Order::new(id, 100, 1, Side::Ask, 0));
        }
        assert_eq!(pool.len(), 100);
        assert!(pool.capacity() >= 100);
    }
}
