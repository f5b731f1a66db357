//! Price level: the FIFO queue of orders resting at one price on one side.
//!
//! ## Queue Structure
//!
//! ```text
//! head (oldest) <-> order2 <-> order3 <-> tail (newest)
//! ```
//!
//! - New orders are appended at the tail
//! - Trades consume orders from the head
//! - Any order can be unlinked in O(1) through its own `prev`/`next`
//!
//! Aggregate volume and order count are maintained on every link/unlink and
//! never recomputed by scanning.

use crate::orderbook::{OrderHandle, OrderPool};
use crate::types::Side;

/// Key of a [`Limit`] in the book's level arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LimitKey(pub(crate) usize);

/// A price level.
///
/// The order records live in the [`OrderPool`]; this struct only holds the
/// queue metadata and aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limit {
    /// Price for this level (ticks)
    pub price: i32,

    /// Side this level belongs to
    pub side: Side,

    /// Sum of the remaining sizes of all member orders
    pub volume: u64,

    /// Number of orders at this level
    pub order_count: u32,

    /// Oldest order, first to be matched
    pub head: Option<OrderHandle>,

    /// Newest order
    pub tail: Option<OrderHandle>,
}

impl Limit {
    /// Create a new empty price level
    pub fn new(price: i32, side: Side) -> Self {
        Self {
            price,
            side,
            volume: 0,
            order_count: 0,
            head: None,
            tail: None,
        }
    }

    /// A level is empty iff it has neither head nor tail and no orders
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none() && self.tail.is_none() && self.order_count == 0
    }

    /// Append an order at the tail of the queue.
    ///
    /// # Panics
    ///
    /// Panics if a handle doesn't exist in the pool
    pub fn append(&mut self, handle: OrderHandle, pool: &mut OrderPool) {
        let order = &mut pool[handle];
        let size = order.size;

        order.prev = self.tail;
        order.next = None;

        if let Some(tail) = self.tail {
            pool[tail].next = Some(handle);
        } else {
            // Empty list - this is also the head
            self.head = Some(handle);
        }

        self.tail = Some(handle);
        self.order_count += 1;
        self.volume += u64::from(size);
    }

    /// Unlink an order from anywhere in the queue.
    ///
    /// # Returns
    ///
    /// The remaining size of the unlinked order
    pub fn unlink(&mut self, handle: OrderHandle, pool: &mut OrderPool) -> u32 {
        let order = &pool[handle];
        let size = order.size;
        let prev = order.prev;
        let next = order.next;

        match prev {
            Some(prev) => pool[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => pool[next].prev = prev,
            None => self.tail = prev,
        }

        let order = &mut pool[handle];
        order.prev = None;
        order.next = None;

        self.order_count -= 1;
        self.volume -= u64::from(size);

        size
    }

    /// Account for `quantity` taken from a member order in place
    #[inline]
    pub fn reduce(&mut self, quantity: u32) {
        self.volume -= u64::from(quantity);
    }

    /// Oldest order's handle
    #[inline]
    pub fn peek_head(&self) -> Option<OrderHandle> {
        self.head
    }

    /// Walk the queue from head to tail
    pub fn iter<'a>(&self, pool: &'a OrderPool) -> LevelIter<'a> {
        LevelIter {
            pool,
            cursor: self.head,
        }
    }
}

/// Head-to-tail iterator over a level's orders.
pub struct LevelIter<'a> {
    pool: &'a OrderPool,
    cursor: Option<OrderHandle>,
}

impl<'a> Iterator for LevelIter<'a> {
    type Item = (OrderHandle, &'a crate::types::Order);

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor?;
        let order = self.pool.get(handle)?;
        self.cursor = order.next;
        Some((handle, order))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
