//! Order record and book side.
//!
//! ## Intrusive Links
//!
//! An `Order` is a node of the FIFO queue at its price level. The `prev` /
//! `next` links and the `level` back-reference are arena handles, not
//! pointers, so an order can be unlinked in O(1) without any aliasing.
//!
//! ## Prices
//!
//! Prices are signed integer ticks (`i32`). Sizes are unsigned lot counts.

use crate::orderbook::{LimitKey, OrderHandle};

// ============================================================================
// Side enum
// ============================================================================

/// Book side: Bid or Ask
///
/// The feed encodes the side as a bool (`true` = bid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum Side {
    /// Resting buy interest, best = highest price
    #[default]
    Bid,
    /// Resting sell interest, best = lowest price
    Ask,
}

impl Side {
    /// Convert from the feed's bool encoding
    #[inline]
    pub fn from_is_bid(is_bid: bool) -> Self {
        if is_bid {
            Side::Bid
        } else {
            Side::Ask
        }
    }

    /// `true` for bids
    #[inline]
    pub fn is_bid(self) -> bool {
        matches!(self, Side::Bid)
    }

    /// Returns the opposite side
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }

    /// Stable one-byte tag, used when hashing book state
    #[inline]
    pub fn to_u8(self) -> u8 {
        match self {
            Side::Bid => 0,
            Side::Ask => 1,
        }
    }
}

impl From<bool> for Side {
    fn from(is_bid: bool) -> Self {
        Side::from_is_bid(is_bid)
    }
}

// ============================================================================
// Order struct
// ============================================================================

/// A resting limit order.
///
/// Owned by the [`OrderPool`](crate::orderbook::OrderPool); the level queue
/// and the book's id index only hold its [`OrderHandle`].
///
/// ## Example
///
/// ```
/// use tickbook::types::{Order, Side};
///
/// let order = Order::new(7, 10_250, 40, Side::Ask, 1_700_000_000_000_000_000);
/// assert_eq!(order.size, 40);
/// assert!(order.is_unlinked());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Order {
    /// Caller-assigned order identifier
    pub id: u64,

    /// Limit price in ticks
    pub price: i32,

    /// Remaining size
    pub size: u32,

    /// Side of the book the order rests on
    pub side: Side,

    /// Event time in nanoseconds since epoch
    pub time: u64,

    /// Set once a trade consumed the whole remaining size
    pub filled: bool,

    /// Older neighbour in the level queue (None if head)
    pub prev: Option<OrderHandle>,

    /// Newer neighbour in the level queue (None if tail)
    pub next: Option<OrderHandle>,

    /// Level currently holding this order
    pub level: Option<LimitKey>,
}

impl Order {
    /// Create a new, unlinked order
    pub fn new(id: u64, price: i32, size: u32, side: Side, time: u64) -> Self {
        Self {
            id,
            price,
            size,
            side,
            time,
            filled: false,
            prev: None,
            next: None,
            level: None,
        }
    }

    /// Check if this order is not part of any level queue
    #[inline]
    pub fn is_unlinked(&self) -> bool {
        self.prev.is_none() && self.next.is_none() && self.level.is_none()
    }

    /// Consume up to `quantity` from the remaining size.
    ///
    /// # Returns
    ///
    /// The quantity actually taken. Marks the order filled when it reaches zero.
    #[inline]
    pub fn fill(&mut self, quantity: u32) -> u32 {
        let taken = quantity.min(self.size);
        self.size -= taken;
        if self.size == 0 {
            self.filled = true;
        }
        taken
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
