//! Price-time priority limit order book driven by a replayed event feed.
//!
//! ## Architecture
//!
//! - **OrderPool**: slab arena owning every resting order
//! - **Level arena**: slab of [`Limit`]s, reused as price levels come and go
//! - **Ladders**: one [`Ladder`] per side, best-first ordered price → level
//! - **Level index**: `(price, side)` → level for O(1) lookup of known prices
//! - **Order index**: order id → handle for O(1) cancel/modify
//!
//! ## Per-order Lifecycle
//!
//! ```text
//! Added -> Modified* -> (Removed | Filled)
//! ```
//!
//! A level is created on the first order at its price and released the
//! moment it empties, whether by cancel, reprice or trade.
//!
//! ## Threading
//!
//! The book is single-threaded by contract: it holds no locks and every
//! mutating method takes `&mut self`.
//!
//! ## Example
//!
//! ```
//! use tickbook::orderbook::Orderbook;
//! use tickbook::types::{Message, Side};
//!
//! let mut book = Orderbook::with_capacity(1_000);
//!
//! book.process_msg(&Message::add(1, 100, 5, Side::Bid, 0)).unwrap();
//! book.process_msg(&Message::add(2, 102, 7, Side::Ask, 0)).unwrap();
//!
//! assert_eq!(book.best_bid_price(), Some(100));
//! assert_eq!(book.best_ask_price(), Some(102));
//! assert_eq!(book.mid_price(), Some(101));
//! ```

use std::collections::{HashMap, VecDeque};

use sha2::{Digest, Sha256};
use slab::Slab;
use tracing::{debug, trace, warn};

use crate::config::BookConfig;
use crate::error::BookError;
use crate::logging::format_timestamp;
use crate::orderbook::{
    BookSnapshot, Ladder, LevelView, Limit, LimitKey, OrderHandle, OrderPool,
};
use crate::types::{Action, Message, Order, Side};

/// Outcome of a modify event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyOutcome {
    /// Unknown id, added as a new order
    Added,
    /// Same price, size not increased: updated in place, priority kept
    Resized,
    /// Same price, size increased: moved to the tail of its level
    Requeued,
    /// New price: moved to the tail of the new level
    Repriced,
}

/// Result of matching one trade print against resting liquidity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TradeSummary {
    /// Id carried by the trade message (aggressor)
    pub aggressor_id: u64,
    /// Size taken from resting orders
    pub traded: u32,
    /// Size that found no resting order at the trade price
    pub unmatched: u32,
    /// Resting orders consumed completely (and removed)
    pub orders_filled: u32,
    /// Resting orders left with a smaller size
    pub orders_reduced: u32,
}

/// Outcome of [`Orderbook::process_msg`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Added(OrderHandle),
    Cancelled(u64),
    Modified(ModifyOutcome),
    Traded(TradeSummary),
}

/// Limit order book with cached microstructure analytics.
#[derive(Debug)]
pub struct Orderbook {
    /// Resting order storage
    orders: OrderPool,

    /// Price level storage
    limits: Slab<Limit>,

    bids: Ladder,
    asks: Ladder,

    /// (price, side) to level
    limit_index: HashMap<(i32, Side), LimitKey>,

    /// Order id to pool handle
    order_index: HashMap<u64, OrderHandle>,

    bid_count: u64,
    ask_count: u64,

    /// Messages applied since construction or reset
    messages: u64,

    /// Event time of the last processed message (ns since epoch)
    current_time: u64,

    volume_depth: usize,
    snapshot_depth: usize,
    history_capacity: usize,

    // VWAP accumulators
    price_volume_sum: i128,
    traded_volume: u128,
    vwap: Option<f64>,

    // Cached depth and imbalance
    bid_vol: u64,
    ask_vol: u64,
    imbalance: f64,
    skew: f64,

    // Volume-order imbalance state
    prev_best_bid: Option<(i32, u64)>,
    prev_best_ask: Option<(i32, u64)>,
    voi_history: VecDeque<i64>,

    mid_prices: VecDeque<i32>,
}

impl Default for Orderbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Orderbook {
    /// Create a book with the default configuration
    pub fn new() -> Self {
        Self::with_config(&BookConfig::default())
    }

    /// Create a book with `order_capacity` pre-allocated order slots
    ///
    /// # Example
    ///
    /// ```
    /// use tickbook::orderbook::Orderbook;
    ///
    /// let book = Orderbook::with_capacity(100_000);
    /// assert!(book.capacity() >= 100_000);
    /// ```
    pub fn with_capacity(order_capacity: usize) -> Self {
        Self::with_config(&BookConfig {
            order_capacity,
            ..BookConfig::default()
        })
    }

    pub fn with_config(config: &BookConfig) -> Self {
        Self {
            orders: OrderPool::with_capacity(config.order_capacity),
            limits: Slab::with_capacity(config.level_capacity),
            bids: Ladder::new(Side::Bid),
            asks: Ladder::new(Side::Ask),
            limit_index: HashMap::with_capacity(config.level_capacity),
            order_index: HashMap::with_capacity(config.order_capacity),
            bid_count: 0,
            ask_count: 0,
            messages: 0,
            current_time: 0,
            volume_depth: config.volume_depth,
            snapshot_depth: config.snapshot_depth,
            history_capacity: config.history_capacity,
            price_volume_sum: 0,
            traded_volume: 0,
            vwap: None,
            bid_vol: 0,
            ask_vol: 0,
            imbalance: 0.0,
            skew: 0.0,
            prev_best_bid: None,
            prev_best_ask: None,
            voi_history: VecDeque::with_capacity(config.history_capacity),
            mid_prices: VecDeque::with_capacity(config.history_capacity),
        }
    }

    // ========================================================================
    // Event Dispatch
    // ========================================================================

    /// Apply one feed event.
    ///
    /// Advances the book clock to the message time, then dispatches on the
    /// action code.
    pub fn process_msg(&mut self, msg: &Message) -> Result<Applied, BookError> {
        self.messages += 1;
        self.current_time = msg.time;

        match msg.action {
            Action::Add => self
                .add_limit_order(msg.id, msg.price, msg.size, msg.side, msg.time)
                .map(Applied::Added),
            Action::Cancel => match self.remove_order(msg.id) {
                Ok(order) => {
                    if order.side != msg.side {
                        warn!(
                            id = msg.id,
                            resident = ?order.side,
                            requested = ?msg.side,
                            "cancel side disagrees with resident order"
                        );
                    }
                    Ok(Applied::Cancelled(order.id))
                }
                Err(err) => {
                    warn!(id = msg.id, %err, "cancel rejected");
                    Err(err)
                }
            },
            Action::Modify => self
                .modify_order(msg.id, msg.price, msg.size, msg.side, msg.time)
                .map(Applied::Modified),
            Action::Trade => Ok(Applied::Traded(
                self.trade_order(msg.id, msg.price, msg.size, msg.side),
            )),
        }
    }

    // ========================================================================
    // Order Management
    // ========================================================================

    /// Add a resting order at the tail of its price level.
    ///
    /// # Errors
    ///
    /// [`BookError::DuplicateOrder`] if `id` is still resident; the book is
    /// left unchanged.
    pub fn add_limit_order(
        &mut self,
        id: u64,
        price: i32,
        size: u32,
        side: Side,
        time: u64,
    ) -> Result<OrderHandle, BookError> {
        if self.order_index.contains_key(&id) {
            return Err(BookError::DuplicateOrder { id });
        }

        let level = self.get_or_insert_limit(side, price);
        let handle = self.orders.acquire(Order::new(id, price, size, side, time));
        self.link(level, handle);
        self.order_index.insert(id, handle);

        match side {
            Side::Bid => self.bid_count += 1,
            Side::Ask => self.ask_count += 1,
        }

        Ok(handle)
    }

    /// Remove a resting order by id.
    ///
    /// Releases its level if the level becomes empty and returns the order
    /// slot to the pool.
    ///
    /// # Errors
    ///
    /// [`BookError::UnknownOrder`] if `id` is not resident.
    pub fn remove_order(&mut self, id: u64) -> Result<Order, BookError> {
        let handle = self
            .order_index
            .remove(&id)
            .ok_or(BookError::UnknownOrder { id })?;

        self.detach(handle);
        let order = self.take(handle);
        self.decrement_count(order.side);

        Ok(order)
    }

    /// Change an order's price and/or size.
    ///
    /// - unknown id: added as a new order
    /// - same price, size not increased: in place, time priority kept
    /// - same price, size increased: requeued at the tail of the same level
    /// - new price: moved to the tail of the new level
    ///
    /// # Errors
    ///
    /// [`BookError::SideMismatch`] if `side` differs from the resident
    /// order's side. The book is left unchanged.
    pub fn modify_order(
        &mut self,
        id: u64,
        new_price: i32,
        new_size: u32,
        side: Side,
        time: u64,
    ) -> Result<ModifyOutcome, BookError> {
        let Some(&handle) = self.order_index.get(&id) else {
            debug!(id, price = new_price, "modify for unknown order, adding");
            self.add_limit_order(id, new_price, new_size, side, time)?;
            return Ok(ModifyOutcome::Added);
        };

        let (resident, prev_price, prev_size) = {
            let order = &self.orders[handle];
            (order.side, order.price, order.size)
        };

        if resident != side {
            warn!(id, ?resident, requested = ?side, "modify attempted to switch sides");
            return Err(BookError::SideMismatch {
                id,
                resident,
                requested: side,
            });
        }

        if prev_price != new_price {
            self.detach(handle);
            let level = self.get_or_insert_limit(side, new_price);
            let order = &mut self.orders[handle];
            order.price = new_price;
            order.size = new_size;
            order.time = time;
            self.link(level, handle);
            Ok(ModifyOutcome::Repriced)
        } else if new_size > prev_size {
            let level = self.level_of(handle);
            let limit = &mut self.limits[level.0];
            limit.unlink(handle, &mut self.orders);
            let order = &mut self.orders[handle];
            order.size = new_size;
            order.time = time;
            limit.append(handle, &mut self.orders);
            Ok(ModifyOutcome::Requeued)
        } else {
            let level = self.level_of(handle);
            self.limits[level.0].reduce(prev_size - new_size);
            self.orders[handle].size = new_size;
            Ok(ModifyOutcome::Resized)
        }
    }

    /// Match a trade print against the resting side opposite the aggressor.
    ///
    /// Walks the level at `price` from its head, consuming liquidity FIFO.
    /// Resting orders that are fully consumed are marked filled and removed
    /// immediately; a level emptied this way is released. The print always
    /// contributes to VWAP.
    pub fn trade_order(&mut self, id: u64, price: i32, size: u32, side: Side) -> TradeSummary {
        self.record_vwap(price, size);

        let mut summary = TradeSummary {
            aggressor_id: id,
            unmatched: size,
            ..TradeSummary::default()
        };

        let resting = side.opposite();
        let Some(&level) = self.limit_index.get(&(price, resting)) else {
            trace!(price, ?resting, "trade at a price with no resting level");
            return summary;
        };

        let mut remaining = size;
        let mut cursor = self.limits[level.0].peek_head();

        while remaining > 0 {
            let Some(handle) = cursor else { break };
            let order = &mut self.orders[handle];
            cursor = order.next;

            if remaining < order.size {
                order.size -= remaining;
                self.limits[level.0].reduce(remaining);
                summary.traded += remaining;
                summary.orders_reduced += 1;
                remaining = 0;
            } else {
                let taken = order.fill(remaining);
                let order_id = order.id;
                self.limits[level.0].reduce(taken);
                remaining -= taken;
                summary.traded += taken;
                summary.orders_filled += 1;

                self.order_index.remove(&order_id);
                self.detach(handle);
                self.take(handle);
                self.decrement_count(resting);
            }
        }

        summary.unmatched = remaining;
        summary
    }

    // ========================================================================
    // Analytics
    // ========================================================================

    /// Sum resident volume over the top `volume_depth` levels of each side
    /// into the cached bid/ask volumes.
    ///
    /// Meant to be called periodically, not per message.
    pub fn calculate_vols(&mut self) {
        self.bid_vol = self.side_volume(Side::Bid);
        self.ask_vol = self.side_volume(Side::Ask);
    }

    fn side_volume(&self, side: Side) -> u64 {
        self.ladder(side)
            .keys()
            .take(self.volume_depth)
            .map(|key| self.limits[key.0].volume)
            .sum()
    }

    /// `(bid_vol - ask_vol) / (bid_vol + ask_vol)` over the cached volumes,
    /// 0 when both are zero.
    pub fn calculate_imbalance(&mut self) -> f64 {
        let total = self.bid_vol + self.ask_vol;
        self.imbalance = if total == 0 {
            0.0
        } else {
            (self.bid_vol as f64 - self.ask_vol as f64) / total as f64
        };
        self.imbalance
    }

    /// `log10(best bid depth) - log10(best ask depth)`.
    ///
    /// Returns `None` (cached skew unchanged) if either side is empty.
    pub fn calculate_skew(&mut self) -> Option<f64> {
        let bid_depth = self.best_bid_volume()?;
        let ask_depth = self.best_ask_volume()?;
        self.skew = (bid_depth as f64).log10() - (ask_depth as f64).log10();
        Some(self.skew)
    }

    /// Volume-order imbalance since the previous observation.
    ///
    /// Bid contribution: full best-bid volume if the best bid rose, the
    /// volume change if it held, nothing if it fell. The ask side mirrors
    /// this with price direction reversed. The result is appended to the
    /// VOI history.
    ///
    /// Returns `None` (history unchanged) if either side is empty.
    pub fn calculate_voi(&mut self) -> Option<i64> {
        let bid = self.best_level(Side::Bid)?;
        let ask = self.best_level(Side::Ask)?;

        let bid_cv = match self.prev_best_bid {
            None => bid.1 as i64,
            Some((prev_price, prev_volume)) => {
                if bid.0 > prev_price {
                    bid.1 as i64
                } else if bid.0 == prev_price {
                    bid.1 as i64 - prev_volume as i64
                } else {
                    0
                }
            }
        };

        let ask_cv = match self.prev_best_ask {
            None => ask.1 as i64,
            Some((prev_price, prev_volume)) => {
                if ask.0 < prev_price {
                    ask.1 as i64
                } else if ask.0 == prev_price {
                    ask.1 as i64 - prev_volume as i64
                } else {
                    0
                }
            }
        };

        let voi = bid_cv - ask_cv;
        if self.history_capacity > 0 && self.voi_history.len() == self.history_capacity {
            self.voi_history.pop_front();
        }
        self.voi_history.push_back(voi);
        self.prev_best_bid = Some(bid);
        self.prev_best_ask = Some(ask);

        Some(voi)
    }

    /// Push the current mid price into the bounded history.
    ///
    /// Returns `None` (history unchanged) if either side is empty.
    pub fn record_mid_price(&mut self) -> Option<i32> {
        let mid = self.mid_price()?;
        if self.history_capacity > 0 && self.mid_prices.len() == self.history_capacity {
            self.mid_prices.pop_front();
        }
        self.mid_prices.push_back(mid);
        Some(mid)
    }

    fn record_vwap(&mut self, price: i32, size: u32) {
        if size == 0 {
            return;
        }
        self.price_volume_sum += i128::from(price) * i128::from(size);
        self.traded_volume += u128::from(size);
        self.vwap = Some(self.price_volume_sum as f64 / self.traded_volume as f64);
    }

    // ========================================================================
    // Best Bid/Ask
    // ========================================================================

    /// Highest bid price, `None` if there are no bids
    #[inline]
    pub fn best_bid_price(&self) -> Option<i32> {
        self.bids.best().map(|(price, _)| price)
    }

    /// Lowest ask price, `None` if there are no asks
    #[inline]
    pub fn best_ask_price(&self) -> Option<i32> {
        self.asks.best().map(|(price, _)| price)
    }

    /// Resident volume at the best bid
    #[inline]
    pub fn best_bid_volume(&self) -> Option<u64> {
        self.best_level(Side::Bid).map(|(_, volume)| volume)
    }

    /// Resident volume at the best ask
    #[inline]
    pub fn best_ask_volume(&self) -> Option<u64> {
        self.best_level(Side::Ask).map(|(_, volume)| volume)
    }

    fn best_level(&self, side: Side) -> Option<(i32, u64)> {
        self.ladder(side)
            .best()
            .map(|(price, key)| (price, self.limits[key.0].volume))
    }

    /// Best bid level
    pub fn best_bid(&self) -> Option<&Limit> {
        self.bids.best().map(|(_, key)| &self.limits[key.0])
    }

    /// Best ask level
    pub fn best_ask(&self) -> Option<&Limit> {
        self.asks.best().map(|(_, key)| &self.limits[key.0])
    }

    /// `(best_bid + best_ask) / 2`, rounded toward zero
    pub fn mid_price(&self) -> Option<i32> {
        let bid = i64::from(self.best_bid_price()?);
        let ask = i64::from(self.best_ask_price()?);
        // The mean of two i32 values always fits in i32
        Some(((bid + ask) / 2) as i32)
    }

    /// `best_ask - best_bid`; negative while the book is crossed
    pub fn spread(&self) -> Option<i64> {
        Some(i64::from(self.best_ask_price()?) - i64::from(self.best_bid_price()?))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Resident orders on both sides
    #[inline]
    pub fn get_count(&self) -> u64 {
        self.bid_count + self.ask_count
    }

    #[inline]
    pub fn bid_count(&self) -> u64 {
        self.bid_count
    }

    #[inline]
    pub fn ask_count(&self) -> u64 {
        self.ask_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order_index.is_empty()
    }

    /// Order slots currently allocated
    #[inline]
    pub fn capacity(&self) -> usize {
        self.orders.capacity()
    }

    #[inline]
    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    #[inline]
    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    #[inline]
    pub fn contains_order(&self, id: u64) -> bool {
        self.order_index.contains_key(&id)
    }

    pub fn get_order(&self, id: u64) -> Option<&Order> {
        let handle = self.order_index.get(&id)?;
        self.orders.get(*handle)
    }

    /// Level at `price` on `side`
    pub fn level(&self, side: Side, price: i32) -> Option<&Limit> {
        let key = self.limit_index.get(&(price, side))?;
        self.limits.get(key.0)
    }

    /// Order ids at `price` on `side`, oldest first
    pub fn level_order_ids(&self, side: Side, price: i32) -> impl Iterator<Item = u64> + '_ {
        self.level(side, price)
            .into_iter()
            .flat_map(move |limit| limit.iter(&self.orders).map(|(_, order)| order.id))
    }

    /// Levels of `side`, best first
    pub fn levels(&self, side: Side) -> impl Iterator<Item = &Limit> + '_ {
        self.ladder(side).keys().map(move |key| &self.limits[key.0])
    }

    /// Copy the best `depth` levels of each side
    pub fn snapshot(&self, depth: usize) -> BookSnapshot {
        let view = |limit: &Limit| LevelView {
            price: limit.price,
            volume: limit.volume,
            order_count: limit.order_count,
        };
        BookSnapshot {
            timestamp_ns: self.current_time,
            bids: self.levels(Side::Bid).take(depth).map(view).collect(),
            asks: self.levels(Side::Ask).take(depth).map(view).collect(),
        }
    }

    /// Snapshot at the configured depth (20 levels by default)
    pub fn top_levels(&self) -> BookSnapshot {
        self.snapshot(self.snapshot_depth)
    }

    #[inline]
    pub fn bid_vol(&self) -> u64 {
        self.bid_vol
    }

    #[inline]
    pub fn ask_vol(&self) -> u64 {
        self.ask_vol
    }

    /// Imbalance from the last `calculate_imbalance`
    #[inline]
    pub fn imbalance(&self) -> f64 {
        self.imbalance
    }

    /// Skew from the last successful `calculate_skew`
    #[inline]
    pub fn skew(&self) -> f64 {
        self.skew
    }

    /// Volume-weighted average trade price, `None` before the first trade
    #[inline]
    pub fn vwap(&self) -> Option<f64> {
        self.vwap
    }

    /// Retained VOI values, oldest first
    pub fn voi_history(&self) -> &VecDeque<i64> {
        &self.voi_history
    }

    pub fn indexed_voi(&self, index: usize) -> Option<i64> {
        self.voi_history.get(index).copied()
    }

    /// Mid price recorded `index` observations ago (0 = most recent)
    pub fn indexed_mid_price(&self, index: usize) -> Option<i32> {
        let len = self.mid_prices.len();
        if index >= len {
            return None;
        }
        self.mid_prices.get(len - 1 - index).copied()
    }

    #[inline]
    pub fn messages_processed(&self) -> u64 {
        self.messages
    }

    /// Event time of the last processed message (ns since epoch)
    #[inline]
    pub fn current_time(&self) -> u64 {
        self.current_time
    }

    /// Book clock as `YYYY-MM-DD HH:MM:SS.mmm` (UTC)
    pub fn formatted_time(&self) -> String {
        format_timestamp(self.current_time).to_string()
    }

    // ========================================================================
    // State Verification
    // ========================================================================

    /// SHA-256 over the full resting state, best level first on each side.
    ///
    /// Two books that received the same event sequence produce the same root.
    pub fn state_root(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for side in [Side::Bid, Side::Ask] {
            for limit in self.levels(side) {
                hasher.update([side.to_u8()]);
                hasher.update(limit.price.to_le_bytes());
                hasher.update(limit.volume.to_le_bytes());
                hasher.update(limit.order_count.to_le_bytes());
                for (_, order) in limit.iter(&self.orders) {
                    hasher.update(order.id.to_le_bytes());
                    hasher.update(order.size.to_le_bytes());
                }
            }
        }
        hasher.finalize().into()
    }

    /// Full-scan audit of the book's structural invariants.
    ///
    /// Checks that every indexed order is linked exactly once into the level
    /// its back-reference names, that level aggregates match their members,
    /// that ladders, level index and level arena agree, and that the side
    /// counters match. Intended for tests and debugging.
    pub fn check_invariants(&self) -> Result<(), BookError> {
        let fail =
            |msg: String| -> Result<(), BookError> { Err(BookError::InvariantViolation(msg)) };

        let mut linked = 0usize;
        for side in [Side::Bid, Side::Ask] {
            let ladder = self.ladder(side);
            let mut last_price: Option<i32> = None;
            let mut side_orders = 0u64;

            for (price, key) in ladder.iter() {
                let Some(limit) = self.limits.get(key.0) else {
                    return fail(format!("ladder {side:?} {price} points to a free level"));
                };
                if limit.price != price || limit.side != side {
                    return fail(format!("level {price} {side:?} mislabelled"));
                }
                if self.limit_index.get(&(price, side)) != Some(&key) {
                    return fail(format!("level {price} {side:?} missing from level index"));
                }
                if limit.is_empty() {
                    return fail(format!("empty level {price} {side:?} left in ladder"));
                }
                if let Some(last) = last_price {
                    let ordered = match side {
                        Side::Bid => price < last,
                        Side::Ask => price > last,
                    };
                    if !ordered {
                        return fail(format!("{side:?} ladder out of order at {price}"));
                    }
                }
                last_price = Some(price);

                let mut volume = 0u64;
                let mut count = 0u32;
                let mut prev: Option<OrderHandle> = None;
                for (handle, order) in limit.iter(&self.orders) {
                    if order.level != Some(key) {
                        return fail(format!("order {} back-reference is stale", order.id));
                    }
                    if order.prev != prev {
                        return fail(format!("order {} prev link broken", order.id));
                    }
                    if order.price != price || order.side != side {
                        return fail(format!("order {} sits at the wrong level", order.id));
                    }
                    if self.order_index.get(&order.id) != Some(&handle) {
                        return fail(format!("order {} missing from id index", order.id));
                    }
                    volume += u64::from(order.size);
                    count += 1;
                    prev = Some(handle);
                }
                if limit.tail != prev {
                    return fail(format!("level {price} {side:?} tail mismatch"));
                }
                if volume != limit.volume || count != limit.order_count {
                    return fail(format!(
                        "level {price} {side:?} aggregates {}/{} but members sum to {volume}/{count}",
                        limit.volume, limit.order_count
                    ));
                }
                side_orders += u64::from(count);
                linked += count as usize;
            }

            let counter = match side {
                Side::Bid => self.bid_count,
                Side::Ask => self.ask_count,
            };
            if counter != side_orders {
                return fail(format!("{side:?} count {counter} but {side_orders} linked"));
            }
        }

        if linked != self.order_index.len() || linked != self.orders.len() {
            return fail(format!(
                "{linked} linked orders, {} indexed, {} pooled",
                self.order_index.len(),
                self.orders.len()
            ));
        }
        if self.limits.len() != self.bids.len() + self.asks.len()
            || self.limits.len() != self.limit_index.len()
        {
            return fail(format!(
                "{} levels allocated, {} in ladders, {} indexed",
                self.limits.len(),
                self.bids.len() + self.asks.len(),
                self.limit_index.len()
            ));
        }

        Ok(())
    }

    // ========================================================================
    // Reset
    // ========================================================================

    /// Drop all orders, levels, analytics and history, keeping allocations
    pub fn reset(&mut self) {
        self.orders.clear();
        self.limits.clear();
        self.bids.clear();
        self.asks.clear();
        self.limit_index.clear();
        self.order_index.clear();
        self.bid_count = 0;
        self.ask_count = 0;
        self.messages = 0;
        self.current_time = 0;
        self.price_volume_sum = 0;
        self.traded_volume = 0;
        self.vwap = None;
        self.bid_vol = 0;
        self.ask_vol = 0;
        self.imbalance = 0.0;
        self.skew = 0.0;
        self.prev_best_bid = None;
        self.prev_best_ask = None;
        self.voi_history.clear();
        self.mid_prices.clear();
    }

    // ========================================================================
    // Internal Helpers
    // ========================================================================

    #[inline]
    fn ladder(&self, side: Side) -> &Ladder {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    #[inline]
    fn ladder_mut(&mut self, side: Side) -> &mut Ladder {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    /// O(1) for known prices, O(log n) the first time a price is touched
    fn get_or_insert_limit(&mut self, side: Side, price: i32) -> LimitKey {
        if let Some(&key) = self.limit_index.get(&(price, side)) {
            return key;
        }

        let key = LimitKey(self.limits.insert(Limit::new(price, side)));
        self.ladder_mut(side).insert(price, key);
        self.limit_index.insert((price, side), key);
        trace!(price, ?side, "level created");
        key
    }

    /// Append to a level's tail and point the order back at it
    fn link(&mut self, level: LimitKey, handle: OrderHandle) {
        self.limits[level.0].append(handle, &mut self.orders);
        self.orders[handle].level = Some(level);
    }

    /// Unlink from the owning level, releasing the level if it empties
    fn detach(&mut self, handle: OrderHandle) {
        let Some(level) = self.orders[handle].level.take() else {
            return;
        };

        let limit = &mut self.limits[level.0];
        limit.unlink(handle, &mut self.orders);

        if limit.is_empty() {
            let limit = self.limits.remove(level.0);
            self.ladder_mut(limit.side).remove(limit.price);
            self.limit_index.remove(&(limit.price, limit.side));
            trace!(price = limit.price, side = ?limit.side, "level released");
        }
    }

    fn level_of(&self, handle: OrderHandle) -> LimitKey {
        self.orders[handle]
            .level
            .expect("resident order is linked to a level")
    }

    /// Return a detached order's slot to the pool
    fn take(&mut self, handle: OrderHandle) -> Order {
        self.orders
            .release(handle)
            .expect("resident order has a pool slot")
    }

    fn decrement_count(&mut self, side: Side) {
        match side {
            Side::Bid => self.bid_count -= 1,
            Side::Ask => self.ask_count -= 1,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
