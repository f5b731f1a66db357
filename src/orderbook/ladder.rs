//! One side of the book: price-ordered map of levels.
//!
//! Bids and asks differ only in which end of the price range is "best".
//! Instead of two map types, a `Ladder` keys its `BTreeMap` by a rank that
//! already sorts best-first: `-price` for bids, `price` for asks. Every
//! iteration over a ladder therefore starts at the top of book.
//!
//! The best entry is cached so top-of-book reads never touch the tree. It is
//! refreshed on insert and when the best level itself is removed.

use std::collections::BTreeMap;

use crate::orderbook::LimitKey;
use crate::types::Side;

/// Price-ordered levels of one side.
#[derive(Debug, Clone)]
pub struct Ladder {
    side: Side,
    levels: BTreeMap<i64, LimitKey>,
    best: Option<(i64, LimitKey)>,
}

impl Ladder {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
            best: None,
        }
    }

    /// Sort rank of `price` on this side (smaller = better)
    #[inline]
    fn rank(&self, price: i32) -> i64 {
        match self.side {
            Side::Bid => -i64::from(price),
            Side::Ask => i64::from(price),
        }
    }

    #[inline]
    fn price_of(&self, rank: i64) -> i32 {
        // Ranks are only ever produced from i32 prices
        match self.side {
            Side::Bid => (-rank) as i32,
            Side::Ask => rank as i32,
        }
    }

    pub fn insert(&mut self, price: i32, key: LimitKey) {
        let rank = self.rank(price);
        self.levels.insert(rank, key);
        if self.best.map_or(true, |(best, _)| rank <= best) {
            self.best = Some((rank, key));
        }
    }

    pub fn remove(&mut self, price: i32) -> Option<LimitKey> {
        let rank = self.rank(price);
        let removed = self.levels.remove(&rank)?;
        if matches!(self.best, Some((best, _)) if best == rank) {
            self.best = self.levels.first_key_value().map(|(&rank, &key)| (rank, key));
        }
        Some(removed)
    }

    /// Best price and its level
    #[inline]
    pub fn best(&self) -> Option<(i32, LimitKey)> {
        self.best.map(|(rank, key)| (self.price_of(rank), key))
    }

    /// Levels from best to worst
    pub fn iter(&self) -> impl Iterator<Item = (i32, LimitKey)> + '_ {
        self.levels
            .iter()
            .map(move |(&rank, &key)| (self.price_of(rank), key))
    }

    /// Level keys from best to worst
    pub fn keys(&self) -> impl Iterator<Item = LimitKey> + '_ {
        self.levels.values().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn clear(&mut self) {
        self.levels.clear();
        self.best = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices(ladder: &Ladder) -> Vec<i32> {
        ladder.iter().map(|(price, _)| price).collect()
    }

    #[test]
    fn test_bid_ladder_descending() {
        let mut ladder = Ladder::new(Side::Bid);
        ladder.insert(99, LimitKey(0));
        ladder.insert(101, LimitKey(1));
        ladder.insert(100, LimitKey(2));

        assert_eq!(prices(&ladder), vec![101, 100, 99]);
        assert_eq!(ladder.best(), Some((101, LimitKey(1))));
    }

    #[test]
    fn test_ask_ladder_ascending() {
        let mut ladder = Ladder::new(Side::Ask);
        ladder.insert(-5, LimitKey(0));
        ladder.insert(3, LimitKey(1));
        ladder.insert(-10, LimitKey(2));

        assert_eq!(prices(&ladder), vec![-10, -5, 3]);
        assert_eq!(ladder.best(), Some((-10, LimitKey(2))));
    }

    #[test]
    fn test_extreme_prices() {
        let mut bids = Ladder::new(Side::Bid);
        bids.insert(i32::MIN, LimitKey(0));
        bids.insert(i32::MAX, LimitKey(1));

        assert_eq!(prices(&bids), vec![i32::MAX, i32::MIN]);
        assert_eq!(bids.remove(i32::MIN), Some(LimitKey(0)));
        assert_eq!(bids.len(), 1);
    }

    #[test]
    fn test_best_follows_removals() {
        let mut asks = Ladder::new(Side::Ask);
        asks.insert(105, LimitKey(0));
        asks.insert(101, LimitKey(1));
        asks.insert(103, LimitKey(2));
        assert_eq!(asks.best(), Some((101, LimitKey(1))));

        // Removing a non-best level keeps the cached best
        assert_eq!(asks.remove(105), Some(LimitKey(0)));
        assert_eq!(asks.best(), Some((101, LimitKey(1))));

        assert_eq!(asks.remove(101), Some(LimitKey(1)));
        assert_eq!(asks.best(), Some((103, LimitKey(2))));

        assert!(asks.remove(101).is_none());
        assert_eq!(asks.remove(103), Some(LimitKey(2)));
        assert!(asks.best().is_none());

        asks.insert(110, LimitKey(3));
        assert_eq!(asks.best(), Some((110, LimitKey(3))));
        asks.clear();
        assert!(asks.best().is_none());
    }

    #[test]
    fn test_empty_ladder_has_no_best() {
        let ladder = Ladder::new(Side::Ask);
        assert!(ladder.is_empty());
        assert!(ladder.best().is_none());
    }
}
