//! Top-of-book snapshots and their line-protocol rendering.
//!
//! A snapshot copies the best N levels per side out of the book so that it
//! can be handed to another thread (time-series forwarder, viewers) without
//! borrowing the book.
//!
//! ## Line Protocol
//!
//! One record per level:
//!
//! ```text
//! limit_orderbook price=10025i,volume=300i,side=true 1700000000000000000
//! ```

use std::fmt;

/// Aggregates of one price level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelView {
    pub price: i32,
    pub volume: u64,
    pub order_count: u32,
}

/// Best-first copy of the top levels of both sides
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookSnapshot {
    /// Book event time (ns since epoch) when the snapshot was taken
    pub timestamp_ns: u64,
    pub bids: Vec<LevelView>,
    pub asks: Vec<LevelView>,
}

impl BookSnapshot {
    /// Line-protocol records for every level, bids first.
    pub fn to_line_protocol(&self) -> String {
        self.records().map(|record| format!("{record}\n")).collect()
    }

    /// Iterate the rendered records one line at a time (without the newline)
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.records().map(|record| record.to_string())
    }

    fn records(&self) -> impl Iterator<Item = LevelRecord> + '_ {
        let bids = self.bids.iter().map(|level| (true, level));
        let asks = self.asks.iter().map(|level| (false, level));
        bids.chain(asks).map(move |(is_bid, level)| LevelRecord {
            level: *level,
            is_bid,
            timestamp_ns: self.timestamp_ns,
        })
    }
}

struct LevelRecord {
    level: LevelView,
    is_bid: bool,
    timestamp_ns: u64,
}

impl fmt::Display for LevelRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "limit_orderbook price={}i,volume={}i,side={} {}",
            self.level.price, self.level.volume, self.is_bid, self.timestamp_ns
        )
    }
}
