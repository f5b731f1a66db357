//! Fixed-size trading log record and its two text renderings.

use std::fmt;

use chrono::DateTime;

/// First line of every trading log file
pub const CSV_HEADER: &str = "timestamp,bid,ask,position,trade_count,pnl\n";

/// Render nanoseconds since epoch as `YYYY-MM-DD HH:MM:SS.mmm` (UTC)
pub fn format_timestamp(timestamp_ns: u64) -> impl fmt::Display {
    let nanos = i64::try_from(timestamp_ns).unwrap_or(i64::MAX);
    DateTime::from_timestamp_nanos(nanos).format("%Y-%m-%d %H:%M:%S%.3f")
}

/// One strategy observation.
///
/// `Copy` and heap-free so it can sit in a queue slot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LogRecord {
    /// Book event time (ns since epoch)
    pub timestamp_ns: u64,
    pub bid: i32,
    pub ask: i32,
    pub position: i64,
    pub trade_count: u64,
    pub pnl: f64,
}

impl LogRecord {
    pub fn new(
        timestamp_ns: u64,
        bid: i32,
        ask: i32,
        position: i64,
        trade_count: u64,
        pnl: f64,
    ) -> Self {
        Self {
            timestamp_ns,
            bid,
            ask,
            position,
            trade_count,
            pnl,
        }
    }

    /// CSV row matching [`CSV_HEADER`], newline included
    pub fn csv(&self) -> CsvLine<'_> {
        CsvLine(self)
    }

    /// `trading_log` line-protocol record, newline included
    pub fn line_protocol(&self) -> LineProtocol<'_> {
        LineProtocol(self)
    }
}

pub struct CsvLine<'a>(&'a LogRecord);

impl fmt::Display for CsvLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        writeln!(
            f,
            "{},{},{},{},{},{:.6}",
            format_timestamp(r.timestamp_ns),
            r.bid,
            r.ask,
            r.position,
            r.trade_count,
            r.pnl
        )
    }
}

pub struct LineProtocol<'a>(&'a LogRecord);

impl fmt::Display for LineProtocol<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        writeln!(
            f,
            "trading_log bid={}i,ask={}i,position={}i,trade_count={}i,pnl={:.6} {}",
            r.bid, r.ask, r.position, r.trade_count, r.pnl, r.timestamp_ns
        )
    }
}
