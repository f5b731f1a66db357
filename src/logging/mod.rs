//! Trading log pipeline.
//!
//! - [`LogRecord`]: fixed-size record queued on the hot path
//! - [`MmapLog`]: growable memory-mapped CSV file
//! - [`LineSink`]: destination for forwarded line-protocol records
//! - [`AsyncLogger`]: per-sink SPSC queues drained by worker threads
//!
//! This is the domain log. Diagnostics go through `tracing`.

mod logger;
mod mmap;
mod record;
mod sink;

pub use logger::{AsyncLogger, LoggerStats, QUEUE_SLOTS};
pub use mmap::MmapLog;
pub use record::{format_timestamp, CsvLine, LineProtocol, LogRecord, CSV_HEADER};
pub use sink::{LineSink, TcpLineSink};
