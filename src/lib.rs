//! # tickbook
//!
//! Price-time priority limit order book for replaying market data, with
//! a lock-free asynchronous trading log.
//!
//! ## Architecture
//!
//! - **Types**: feed messages and resting order records
//! - **OrderBook**: slab-backed book with O(1) cancel and cached analytics
//! - **Queue**: wait-free SPSC ring buffer
//! - **Logging**: per-sink worker threads draining SPSC queues into a
//!   memory-mapped CSV file, stdout and an optional line sink
//!
//! ## Design Principles
//!
//! 1. **Determinism**: the same event sequence produces the same book and
//!    the same state root
//! 2. **Integer Prices**: book mutations never touch floating point
//! 3. **Pre-allocated Memory**: orders and levels live in slab arenas
//! 4. **Single-threaded Book**: the only cross-thread traffic is the log queue
//!
//! ## Example
//!
//! ```
//! use tickbook::{Message, Orderbook, Side};
//!
//! let mut book = Orderbook::with_capacity(1_000);
//! book.process_msg(&Message::add(1, 100, 10, Side::Bid, 0)).unwrap();
//! book.process_msg(&Message::add(2, 101, 10, Side::Ask, 0)).unwrap();
//!
//! book.calculate_vols();
//! assert_eq!(book.calculate_imbalance(), 0.0);
//! ```

// ============================================================================
// Module declarations
// ============================================================================

/// Core data types: Message, Order, Side
pub mod types;

/// Order book: pool, levels, ladders and the book itself
pub mod orderbook;

/// Lock-free SPSC queue
pub mod queue;

/// Asynchronous trading log
pub mod logging;

/// TOML configuration
pub mod config;

/// Error types
pub mod error;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use config::{BookConfig, EngineConfig, LoggerConfig};
pub use error::{BookError, ConfigError, LoggerError};
pub use logging::{AsyncLogger, LogRecord};
pub use orderbook::{BookSnapshot, ModifyOutcome, Orderbook, TradeSummary};
pub use queue::LockFreeQueue;
pub use types::{Action, Message, Order, Side};
