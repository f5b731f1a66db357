//! Order book for the replay engine.
//!
//! ## Architecture
//!
//! - **Slab-based storage**: orders and price levels live in arenas and are
//!   referenced by handle, never by pointer
//! - **Ladders**: one price-ordered map per side, best level first
//! - **Price-time priority**: FIFO queue at each price level
//!
//! ## Components
//!
//! - [`OrderPool`]: arena of [`Order`](crate::types::Order) records
//! - [`Limit`]: FIFO queue and aggregates of one price level
//! - [`Ladder`]: price → level map for one side
//! - [`Orderbook`]: event-driven book plus analytics
//! - [`BookSnapshot`]: top-of-book copy with line-protocol rendering
//!
//! ## Performance
//!
//! | Operation | Complexity |
//! |-----------|------------|
//! | Add order, known price | O(1) |
//! | Add order, new price | O(log n) |
//! | Cancel by id | O(1) + O(log n) if the level empties |
//! | Best bid/ask | O(log n) |
//! | Trade | O(k) orders consumed |
//! | `calculate_vols` | O(depth) |

pub mod book;
pub mod ladder;
pub mod level;
pub mod pool;
pub mod snapshot;

pub use book::{Applied, ModifyOutcome, Orderbook, TradeSummary};
pub use ladder::Ladder;
pub use level::{LevelIter, Limit, LimitKey};
pub use pool::{OrderHandle, OrderPool};
pub use snapshot::{BookSnapshot, LevelView};
