//! Core data types for the book engine
//!
//! ## Types
//!
//! - [`Order`]: A resting order with intrusive queue links
//! - [`Side`]: Bid or Ask
//! - [`Message`]: An inbound add/cancel/modify/trade event
//! - [`Action`]: The event kind
//!
//! ## Integer Ticks
//!
//! Prices are `i32` ticks and sizes are `u32` lots. Nothing on the book's
//! mutation path touches floating point; only derived analytics do.

mod message;
mod order;

// Re-export all types at module level
pub use message::{Action, Message};
pub use order::{Order, Side};
