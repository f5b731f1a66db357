//! Error types.

use std::io;

use thiserror::Error;

use crate::types::Side;

/// Errors raised while applying book events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookError {
    /// Add for an id that is still resident
    #[error("order {id} is already resting in the book")]
    DuplicateOrder { id: u64 },

    /// Cancel for an id that is not resident
    #[error("order {id} is not in the book")]
    UnknownOrder { id: u64 },

    /// Modify attempting to move an order to the other side of the book
    #[error("order {id} rests on the {resident:?} side, modify requested {requested:?}")]
    SideMismatch {
        id: u64,
        resident: Side,
        requested: Side,
    },

    #[error("book invariant violated: {0}")]
    InvariantViolation(String),
}

impl BookError {
    /// Fatal errors mean the feed or the book can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BookError::SideMismatch { .. } | BookError::InvariantViolation(_)
        )
    }
}

/// Errors raised by the async logger.
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("log I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("failed to spawn {sink} log worker: {source}")]
    WorkerSpawn {
        sink: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{sink} log worker panicked")]
    WorkerPanicked { sink: &'static str },
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
