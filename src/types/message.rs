//! Inbound book event as delivered by the feed parser.

use std::fmt;

use crate::types::Side;

/// Book event action.
///
/// Feeds encode actions as single ASCII codes: `A`dd, `C`ancel,
/// `M`odify, `T`rade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Add,
    Cancel,
    Modify,
    Trade,
}

impl Action {
    /// Decode a feed action code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'A' => Some(Action::Add),
            b'C' => Some(Action::Cancel),
            b'M' => Some(Action::Modify),
            b'T' => Some(Action::Trade),
            _ => None,
        }
    }

    /// Feed action code
    pub fn code(self) -> u8 {
        match self {
            Action::Add => b'A',
            Action::Cancel => b'C',
            Action::Modify => b'M',
            Action::Trade => b'T',
        }
    }
}

impl TryFrom<char> for Action {
    type Error = char;

    fn try_from(code: char) -> Result<Self, Self::Error> {
        u8::try_from(code)
            .ok()
            .and_then(Action::from_code)
            .ok_or(code)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code() as char)
    }
}

/// One order-book event.
///
/// `time` is nanoseconds since the Unix epoch and `price` is in integer ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub id: u64,
    pub time: u64,
    pub size: u32,
    pub price: i32,
    pub action: Action,
    pub side: Side,
}

impl Message {
    pub fn new(id: u64, time: u64, size: u32, price: i32, action: Action, side: Side) -> Self {
        Self {
            id,
            time,
            size,
            price,
            action,
            side,
        }
    }

    pub fn add(id: u64, price: i32, size: u32, side: Side, time: u64) -> Self {
        Self::new(id, time, size, price, Action::Add, side)
    }

    pub fn cancel(id: u64, price: i32, size: u32, side: Side, time: u64) -> Self {
        Self::new(id, time, size, price, Action::Cancel, side)
    }

    pub fn modify(id: u64, price: i32, size: u32, side: Side, time: u64) -> Self {
        Self::new(id, time, size, price, Action::Modify, side)
    }

    /// `side` is the aggressor
    pub fn trade(id: u64, price: i32, size: u32, side: Side, time: u64) -> Self {
        Self::new(id, time, size, price, Action::Trade, side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_codes() {
        for action in [Action::Add, Action::Cancel, Action::Modify, Action::Trade] {
            assert_eq!(Action::from_code(action.code()), Some(action));
        }
        assert_eq!(Action::from_code(b'R'), None);
    }

    #[test]
    fn test_action_try_from_char() {
        assert_eq!(Action::try_from('M'), Ok(Action::Modify));
        assert_eq!(Action::try_from('x'), Err('x'));
        assert_eq!(Action::try_from('é'), Err('é'));
    }

    #[test]
    fn test_message_constructors() {
        let msg = Message::trade(9, 101, 3, Side::Bid, 42);
        assert_eq!(msg.action, Action::Trade);
        assert_eq!(msg.side, Side::Bid);
        assert_eq!(msg.action.to_string(), "T");
    }
}
