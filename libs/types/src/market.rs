//! Market data snapshot types
//!
//! These are the values published on the trade, depth and candle topics.
//! A published snapshot is a complete value; subscribers never see a
//! partially applied update.

use serde::{Deserialize, Serialize};

/// Number of price levels kept per side of the depth book
pub const DEPTH_LEVELS: usize = 5;

/// Side of a tick update, derived from the terminal's tick type code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TickSide {
    Bid,
    Ask,
    Last,
    High,
    Low,
    Volume,
    PreClose,
}

impl TickSide {
    /// Map a tick type code to a side.
    ///
    /// Codes 0-1 are bid size/price, 2-3 ask price/size, 4-5 last
    /// price/size, then high, low, volume and previous close.
    pub fn from_tick_type(code: i32) -> Option<Self> {
        match code {
            0 | 1 => Some(TickSide::Bid),
            2 | 3 => Some(TickSide::Ask),
            4 | 5 => Some(TickSide::Last),
            6 => Some(TickSide::High),
            7 => Some(TickSide::Low),
            8 => Some(TickSide::Volume),
            9 => Some(TickSide::PreClose),
            _ => None,
        }
    }

    /// Top-of-book sides, the only ones folded into the trade snapshot.
    pub fn is_quote(&self) -> bool {
        matches!(self, TickSide::Bid | TickSide::Ask)
    }
}

/// Running top-of-book snapshot built from tick field updates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickSnapshot {
    pub side: Option<TickSide>,
    pub price: Option<f64>,
    pub size: Option<f64>,
    /// Unix milliseconds of the last update after readiness
    #[serde(rename = "ts")]
    pub timestamp: i64,
}

impl TickSnapshot {
    /// Whether side, price and size have all been observed.
    pub fn is_complete(&self) -> bool {
        self.side.is_some() && self.price.is_some() && self.size.is_some()
    }
}

/// Side of a depth update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepthSide {
    Ask,
    Bid,
}

impl DepthSide {
    /// 0 is ask, 1 is bid.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(DepthSide::Ask),
            1 => Some(DepthSide::Bid),
            _ => None,
        }
    }
}

/// Operation carried by a depth update.
///
/// The book applies every operation as an overwrite of the addressed slot;
/// the operation is kept for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepthOperation {
    Insert,
    Update,
    Delete,
}

impl DepthOperation {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(DepthOperation::Insert),
            1 => Some(DepthOperation::Update),
            2 => Some(DepthOperation::Delete),
            _ => None,
        }
    }
}

/// A single (price, size) level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: f64,
    pub size: f64,
}

/// Fixed five-level depth book, slots addressed by position
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthBook {
    pub asks: [Option<DepthLevel>; DEPTH_LEVELS],
    pub bids: [Option<DepthLevel>; DEPTH_LEVELS],
    /// Unix milliseconds of the last update after readiness
    #[serde(rename = "ts")]
    pub timestamp: i64,
}

impl DepthBook {
    /// Overwrite the slot at `position` on `side`.
    ///
    /// Returns false if the position is outside the book.
    pub fn set_level(&mut self, side: DepthSide, position: usize, level: DepthLevel) -> bool {
        let slots = match side {
            DepthSide::Ask => &mut self.asks,
            DepthSide::Bid => &mut self.bids,
        };
        match slots.get_mut(position) {
            Some(slot) => {
                *slot = Some(level);
                true
            }
            None => false,
        }
    }

    /// Number of slots written at least once.
    pub fn filled_slots(&self) -> usize {
        self.asks.iter().chain(self.bids.iter()).filter(|s| s.is_some()).count()
    }

    /// Whether every slot on both sides holds a level.
    pub fn is_full(&self) -> bool {
        self.filled_slots() == DEPTH_LEVELS * 2
    }
}

/// Real-time bar as reported by the terminal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandleBar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Volume-weighted average price
    pub wap: f64,
    /// Bar start, Unix seconds
    #[serde(rename = "ts")]
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_side_table() {
        assert_eq!(TickSide::from_tick_type(0), Some(TickSide::Bid));
        assert_eq!(TickSide::from_tick_type(1), Some(TickSide::Bid));
        assert_eq!(TickSide::from_tick_type(2), Some(TickSide::Ask));
        assert_eq!(TickSide::from_tick_type(3), Some(TickSide::Ask));
        assert_eq!(TickSide::from_tick_type(4), Some(TickSide::Last));
        assert_eq!(TickSide::from_tick_type(9), Some(TickSide::PreClose));
        assert_eq!(TickSide::from_tick_type(10), None);
        assert!(!TickSide::Last.is_quote());
    }

    #[test]
    fn test_tick_side_serialization() {
        let json = serde_json::to_string(&TickSide::PreClose).unwrap();
        assert_eq!(json, "\"pre-close\"");
    }

    #[test]
    fn test_depth_set_level_bounds() {
        let mut book = DepthBook::default();
        let level = DepthLevel { price: 1.17, size: 7.0 };
        assert!(book.set_level(DepthSide::Ask, 4, level));
        assert!(!book.set_level(DepthSide::Bid, 5, level));
        assert_eq!(book.filled_slots(), 1);
    }

    #[test]
    fn test_depth_full() {
        let mut book = DepthBook::default();
        for pos in 0..DEPTH_LEVELS {
            book.set_level(DepthSide::Ask, pos, DepthLevel { price: 2.0, size: 1.0 });
            book.set_level(DepthSide::Bid, pos, DepthLevel { price: 1.0, size: 1.0 });
        }
        assert!(book.is_full());
    }

    #[test]
    fn test_depth_codes() {
        assert_eq!(DepthSide::from_code(0), Some(DepthSide::Ask));
        assert_eq!(DepthSide::from_code(1), Some(DepthSide::Bid));
        assert_eq!(DepthSide::from_code(2), None);
        assert_eq!(DepthOperation::from_code(2), Some(DepthOperation::Delete));
        assert_eq!(DepthOperation::from_code(3), None);
    }
}
