//! Market Data Service
//!
//! Folds the terminal's fragmented market-data callbacks into coherent
//! snapshots and fans them out to live subscribers:
//! - Top-of-book tick snapshot, readiness-gated and deduplicated per 100ms bucket
//! - Five-level depth book, readiness-gated and deduplicated per 100ms bucket
//! - Real-time candle bars, replaced and published on every update
//!
//! # Architecture
//!
//! ```text
//!  tick field   depth slot   realtime bar
//!      │            │             │
//!  ┌───▼───┐    ┌───▼───┐    ┌────▼────┐
//!  │ Tick  │    │ Depth │    │ Candles │
//!  └───┬───┘    └───┬───┘    └────┬────┘
//!      │  gate      │  gate       │
//!  ┌───▼────────────▼─────────────▼───┐
//!  │  Register (one per topic)        │
//!  └──────────────────────────────────┘
//! ```
//!
//! Everything here runs on the caller's timeline; nothing blocks and
//! nothing locks.

pub mod aggregator;
pub mod candles;
pub mod depth;
pub mod gate;
pub mod register;
pub mod tick;

pub use aggregator::MarketDataAggregator;
pub use register::{DeliveryError, Register, Subscriber, SubscriberId, Topic};

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";

/// Result of feeding one update into a stream.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome<T> {
    /// Update was not applicable to the stream and left no trace.
    Ignored,
    /// Update was folded into the snapshot without publishing.
    Absorbed,
    /// Update was folded in and this snapshot should be published.
    Publish(T),
}

impl<T> IngestOutcome<T> {
    /// Whether the update changed the stream's state.
    pub fn is_applied(&self) -> bool {
        !matches!(self, IngestOutcome::Ignored)
    }

    pub fn into_publish(self) -> Option<T> {
        match self {
            IngestOutcome::Publish(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}
