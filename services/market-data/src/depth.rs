//! Five-level depth stream
//!
//! Every depth update addresses a (side, position) slot and overwrites
//! it, whatever its operation code. The book is ready once all ten slots
//! have been written at least once; after that it follows the same
//! bucket rule as the tick stream, with its own bucket state.

use tracing::{debug, warn};
use types::market::{DepthBook, DepthLevel, DepthOperation, DepthSide, DEPTH_LEVELS};

use crate::gate::PublishGate;
use crate::IngestOutcome;

/// Raw depth update as delivered by the terminal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthUpdate {
    pub position: i32,
    pub operation: i32,
    pub side: i32,
    pub price: f64,
    pub size: f64,
}

#[derive(Debug, Clone)]
pub struct DepthStream {
    book: DepthBook,
    gate: PublishGate,
}

impl DepthStream {
    pub fn new(bucket_ms: i64) -> Self {
        Self {
            book: DepthBook::default(),
            gate: PublishGate::new(bucket_ms),
        }
    }

    /// Apply one slot update.
    pub fn ingest(&mut self, update: DepthUpdate, now_ms: i64) -> IngestOutcome<DepthBook> {
        let Some(side) = DepthSide::from_code(update.side) else {
            warn!(side = update.side, "Depth update with unknown side");
            return IngestOutcome::Ignored;
        };
        let position = match usize::try_from(update.position) {
            Ok(p) if p < DEPTH_LEVELS => p,
            _ => {
                warn!(position = update.position, "Depth update outside book");
                return IngestOutcome::Ignored;
            }
        };
        if DepthOperation::from_code(update.operation).is_none() {
            debug!(operation = update.operation, "Unknown depth operation, applying as overwrite");
        }

        self.book.set_level(
            side,
            position,
            DepthLevel {
                price: update.price,
                size: update.size,
            },
        );

        if !self.gate.is_ready() {
            if self.book.is_full() {
                self.gate.mark_ready();
                debug!("Depth book ready");
            }
            return IngestOutcome::Absorbed;
        }

        self.book.timestamp = now_ms;
        if self.gate.admit(now_ms) {
            IngestOutcome::Publish(self.book.clone())
        } else {
            IngestOutcome::Absorbed
        }
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    pub fn book(&self) -> &DepthBook {
        &self.book
    }

    pub fn reset(&mut self) {
        self.book = DepthBook::default();
        self.gate.reset();
    }
}
