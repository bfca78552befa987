//! Top-of-book tick stream
//!
//! The terminal reports a quote as separate price and size callbacks
//! keyed by a tick type code. Only quote sides (bid/ask, codes 0-3) are
//! folded; a price or size is taken only when present and non-zero.
//! Spread instruments quote negative prices, so the sign is kept.
//!
//! The snapshot becomes ready the first time side, price and size have
//! all been observed. The update that completes it does not publish;
//! every later update stamps the snapshot and publishes once per bucket.

use tracing::{debug, trace};
use types::market::{TickSide, TickSnapshot};

use crate::gate::PublishGate;
use crate::IngestOutcome;

#[derive(Debug, Clone)]
pub struct TickStream {
    snapshot: TickSnapshot,
    gate: PublishGate,
}

impl TickStream {
    pub fn new(bucket_ms: i64) -> Self {
        Self {
            snapshot: TickSnapshot::default(),
            gate: PublishGate::new(bucket_ms),
        }
    }

    /// Fold one tick field update.
    pub fn ingest(
        &mut self,
        tick_type: i32,
        price: Option<f64>,
        size: Option<f64>,
        now_ms: i64,
    ) -> IngestOutcome<TickSnapshot> {
        let side = match TickSide::from_tick_type(tick_type) {
            Some(side) if side.is_quote() => side,
            _ => {
                trace!(tick_type, "Ignoring non-quote tick");
                return IngestOutcome::Ignored;
            }
        };

        self.snapshot.side = Some(side);
        if let Some(p) = price.filter(|p| *p != 0.0) {
            self.snapshot.price = Some(p);
        }
        if let Some(s) = size.filter(|s| *s != 0.0) {
            self.snapshot.size = Some(s);
        }

        if !self.gate.is_ready() {
            if self.snapshot.is_complete() {
                self.gate.mark_ready();
                debug!(tick_type, "Tick snapshot ready");
            }
            return IngestOutcome::Absorbed;
        }

        self.snapshot.timestamp = now_ms;
        if self.gate.admit(now_ms) {
            IngestOutcome::Publish(self.snapshot.clone())
        } else {
            IngestOutcome::Absorbed
        }
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    pub fn snapshot(&self) -> &TickSnapshot {
        &self.snapshot
    }

    pub fn reset(&mut self) {
        self.snapshot = TickSnapshot::default();
        self.gate.reset();
    }
}
