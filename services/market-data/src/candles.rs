//! Real-time candle stream
//!
//! Bars arrive already rate-limited (one per five seconds), so there is
//! no readiness gate and no dedup: each bar replaces the snapshot and is
//! published.

use tracing::warn;
use types::market::CandleBar;

use crate::IngestOutcome;

#[derive(Debug, Clone, Default)]
pub struct CandleStream {
    current: Option<CandleBar>,
}

impl CandleStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, bar: CandleBar) -> IngestOutcome<CandleBar> {
        if !is_consistent(&bar) {
            // Published anyway; the terminal is the source of truth for bars.
            warn!(
                ts = bar.timestamp,
                open = bar.open,
                high = bar.high,
                low = bar.low,
                close = bar.close,
                "Candle bar fails OHLC consistency"
            );
        }
        self.current = Some(bar.clone());
        IngestOutcome::Publish(bar)
    }

    pub fn current(&self) -> Option<&CandleBar> {
        self.current.as_ref()
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

/// high >= max(open, close) and low <= min(open, close)
fn is_consistent(bar: &CandleBar) -> bool {
    bar.high >= bar.open.max(bar.close) && bar.low <= bar.open.min(bar.close) && bar.volume >= 0.0
}
