//! Market data aggregator
//!
//! Owns the three streams and their fan-out registers. Each `ingest_*`
//! folds one update, publishes when the stream says so and returns the
//! published snapshot. Published values are shared behind `Arc` and
//! never mutated afterwards.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use types::market::{CandleBar, DepthBook, TickSnapshot};

use crate::candles::CandleStream;
use crate::depth::{DepthStream, DepthUpdate};
use crate::gate::DEFAULT_BUCKET_MS;
use crate::register::{Register, Topic};
use crate::tick::TickStream;
use crate::IngestOutcome;

/// Aggregator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Publish bucket width for tick and depth, in milliseconds
    pub bucket_ms: i64,
    /// Clear tick/depth readiness when the upstream session reconnects
    pub reset_on_reconnect: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            bucket_ms: DEFAULT_BUCKET_MS,
            reset_on_reconnect: false,
        }
    }
}

#[derive(Debug)]
pub struct MarketDataAggregator {
    config: AggregatorConfig,
    tick: TickStream,
    depth: DepthStream,
    candles: CandleStream,
    trades_topic: Register<TickSnapshot>,
    depth_topic: Register<DepthBook>,
    candle_topic: Register<CandleBar>,
    last_activity_ms: i64,
}

impl MarketDataAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            tick: TickStream::new(config.bucket_ms),
            depth: DepthStream::new(config.bucket_ms),
            candles: CandleStream::new(),
            trades_topic: Register::new(Topic::Trade),
            depth_topic: Register::new(Topic::Depth),
            candle_topic: Register::new(Topic::Candle),
            last_activity_ms: 0,
            config,
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Fold a tick price/size field.
    pub fn ingest_tick(
        &mut self,
        tick_type: i32,
        price: Option<f64>,
        size: Option<f64>,
        now_ms: i64,
    ) -> Option<Arc<TickSnapshot>> {
        let outcome = self.tick.ingest(tick_type, price, size, now_ms);
        if outcome.is_applied() {
            self.last_activity_ms = now_ms;
        }
        publish(&mut self.trades_topic, outcome)
    }

    /// Overwrite a depth slot.
    pub fn ingest_depth(&mut self, update: DepthUpdate, now_ms: i64) -> Option<Arc<DepthBook>> {
        let outcome = self.depth.ingest(update, now_ms);
        if outcome.is_applied() {
            self.last_activity_ms = now_ms;
        }
        publish(&mut self.depth_topic, outcome)
    }

    /// Replace the candle bar. Does not count as upstream activity.
    pub fn ingest_candle(&mut self, bar: CandleBar) -> Option<Arc<CandleBar>> {
        let outcome = self.candles.ingest(bar);
        publish(&mut self.candle_topic, outcome)
    }

    /// Last time a tick or depth update was applied, Unix milliseconds.
    pub fn last_activity_ms(&self) -> i64 {
        self.last_activity_ms
    }

    /// Treat `now_ms` as fresh activity.
    pub fn touch(&mut self, now_ms: i64) {
        self.last_activity_ms = now_ms;
    }

    /// Hook for a completed reconnect.
    pub fn on_reconnect(&mut self) {
        if self.config.reset_on_reconnect {
            self.reset();
        }
    }

    /// Drop all snapshot and readiness state. Subscribers stay registered.
    pub fn reset(&mut self) {
        self.tick.reset();
        self.depth.reset();
        self.candles.reset();
        info!("Market data snapshots reset");
    }

    pub fn tick_stream(&self) -> &TickStream {
        &self.tick
    }

    pub fn depth_stream(&self) -> &DepthStream {
        &self.depth
    }

    pub fn candle_stream(&self) -> &CandleStream {
        &self.candles
    }

    pub fn trades_topic(&mut self) -> &mut Register<TickSnapshot> {
        &mut self.trades_topic
    }

    pub fn depth_topic(&mut self) -> &mut Register<DepthBook> {
        &mut self.depth_topic
    }

    pub fn candle_topic(&mut self) -> &mut Register<CandleBar> {
        &mut self.candle_topic
    }
}

impl Default for MarketDataAggregator {
    fn default() -> Self {
        Self::new(AggregatorConfig::default())
    }
}

fn publish<T>(register: &mut Register<T>, outcome: IngestOutcome<T>) -> Option<Arc<T>> {
    let snapshot = Arc::new(outcome.into_publish()?);
    let report = register.publish(Arc::clone(&snapshot));
    debug!(
        topic = %register.topic(),
        delivered = report.delivered,
        failed = report.failed,
        "Snapshot published"
    );
    Some(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_tracks_applied_updates() {
        let mut agg = MarketDataAggregator::default();
        agg.ingest_tick(4, Some(1.0), Some(1.0), 500);
        assert_eq!(agg.last_activity_ms(), 0);

        agg.ingest_tick(1, Some(1.0), None, 700);
        assert_eq!(agg.last_activity_ms(), 700);

        agg.ingest_candle(CandleBar::default());
        assert_eq!(agg.last_activity_ms(), 700);
    }

    #[test]
    fn test_on_reconnect_respects_config() {
        let mut agg = MarketDataAggregator::default();
        agg.ingest_tick(1, Some(1.0), Some(2.0), 0);
        agg.on_reconnect();
        assert!(agg.tick_stream().is_ready());

        let mut agg = MarketDataAggregator::new(AggregatorConfig {
            reset_on_reconnect: true,
            ..Default::default()
        });
        agg.ingest_tick(1, Some(1.0), Some(2.0), 0);
        agg.on_reconnect();
        assert!(!agg.tick_stream().is_ready());
    }
}
