//! Aggregation behaviour tests for the Market Data Service
//!
//! Tests include:
//! - Tick readiness over arbitrary field sequences
//! - Depth readiness on the tenth distinct slot
//! - One publish per bucket for repeated depth writes
//! - Subscriber isolation during publish
//! - Copy-on-publish of delivered snapshots

use std::sync::{Arc, Mutex};

use market_data::aggregator::MarketDataAggregator;
use market_data::depth::DepthUpdate;
use market_data::register::{channel_subscriber, DeliveryError};
use proptest::prelude::*;
use types::market::{DepthBook, TickSnapshot, DEPTH_LEVELS};

fn slot(side: i32, position: i32, price: f64) -> DepthUpdate {
    DepthUpdate {
        position,
        operation: 0,
        side,
        price,
        size: 1.0,
    }
}

fn fill_book(agg: &mut MarketDataAggregator, now_ms: i64) {
    for pos in 0..DEPTH_LEVELS as i32 {
        agg.ingest_depth(slot(0, pos, 2.0 + pos as f64), now_ms);
        agg.ingest_depth(slot(1, pos, 1.0 - pos as f64 * 0.1), now_ms);
    }
}

#[test]
fn test_depth_ready_exactly_on_tenth_slot() {
    let mut agg = MarketDataAggregator::default();
    let writes: Vec<DepthUpdate> = (0..DEPTH_LEVELS as i32)
        .flat_map(|p| [slot(1, p, 1.0), slot(0, p, 2.0)])
        .collect();

    for (i, update) in writes.iter().enumerate() {
        let published = agg.ingest_depth(*update, 1_000 + i as i64);
        assert!(published.is_none(), "publish before readiness at write {}", i + 1);
        assert_eq!(agg.depth_stream().is_ready(), i == writes.len() - 1);
    }
}

#[test]
fn test_depth_subscribers_receive_one_book_per_bucket() {
    let mut agg = MarketDataAggregator::default();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Arc<DepthBook>>();
    agg.depth_topic().register(channel_subscriber(tx));

    fill_book(&mut agg, 0);
    agg.ingest_depth(slot(0, 0, 2.5), 10_000);
    agg.ingest_depth(slot(0, 0, 2.6), 10_030);
    agg.ingest_depth(slot(0, 0, 2.7), 10_130);

    let first = rx.try_recv().unwrap();
    assert_eq!(first.asks[0].unwrap().price, 2.5);
    assert_eq!(first.timestamp, 10_000);
    let second = rx.try_recv().unwrap();
    assert_eq!(second.asks[0].unwrap().price, 2.7);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_publish_survives_failing_subscriber() {
    let mut agg = MarketDataAggregator::default();
    let seen = Arc::new(Mutex::new(Vec::<f64>::new()));

    agg.trades_topic()
        .register(|_: Arc<TickSnapshot>| -> Result<(), DeliveryError> { panic!("bad client") });
    agg.trades_topic()
        .register(|_: Arc<TickSnapshot>| -> Result<(), DeliveryError> { Err(DeliveryError::Closed) });
    {
        let seen = seen.clone();
        agg.trades_topic().register(move |snap: Arc<TickSnapshot>| -> Result<(), DeliveryError> {
            seen.lock().unwrap().push(snap.price.unwrap_or_default());
            Ok(())
        });
    }

    agg.ingest_tick(1, Some(1.17), Some(5.0), 0);
    let published = agg.ingest_tick(2, Some(1.18), None, 300);

    assert!(published.is_some());
    assert_eq!(*seen.lock().unwrap(), vec![1.18]);
    assert_eq!(agg.trades_topic().total_failures(), 2);
}

#[test]
fn test_delivered_snapshot_is_not_mutated_later() {
    let mut agg = MarketDataAggregator::default();
    let delivered = Arc::new(Mutex::new(Vec::<Arc<TickSnapshot>>::new()));
    {
        let delivered = delivered.clone();
        agg.trades_topic().register(move |snap: Arc<TickSnapshot>| -> Result<(), DeliveryError> {
            delivered.lock().unwrap().push(snap);
            Ok(())
        });
    }

    agg.ingest_tick(1, Some(1.0), Some(1.0), 0);
    agg.ingest_tick(1, Some(1.5), None, 1_000);
    agg.ingest_tick(1, Some(9.0), Some(9.0), 2_000);

    let delivered = delivered.lock().unwrap();
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0].price, Some(1.5));
    assert_eq!(delivered[0].timestamp, 1_000);
    assert_eq!(delivered[1].price, Some(9.0));
    assert_eq!(agg.tick_stream().snapshot().price, Some(9.0));
}

#[test]
fn test_candles_publish_every_bar() {
    let mut agg = MarketDataAggregator::default();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Arc<types::market::CandleBar>>();
    agg.candle_topic().register(channel_subscriber(tx));

    for ts in [0, 0, 5] {
        agg.ingest_candle(types::market::CandleBar {
            open: 1.0,
            high: 1.2,
            low: 0.9,
            close: 1.1,
            volume: 3.0,
            wap: 1.05,
            timestamp: ts,
        });
    }
    let mut count = 0;
    while rx.try_recv().is_ok() {
        count += 1;
    }
    assert_eq!(count, 3);
}

#[derive(Debug, Clone)]
struct Field {
    tick_type: i32,
    price: Option<f64>,
    size: Option<f64>,
}

fn field() -> impl Strategy<Value = Field> {
    (
        0..12i32,
        proptest::option::of(-2.0f64..5.0),
        proptest::option::of(-2.0f64..50.0),
    )
        .prop_map(|(tick_type, price, size)| Field {
            tick_type,
            price,
            size,
        })
}

proptest! {
    #[test]
    fn prop_tick_ready_once_all_fields_seen(fields in proptest::collection::vec(field(), 0..60)) {
        let mut agg = MarketDataAggregator::default();
        let mut saw_side = false;
        let mut saw_price = false;
        let mut saw_size = false;
        let mut was_ready = false;

        for (i, f) in fields.iter().enumerate() {
            agg.ingest_tick(f.tick_type, f.price, f.size, i as i64 * 37);
            if f.tick_type <= 3 {
                saw_side = true;
                saw_price |= f.price.map_or(false, |p| p > 0.0);
                saw_size |= f.size.map_or(false, |s| s > 0.0);
            }
            let ready = agg.tick_stream().is_ready();
            prop_assert_eq!(ready, saw_side && saw_price && saw_size);
            prop_assert!(!was_ready || ready);
            was_ready = ready;
        }
    }

    #[test]
    fn prop_depth_same_slot_in_bucket_publishes_at_most_once(
        bucket in 1i64..10_000,
        offsets in proptest::collection::vec(0i64..100, 1..20),
        side in 0..2i32,
        position in 0..DEPTH_LEVELS as i32,
    ) {
        let mut agg = MarketDataAggregator::default();
        fill_book(&mut agg, 0);

        let base = bucket * 100;
        let mut published = 0;
        for (i, off) in offsets.iter().enumerate() {
            if agg.ingest_depth(slot(side, position, 1.0 + i as f64), base + off).is_some() {
                published += 1;
            }
        }
        prop_assert!(published <= 1);
    }
}
