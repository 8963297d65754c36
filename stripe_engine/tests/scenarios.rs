//! End-to-end scenarios exercising cache eviction, request dedup, the
//! retry/circuit-breaker sequence, and multi-year tile compositing against
//! the public API surface — a whole subsystem driven through its real
//! entry points rather than one function at a time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use shared_utils::clock::FakeClock;
use stripe_engine::config::{RenderingConfig, RequestQueueConfig};
use stripe_engine::datekit::CalendarDay;
use stripe_engine::lru_cache::LruCache;
use stripe_engine::models::{DataPoint, UnitSeries, YearPayload};
use stripe_engine::request_queue::{BoxFuture, RequestError, RequestQueue, SubmitRequest};
use stripe_engine::tile::{TileCache, TileKey};
use stripe_engine::viewport::{Compositor, Epoch, Viewport};
use stripe_engine::year_vendor::{YearSource, YearVendor};

fn unit(facility: &str, year: i32, pct: f32) -> UnitSeries {
    UnitSeries {
        unit_id: format!("{facility}-U1"),
        facility_id: facility.into(),
        facility_name: facility.into(),
        region: "NSW1".into(),
        network: "NEM".into(),
        capacity_mw: 100.0,
        year,
        data: vec![DataPoint::Percent(pct); CalendarDay::days_in_year(year) as usize],
    }
}

struct CountingSource {
    calls: Arc<AtomicUsize>,
}

impl YearSource for CountingSource {
    fn fetch_year(&self, year: i32) -> BoxFuture<YearPayload> {
        let calls = self.calls.clone();
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(YearPayload::new(year, SystemTime::UNIX_EPOCH, vec![unit("F1", year, 60.0)]))
        })
    }
}

/// Scenario: requesting more distinct years than the cache holds evicts the
/// least-recently-used one, which must then be refetched from upstream.
#[tokio::test]
async fn year_cache_evicts_lru_and_refetches() {
    let calls = Arc::new(AtomicUsize::new(0));
    let queue = Arc::new(RequestQueue::new(RequestQueueConfig::default()));
    let vendor = YearVendor::new(2, queue, Arc::new(CountingSource { calls: calls.clone() }));

    vendor.request_year(2020, 0).await.unwrap();
    vendor.request_year(2021, 0).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // 2020 is still resident; re-requesting it must not refetch.
    vendor.request_year(2020, 0).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // 2022 evicts the LRU entry, which is now 2021 (2020 was just touched).
    vendor.request_year(2022, 0).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    vendor.request_year(2021, 0).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4, "2021 should have been evicted and refetched");
}

/// Scenario: two concurrent requests for the same year are deduplicated
/// against a single upstream fetch.
#[tokio::test]
async fn concurrent_requests_for_same_year_are_deduplicated() {
    let calls = Arc::new(AtomicUsize::new(0));
    let queue = Arc::new(RequestQueue::new(RequestQueueConfig::default()));
    let vendor = Arc::new(YearVendor::new(4, queue, Arc::new(CountingSource { calls: calls.clone() })));

    let a = vendor.clone();
    let b = vendor.clone();
    let (first, second) = tokio::join!(
        tokio::spawn(async move { a.request_year(2023, 0).await }),
        tokio::spawn(async move { b.request_year(2023, 0).await }),
    );

    assert!(first.unwrap().is_ok());
    assert!(second.unwrap().is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Scenario: repeated permanent failures trip the breaker, a subsequent
/// submission is rejected outright, and the breaker recovers after its
/// cooldown elapses.
#[tokio::test]
async fn breaker_opens_after_threshold_and_recovers_after_cooldown() {
    let config = RequestQueueConfig {
        max_retries: 0,
        min_interval_ms: 0,
        breaker_threshold: 2,
        breaker_reset_ms: 60,
        request_timeout_ms: 5_000,
        ..Default::default()
    };
    let clock = FakeClock::new();
    let queue: RequestQueue<i32> = RequestQueue::new_with_clock(config, Arc::new(clock.clone()));

    let failing = || -> BoxFuture<i32> { Box::pin(async { Err(RequestError::TransientUpstream("boom".into())) }) };

    let a = queue
        .submit(SubmitRequest {
            priority: 0,
            label: None,
            execute: Arc::new(failing),
        })
        .await;
    assert!(matches!(a, Err(RequestError::PermanentUpstream(_))));

    let b = queue
        .submit(SubmitRequest {
            priority: 0,
            label: None,
            execute: Arc::new(failing),
        })
        .await;
    assert!(matches!(b, Err(RequestError::PermanentUpstream(_))));
    assert!(queue.stats().await.breaker_open);

    let c = queue
        .submit(SubmitRequest {
            priority: 0,
            label: None,
            execute: Arc::new(failing),
        })
        .await;
    assert!(matches!(c, Err(RequestError::CircuitOpen)));

    // Advance the fake clock past `breaker_reset_ms` instead of sleeping for
    // real, so the cooldown is observed instantly.
    clock.advance(Duration::from_millis(80));

    let d = queue
        .submit(SubmitRequest {
            priority: 0,
            label: None,
            execute: Arc::new(|| -> BoxFuture<i32> { Box::pin(async { Ok(7) }) }),
        })
        .await;
    assert_eq!(d, Ok(7));
    assert!(!queue.stats().await.breaker_open);
}

/// Scenario: a viewport window straddling a year boundary composites tiles
/// from both years into one contiguous row.
#[tokio::test]
async fn composite_spans_a_year_boundary() {
    let calls = Arc::new(AtomicUsize::new(0));
    let queue = Arc::new(RequestQueue::new(RequestQueueConfig::default()));
    let vendor = Arc::new(YearVendor::new(4, queue, Arc::new(CountingSource { calls })));
    let tiles = TileCache::new(8, vendor, RenderingConfig::default(), false);

    let epoch = Epoch { year: 2020 };
    let dec_middle = CalendarDay::from_ymd(2023, 11, 15).unwrap();
    let offset = epoch.day().days_until(&dec_middle);
    let viewport = Viewport::new(epoch, offset);
    assert_eq!(viewport.overlapping_years(), vec![2023, 2024]);

    let mut resolved = std::collections::HashMap::new();
    for year in viewport.overlapping_years() {
        let tile = tiles
            .get_tile(
                TileKey {
                    facility_id: "F1".into(),
                    year,
                },
                0,
            )
            .await
            .unwrap();
        resolved.insert(("F1".to_string(), year), tile);
    }

    let frame = Compositor::composite(&viewport, &[("F1".to_string(), 20)], 365, |facility_id, year| {
        resolved.get(&(facility_id.to_string(), year)).cloned()
    });

    assert_eq!(frame.rows.len(), 1);
    assert!(frame.rows[0].pixels.iter().any(|&b| b != 0), "both years should paint pixels, not leave background");
}

/// Sanity check that the generic cache honours the same LRU contract the
/// year vendor relies on, independent of the async plumbing above.
#[test]
fn lru_cache_eviction_is_strict() {
    let mut cache: LruCache<i32, &'static str> = LruCache::new(2);
    cache.set(1, "a", 1, None, None).unwrap();
    cache.set(2, "b", 1, None, None).unwrap();
    assert!(cache.get(&1).is_some()); // touches 1, making 2 the LRU
    cache.set(3, "c", 1, None, None).unwrap();
    assert!(cache.get(&2).is_none());
    assert!(cache.get(&1).is_some());
    assert!(cache.get(&3).is_some());
}
