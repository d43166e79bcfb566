/// Integration tests for snapshot cache behavior through the recommender
///
/// 1. Hits within the TTL return the stored snapshot without querying
/// 2. Misses outside the TTL rebuild
/// 3. Auto-purge, explicit purge and purge-on-complete
/// 4. Concurrent callers share one recommender
///
/// Run with: cargo test --test cache_lifecycle

use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Duration, TimeZone, Utc};
use flowarn_service::config::{CacheConfig, HazardSettings, ServiceConfig};
use flowarn_service::data_access::MemoryStore;
use flowarn_service::error::HazardError;
use flowarn_service::model::{Entry, ForecastGroup, ForecastPoint};
use flowarn_service::recommender::Recommender;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn store() -> MemoryStore {
    let mut store = MemoryStore::new(HazardSettings::default());
    let mut group = ForecastGroup::new("ILLINOIS", "Illinois River");
    group.point_ids = vec!["PEOI2".into()];
    let mut point = ForecastPoint::new("PEOI2", "HG");
    point.group_id = "ILLINOIS".into();
    point.thresholds.flood_stage = 18.0;
    store
        .add_group("ILX", group)
        .add_point(point)
        .add_observed("PEOI2", "HG", "RG", vec![Entry::new(12.0, t0() - Duration::hours(1), "RG")]);
    store
}

fn recommender(auto_purge: bool) -> Recommender<MemoryStore> {
    let mut config = ServiceConfig::new("ILX");
    config.cache = CacheConfig {
        ttl_minutes: 10,
        auto_purge,
        purge_on_complete: true,
    };
    Recommender::new(store(), &config)
}

// ---------------------------------------------------------------------------
// 1-2. Round trip
// ---------------------------------------------------------------------------

#[test]
fn test_round_trip_within_and_outside_ttl() {
    let rec = recommender(false);
    let first = rec.get_snapshot(t0()).expect("first build");
    let queries_after_build = rec.store().query_count();

    let hit = rec.get_snapshot(t0() + Duration::minutes(9)).expect("cache hit");
    assert!(Arc::ptr_eq(&first, &hit), "hit returns the stored snapshot unchanged");
    assert_eq!(rec.store().query_count(), queries_after_build, "no queries on a hit");

    let miss = rec.get_snapshot(t0() + Duration::minutes(11)).expect("rebuild");
    assert!(!Arc::ptr_eq(&first, &miss), "outside the TTL the snapshot is rebuilt");
    assert!(rec.store().query_count() > queries_after_build);
    assert_eq!(miss.build_time, t0() + Duration::minutes(11));
}

#[test]
fn test_forced_get_ignores_window() {
    let rec = recommender(false);
    let first = rec.get_snapshot(t0()).expect("build");
    let forced = rec.cache().get(t0() + Duration::days(2), true).expect("forced get");
    assert!(Arc::ptr_eq(&first, &forced));
    assert!(rec.cache().get(t0() + Duration::days(2), false).is_none());
}

// ---------------------------------------------------------------------------
// 3. Purging
// ---------------------------------------------------------------------------

#[test]
fn test_auto_purge_after_ttl() {
    let rec = recommender(true);
    rec.set_cache_ttl(Duration::milliseconds(50));
    rec.get_snapshot(t0()).expect("build");
    thread::sleep(std::time::Duration::from_millis(400));
    assert!(rec.cache().is_empty(), "snapshot should expire on its own");
}

#[test]
fn test_disabling_auto_purge_keeps_snapshot() {
    let rec = recommender(true);
    rec.set_auto_purge(false);
    rec.set_cache_ttl(Duration::milliseconds(50));
    rec.get_snapshot(t0()).expect("build");
    thread::sleep(std::time::Duration::from_millis(200));
    assert!(!rec.cache().is_empty());
}

#[test]
fn test_purge_on_complete_respects_flag() {
    let rec = recommender(false);
    rec.get_snapshot(t0()).expect("build");

    rec.set_purge_on_complete(false);
    rec.purge_on_complete();
    assert!(!rec.cache().is_empty());

    rec.set_purge_on_complete(true);
    rec.purge_on_complete();
    assert!(rec.cache().is_empty());
}

#[test]
fn test_failed_build_leaves_previous_snapshot_untouched() {
    let mut failing = store();
    failing.fail_on("crest_history");
    let mut config = ServiceConfig::new("ILX");
    config.cache.auto_purge = false;
    let rec = Recommender::new(failing, &config);

    let result = rec.get_snapshot(t0());
    match result {
        Err(HazardError::DataAccess { operation, .. }) => assert_eq!(operation, "crest_history"),
        other => panic!("expected a data access error, got {:?}", other.map(|s| s.build_time)),
    }
    assert!(rec.cache().is_empty(), "nothing partial is cached");
}

// ---------------------------------------------------------------------------
// 4. Shared use
// ---------------------------------------------------------------------------

#[test]
fn test_concurrent_callers_share_snapshot() {
    let rec = Arc::new(recommender(false));
    let first = rec.get_snapshot(t0()).expect("build");

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let rec = Arc::clone(&rec);
            thread::spawn(move || rec.get_snapshot(t0() + Duration::minutes(i)).expect("hit"))
        })
        .collect();

    for handle in handles {
        let snapshot = handle.join().expect("thread should not panic");
        assert!(Arc::ptr_eq(&first, &snapshot));
    }
}
