//! End-to-end scenarios against the public API.

use chrono::{DateTime, Duration, TimeZone, Utc};
use continuum::{Config, ContinuumError, ContinuumStore, EntityId, PruningPolicy, Region};
use rustc_hash::FxHashSet;

fn now() -> DateTime<Utc> {
    // Fixed "now" keeps the scenarios deterministic.
    Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap()
}

/// Deterministic grid of `count` points inside the given envelope.
fn grid_points(
    count: usize,
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
) -> Vec<(f64, f64)> {
    let side = (count as f64).sqrt().ceil() as usize;
    let lon_step = (max_lon - min_lon) / (side + 1) as f64;
    let lat_step = (max_lat - min_lat) / (side + 1) as f64;
    (0..count)
        .map(|i| {
            let row = i / side;
            let col = i % side;
            (
                min_lat + lat_step * (row + 1) as f64,
                min_lon + lon_step * (col + 1) as f64,
            )
        })
        .collect()
}

fn attach_all(
    store: &ContinuumStore,
    points: &[(f64, f64)],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<EntityId> {
    points
        .iter()
        .map(|&(lat, lon)| {
            let id = store.create_entity().unwrap();
            store.attach_capability(id, lat, lon, start, end).unwrap()
        })
        .collect()
}

#[test]
fn hundred_entities_in_region_and_window_all_found() {
    let store = ContinuumStore::new();
    let points = grid_points(100, 15.0, 56.0, 16.0, 57.0);
    let ids = attach_all(&store, &points, now(), now() + Duration::days(1));

    let hits = store
        .query(
            &Region::envelope(15.0, 56.0, 16.0, 57.0),
            now(),
            now() + Duration::hours(4),
        )
        .unwrap();
    assert_eq!(hits.len(), 100);
    for id in ids {
        assert!(hits.contains(&id));
    }
}

#[test]
fn spatial_filter_splits_inside_from_outside() {
    let store = ContinuumStore::new();
    let inside = attach_all(
        &store,
        &grid_points(50, 15.0, 56.0, 16.0, 57.0),
        now(),
        now() + Duration::days(1),
    );
    let outside = attach_all(
        &store,
        &grid_points(50, -75.0, 40.0, -74.0, 41.0),
        now(),
        now() + Duration::days(1),
    );

    let hits = store
        .query(
            &Region::envelope(15.0, 56.0, 16.0, 57.0),
            now(),
            now() + Duration::hours(4),
        )
        .unwrap();
    assert_eq!(hits.len(), 50);
    for id in &inside {
        assert!(hits.contains(id));
    }
    for id in &outside {
        assert!(!hits.contains(id));
    }
}

#[test]
fn past_entities_invisible_to_future_window() {
    let store = ContinuumStore::new();
    let three_days_ago = now() - Duration::days(3);
    attach_all(
        &store,
        &grid_points(100, 15.0, 56.0, 16.0, 57.0),
        three_days_ago,
        three_days_ago + Duration::hours(1),
    );

    let hits = store
        .query(
            &Region::envelope(15.0, 56.0, 16.0, 57.0),
            now(),
            now() + Duration::hours(4),
        )
        .unwrap();
    assert!(hits.is_empty());
}

#[test]
fn single_instant_entity_resolves_to_day_granularity() {
    let store = ContinuumStore::new();
    let id = store.create_entity().unwrap();
    store
        .attach_capability(id, 56.5, 15.5, now(), now())
        .unwrap();

    let resolved = store.temporal_index().resolve(id).unwrap();
    assert_eq!(resolved, Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap());

    let points: Vec<_> = store.time_points().unwrap().collect();
    assert_eq!(points, vec![resolved]);
}

#[test]
fn combined_query_equals_index_intersection() {
    let store = ContinuumStore::new();
    attach_all(
        &store,
        &grid_points(30, 15.0, 56.0, 16.0, 57.0),
        now(),
        now() + Duration::days(1),
    );
    attach_all(
        &store,
        &grid_points(30, 15.0, 56.0, 16.0, 57.0),
        now() + Duration::days(10),
        now() + Duration::days(11),
    );
    attach_all(
        &store,
        &grid_points(30, -75.0, 40.0, -74.0, 41.0),
        now(),
        now() + Duration::days(1),
    );

    let region = Region::envelope(15.0, 56.0, 16.0, 57.0);
    let from = now();
    let to = now() + Duration::hours(4);

    let combined = store.query(&region, from, to).unwrap();
    let spatial = store.spatial_index().query_within(&region).unwrap();
    let temporal = store.temporal_index().query_range(from, to).unwrap();
    let expected: FxHashSet<EntityId> = spatial.intersection(&temporal).copied().collect();

    assert_eq!(combined, expected);
    assert_eq!(combined.len(), 30);
}

#[test]
fn repeated_query_without_writes_is_identical() {
    let store = ContinuumStore::new();
    attach_all(
        &store,
        &grid_points(40, 15.0, 56.0, 16.0, 57.0),
        now(),
        now() + Duration::days(1),
    );

    let region = Region::envelope(15.2, 56.2, 15.8, 56.8);
    let first = store.query(&region, now(), now() + Duration::hours(4)).unwrap();
    let second = store.query(&region, now(), now() + Duration::hours(4)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn rejected_attach_leaves_no_trace() {
    let store = ContinuumStore::new();
    let survivor = store.create_entity().unwrap();
    store
        .attach_capability(survivor, 56.5, 15.5, now(), now())
        .unwrap();
    let before = store.list_capable_entities().unwrap();

    let id = store.create_entity().unwrap();
    assert!(matches!(
        store.attach_capability(id, 56.5, 15.5, now() + Duration::days(1), now()),
        Err(ContinuumError::InvalidTimeRange { .. })
    ));
    assert!(matches!(
        store.attach_capability(id, 91.0, 15.5, now(), now()),
        Err(ContinuumError::InvalidCoordinate(_))
    ));

    assert_eq!(store.list_capable_entities().unwrap(), before);
    let hits = store
        .query(
            &Region::envelope(15.0, 56.0, 16.0, 57.0),
            now() - Duration::days(2),
            now() + Duration::days(2),
        )
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits.contains(&survivor));
}

#[test]
fn degenerate_region_aborts_query_with_error() {
    let store = ContinuumStore::new();
    attach_all(
        &store,
        &grid_points(5, 15.0, 56.0, 16.0, 57.0),
        now(),
        now() + Duration::days(1),
    );

    let degenerate = Region::envelope(15.0, 56.0, 15.0, 57.0);
    assert!(matches!(
        store.query(&degenerate, now(), now() + Duration::hours(4)),
        Err(ContinuumError::InvalidGeometry(_))
    ));
}

#[test]
fn removal_under_both_pruning_policies() {
    for policy in [PruningPolicy::Eager, PruningPolicy::Deferred] {
        let store = ContinuumStore::with_config(Config::default().with_pruning(policy));
        let keep = store.create_entity().unwrap();
        store
            .attach_capability(keep, 56.5, 15.5, now(), now())
            .unwrap();
        let removed = store.create_entity().unwrap();
        store
            .attach_capability(removed, 56.6, 15.6, now(), now())
            .unwrap();

        store.remove_capability(removed).unwrap();
        if policy == PruningPolicy::Deferred {
            store.prune_vacated().unwrap();
        }

        assert_eq!(store.list_capable_entities().unwrap(), vec![keep]);
        let hits = store
            .query(
                &Region::envelope(15.0, 56.0, 16.0, 57.0),
                now(),
                now() + Duration::hours(4),
            )
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits.contains(&keep));
    }
}

#[test]
fn time_points_iteration_restarts_from_scratch() {
    let store = ContinuumStore::new();
    for day in 1..=7 {
        let id = store.create_entity().unwrap();
        let instant = Utc.with_ymd_and_hms(2024, 6, day, 9, 0, 0).unwrap();
        store
            .attach_capability(id, 56.5, 15.5, instant, instant)
            .unwrap();
    }

    let mut first = store.time_points().unwrap();
    // Partially consuming one iterator does not affect a fresh one.
    first.next();
    first.next();
    let fresh: Vec<_> = store.time_points().unwrap().collect();
    assert_eq!(fresh.len(), 7);
    assert_eq!(
        fresh[0],
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    );
}
