//! Metrics computed from decoded saves.

mod common;

use proptest::prelude::*;
use tempfile::TempDir;
use timber_metrics::{HistoricalStore, MetricsEngine, HISTORY_FILE_NAME};
use timber_save::WeatherPhase;

use common::document;

#[test]
fn test_two_by_two_clean_water() {
    let doc = document(2, &[10.0, 0.0, 5.0, 0.0], &[2.0, 0.0, 5.0, 3.0], 3, 1);
    let total = MetricsEngine::total_clean_water(&doc);
    assert!((total - 8.0).abs() < 1e-9, "total was {total}");

    let contamination = MetricsEngine::contamination_matrix(&doc);
    assert_eq!(contamination.get(0, 0).expect("cell"), 0.2);
    assert_eq!(contamination.get(1, 0).expect("cell"), 1.0);
    // Dry tile with a contamination scalar saturates but holds no water
    assert_eq!(contamination.get(1, 1).expect("cell"), 1.0);
}

#[test]
fn test_metrics_are_deterministic() {
    let depths: Vec<f64> = (0..64 * 48).map(|i| f64::from(i % 7) * 0.37).collect();
    let contamination: Vec<f64> = (0..64 * 48).map(|i| f64::from(i % 11) * 0.05).collect();
    let doc = document(64, &depths, &contamination, 5, 2);
    let engine = MetricsEngine::default();

    let first = engine.snapshot(&doc);
    for _ in 0..5 {
        assert_eq!(engine.snapshot(&doc), first);
        assert_eq!(
            MetricsEngine::total_clean_water(&doc).to_bits(),
            first.total_clean_water.to_bits()
        );
    }
}

#[test]
fn test_snapshot_contents() {
    let doc = document(3, &[1.0, 2.0, 0.0, 4.0, 0.5, 0.0], &[0.0; 6], 11, 4);
    let snapshot = MetricsEngine::new(4).snapshot(&doc);

    assert_eq!(snapshot.key(), (4, 11));
    assert_eq!((snapshot.width, snapshot.height), (3, 2));
    assert_eq!(snapshot.timestamp.as_deref(), Some("2024-07-04 12:00:00"));
    assert_eq!(snapshot.water_matrix.get(1, 0).expect("cell"), 4.0);
    assert!((snapshot.total_clean_water - 7.5).abs() < 1e-9);
    assert_eq!(snapshot.moisture_matrix.get(0, 1).expect("cell"), 0.25);
    // Soil contamination 0.6 on tiles 0 and 3
    assert_eq!(snapshot.contaminated_soil_tiles, 2);
    assert_eq!(
        snapshot.evaporation_matrix.as_ref().map(|m| m.values().to_vec()),
        Some(vec![1.0; 6])
    );

    // Day 11 of a 9 day temperate phase: drought, 13 - 11 + 1 days left
    assert_eq!(snapshot.weather.phase, WeatherPhase::Drought);
    assert_eq!(snapshot.weather.remaining_days, 3);
    assert_eq!(snapshot.weather.upcoming.len(), 4);
    assert_eq!(snapshot.weather.upcoming[0].cycle, 5);
}

#[test]
fn test_history_from_saves() {
    let dir = TempDir::new().expect("temp dir");
    let engine = MetricsEngine::default();
    let mut store = HistoricalStore::load(dir.path()).expect("load");

    for (day, cycle, depth) in [(2, 1, 1.0), (1, 2, 2.0), (2, 1, 3.0)] {
        let doc = document(2, &[depth; 4], &[0.0; 4], day, cycle);
        store.append(engine.snapshot(&doc)).expect("append");
    }

    let reloaded = HistoricalStore::load(dir.path()).expect("reload");
    // Day 2 of cycle 1 comes before day 1 of cycle 2
    let times: Vec<(u32, u32)> = reloaded.series().iter().map(|s| (s.cycle, s.day)).collect();
    assert_eq!(times, vec![(1, 2), (2, 1)]);
    assert_eq!(reloaded.series().get(1, 2).expect("entry").total_clean_water, 12.0);

    let raw = std::fs::read_to_string(dir.path().join(HISTORY_FILE_NAME)).expect("read");
    assert!(raw.starts_with('['));
}

fn tile_values(len: usize) -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (
        prop::collection::vec(0.0f64..50.0, len),
        prop::collection::vec(0.0f64..60.0, len),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_clean_water_is_non_negative((depths, contamination) in tile_values(12)) {
        let doc = document(4, &depths, &contamination, 1, 1);
        prop_assert!(MetricsEngine::total_clean_water(&doc) >= 0.0);
    }

    #[test]
    fn prop_contamination_is_bounded((depths, contamination) in tile_values(12)) {
        let doc = document(3, &depths, &contamination, 1, 1);
        let matrix = MetricsEngine::contamination_matrix(&doc);
        prop_assert!(matrix.values().iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
