//! Save fixtures for the metrics tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use timber_save::compression::EntryCompression;
use timber_save::container::Archive;
use timber_save::{CompressionLevel, WorldDocument};

fn join(values: &[f64]) -> String {
    values.iter().map(|v| format!("{v}")).collect::<Vec<_>>().join(" ")
}

/// World with explicit per-tile water depth and contamination.
pub fn world(width: usize, depths: &[f64], contamination: &[f64], day: u32, cycle: u32) -> Value {
    let height = depths.len() / width;
    let moisture: Vec<f64> = (0..depths.len()).map(|i| (i % 5) as f64 / 4.0).collect();
    let soil: Vec<f64> = (0..depths.len()).map(|i| if i % 3 == 0 { 0.6 } else { 0.0 }).collect();
    json!({
        "GameVersion": "0.6.3.1-1a2b3c4-sw",
        "Timestamp": format!("2024-07-0{} 12:00:00", cycle % 10),
        "Singletons": {
            "MapSize": {"Size": {"X": width, "Y": height}},
            "WaterMap": {"WaterDepths": {"Array": join(depths)}},
            "ContaminationMap": {"Contaminations": {"Array": join(contamination)}},
            "SoilMoistureSimulator": {"MoistureLevels": {"Array": join(&moisture)}},
            "SoilContaminationSimulator": {"ContaminationLevels": {"Array": join(&soil)}},
            "WaterEvaporationMap": {"EvaporationModifiers": {"Array": vec!["1."; depths.len()].join(" ")}},
            "WeatherService": {"Cycle": cycle, "CycleDay": day, "TemperateWeatherDuration": 9},
            "HazardousWeatherService": {"HazardousWeatherDuration": 4, "IsDrought": true},
            "TemperateWeatherDurationService": {"MinTemperateWeatherDuration": 8, "MaxTemperateWeatherDuration": 12},
            "DroughtWeather": {"MinDroughtDuration": 2, "MaxDroughtDuration": 5},
            "BadtideWeather": {"MinBadtideWeatherDuration": 3, "MaxBadtideWeatherDuration": 6}
        }
    })
}

/// Encodes a world into a single-entry container.
pub fn save_bytes(world: &Value) -> Vec<u8> {
    let mut archive = Archive::default();
    let payload = serde_json::to_vec(world).expect("json");
    archive
        .push_entry("world.json", &payload, EntryCompression::Deflate, CompressionLevel::Normal)
        .expect("world");
    archive.to_bytes().expect("bytes")
}

/// Decodes a world built by [`world`].
pub fn document(width: usize, depths: &[f64], contamination: &[f64], day: u32, cycle: u32) -> WorldDocument {
    WorldDocument::decode(&save_bytes(&world(width, depths, contamination, day, cycle))).expect("decode")
}
