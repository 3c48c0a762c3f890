//! Save fixtures shared by the integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use timber_save::compression::EntryCompression;
use timber_save::container::Archive;
use timber_save::CompressionLevel;

/// World JSON for a `width`x`height` map with uniform water.
pub fn world_json(width: usize, height: usize, depth: f64) -> Value {
    let cells = width * height;
    let repeat = |value: String| vec![value; cells].join(" ");
    json!({
        "GameVersion": "0.5.9.2-8f2e1aa-sw",
        "Timestamp": "2024-05-14 18:22:05",
        "Singletons": {
            "MapSize": {"Size": {"X": width, "Y": height}},
            "WaterMap": {"WaterDepths": {"Array": repeat(format!("{depth}"))}},
            "ContaminationMap": {"Contaminations": {"Array": repeat("0".to_string())}},
            "SoilMoistureSimulator": {"MoistureLevels": {"Array": repeat("0.25".to_string())}},
            "SoilContaminationSimulator": {"ContaminationLevels": {"Array": repeat("0".to_string())}},
            "WeatherService": {"Cycle": 4, "CycleDay": 2, "TemperateWeatherDuration": 12},
            "HazardousWeatherService": {"HazardousWeatherDuration": 5, "IsDrought": false},
            "TemperateWeatherDurationService": {"MinTemperateWeatherDuration": 10, "MaxTemperateWeatherDuration": 14},
            "DroughtWeather": {"MinDroughtDuration": 3, "MaxDroughtDuration": 6},
            "BadtideWeather": {"MinBadtideWeatherDuration": 4, "MaxBadtideWeatherDuration": 7}
        },
        "Entities": [
            {"Id": "a9d1", "Template": "Path", "Components": {"BlockObject": {"Coordinates": {"X": 1, "Y": 0, "Z": 2}}}}
        ]
    })
}

/// Container with a thumbnail before and a metadata entry after the world.
pub fn save_bytes(world: &Value) -> Vec<u8> {
    let mut archive = Archive::default();
    archive
        .push_entry(
            "thumbnail.jpg",
            &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46],
            EntryCompression::Stored,
            CompressionLevel::Normal,
        )
        .expect("thumbnail");
    // Pretty printed like the game writes it, so a rewrite is observable
    let payload = serde_json::to_vec_pretty(world).expect("json");
    archive
        .push_entry("world.json", &payload, EntryCompression::Deflate, CompressionLevel::Best)
        .expect("world");
    archive
        .push_entry(
            "save_metadata.json",
            br#"{"GameMode":"Normal","Faction":"Folktails"}"#,
            EntryCompression::Deflate,
            CompressionLevel::Fast,
        )
        .expect("metadata");
    archive.to_bytes().expect("bytes")
}
