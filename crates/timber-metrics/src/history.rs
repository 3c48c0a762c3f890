//! Persisted series of metric snapshots.
//!
//! One `historical_data.json` per tracked save directory, holding a JSON
//! array of snapshots in game time order (cycle, then day within the
//! cycle). Every append rewrites the whole file with the same atomic
//! replace used for saves.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use timber_common::fs::{atomic_write, read_with_retry};
use timber_common::{TimberError, TimberResult};
use tracing::{debug, info};

use crate::engine::MetricsSnapshot;

/// File name of the history inside a save directory.
pub const HISTORY_FILE_NAME: &str = "historical_data.json";

/// One point of the clean water chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CleanWaterPoint {
    /// Day within the cycle.
    pub day: u32,
    /// Cycle number.
    pub cycle: u32,
    /// Clean water at that time.
    pub total_clean_water: f64,
}

/// Snapshots in game time order, at most one per (day, cycle).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<MetricsSnapshot>", into = "Vec<MetricsSnapshot>")]
pub struct HistoricalSeries {
    entries: BTreeMap<(u32, u32), MetricsSnapshot>,
}

impl HistoricalSeries {
    /// Creates an empty series.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `snapshot`, replacing any entry with the same (day, cycle).
    ///
    /// Returns the replaced entry.
    pub fn insert(&mut self, snapshot: MetricsSnapshot) -> Option<MetricsSnapshot> {
        self.entries.insert(snapshot.key(), snapshot)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the series is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for `day` of `cycle`.
    #[must_use]
    pub fn get(&self, cycle: u32, day: u32) -> Option<&MetricsSnapshot> {
        self.entries.get(&(cycle, day))
    }

    /// Entries in game time order.
    pub fn iter(&self) -> impl Iterator<Item = &MetricsSnapshot> {
        self.entries.values()
    }

    /// Most recent entry in game time.
    #[must_use]
    pub fn latest(&self) -> Option<&MetricsSnapshot> {
        self.entries.values().next_back()
    }

    /// Entries whose day lies in `day_from..=day_to`, in game time order.
    ///
    /// A missing bound is open; with both missing the whole series is returned.
    #[must_use]
    pub fn range(&self, day_from: Option<u32>, day_to: Option<u32>) -> Vec<MetricsSnapshot> {
        let days = day_from.unwrap_or(u32::MIN)..=day_to.unwrap_or(u32::MAX);
        self.iter()
            .filter(|snapshot| days.contains(&snapshot.day))
            .cloned()
            .collect()
    }

    /// Clean water totals in series order.
    #[must_use]
    pub fn clean_water_series(&self) -> Vec<CleanWaterPoint> {
        self.iter()
            .map(|s| CleanWaterPoint {
                day: s.day,
                cycle: s.cycle,
                total_clean_water: s.total_clean_water,
            })
            .collect()
    }
}

impl From<Vec<MetricsSnapshot>> for HistoricalSeries {
    fn from(snapshots: Vec<MetricsSnapshot>) -> Self {
        let mut series = Self::new();
        for snapshot in snapshots {
            series.insert(snapshot);
        }
        series
    }
}

impl From<HistoricalSeries> for Vec<MetricsSnapshot> {
    fn from(series: HistoricalSeries) -> Self {
        series.entries.into_values().collect()
    }
}

/// Owner and sole writer of a history file.
#[derive(Debug, Clone)]
pub struct HistoricalStore {
    path: PathBuf,
    series: HistoricalSeries,
}

impl HistoricalStore {
    /// Loads the history kept in `directory`.
    ///
    /// A missing file is an empty series.
    pub fn load(directory: &Path) -> TimberResult<Self> {
        Self::open(directory.join(HISTORY_FILE_NAME))
    }

    /// Loads the history file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> TimberResult<Self> {
        let path = path.into();
        if !path.exists() {
            debug!("No history at {}, starting empty", path.display());
            return Ok(Self {
                path,
                series: HistoricalSeries::new(),
            });
        }

        let bytes = read_with_retry(&path)?;
        let series: HistoricalSeries = serde_json::from_slice(&bytes)
            .map_err(|e| TimberError::corrupt(path.display().to_string(), e.to_string()))?;
        info!("Loaded {} history entries from {}", series.len(), path.display());
        Ok(Self { path, series })
    }

    /// History file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current series.
    #[must_use]
    pub fn series(&self) -> &HistoricalSeries {
        &self.series
    }

    /// Inserts `snapshot` and persists the whole series.
    ///
    /// The in-memory series only changes once the file has been replaced.
    pub fn append(&mut self, snapshot: MetricsSnapshot) -> TimberResult<()> {
        let mut next = self.series.clone();
        let (cycle, day) = snapshot.key();
        if next.insert(snapshot).is_some() {
            debug!("Replacing history entry for day {day} cycle {cycle}");
        }

        let bytes = serde_json::to_vec(&next)
            .map_err(|e| TimberError::corrupt(HISTORY_FILE_NAME, e.to_string()))?;
        atomic_write(&self.path, &bytes)?;

        self.series = next;
        info!(
            "History now holds {} entries ({})",
            self.series.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Entries whose day lies in `day_from..=day_to`.
    #[must_use]
    pub fn range(&self, day_from: Option<u32>, day_to: Option<u32>) -> Vec<MetricsSnapshot> {
        self.series.range(day_from, day_to)
    }
}
