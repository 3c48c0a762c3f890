//! Metrics derived from a decoded world.
//!
//! Every function here is a pure function of the document: nothing is cached
//! and repeated calls return identical results.

use serde::{Deserialize, Serialize};
use timber_save::{
    GameTime, ScheduledPhase, TerrainGrid, Tile, WeatherPhase, WeatherSettings, WeatherState,
    WorldDocument,
};
use tracing::debug;

use crate::matrix::{sum_rows, Matrix};

/// Number of upcoming phases listed in a weather summary by default.
pub const DEFAULT_UPCOMING_PHASES: usize = 3;

/// Current weather and what follows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherSummary {
    /// Current phase.
    pub phase: WeatherPhase,
    /// Days left in the current phase, including today.
    pub remaining_days: u32,
    /// Day within the cycle.
    pub day: u32,
    /// Cycle number.
    pub cycle: u32,
    /// Length of this cycle's temperate phase.
    pub temperate_duration: u32,
    /// Length of this cycle's hazardous phase.
    pub hazardous_duration: u32,
    /// Kind of this cycle's hazardous phase.
    pub hazardous_phase: WeatherPhase,
    /// Phases after the current one.
    pub upcoming: Vec<ScheduledPhase>,
}

/// Derived metrics of one save at one point in game time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Day within the cycle.
    pub day: u32,
    /// Cycle number.
    pub cycle: u32,
    /// Save timestamp, when the world has one.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Map width.
    pub width: usize,
    /// Map height.
    pub height: usize,
    /// Uncontaminated standing water over the whole map.
    pub total_clean_water: f64,
    /// Water depth per tile.
    pub water_matrix: Matrix,
    /// Contaminated share of the water per tile.
    pub contamination_matrix: Matrix,
    /// Soil moisture per tile.
    pub moisture_matrix: Matrix,
    /// Soil contamination per tile.
    pub soil_contamination_matrix: Matrix,
    /// Evaporation modifiers per tile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaporation_matrix: Option<Matrix>,
    /// Tiles whose soil counts as contaminated.
    pub contaminated_soil_tiles: usize,
    /// Weather at the time of the save.
    pub weather: WeatherSummary,
}

impl MetricsSnapshot {
    /// History key, `(cycle, day)`, ordered by game time.
    #[must_use]
    pub fn key(&self) -> (u32, u32) {
        (self.cycle, self.day)
    }

    /// Game time of the snapshot.
    #[must_use]
    pub fn time(&self) -> GameTime {
        GameTime::new(self.day, self.cycle)
    }
}

/// Computes metrics for decoded worlds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsEngine {
    /// Phases listed after the current one in weather summaries.
    pub upcoming_phases: usize,
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self {
            upcoming_phases: DEFAULT_UPCOMING_PHASES,
        }
    }
}

impl MetricsEngine {
    /// Creates an engine listing `upcoming_phases` scheduled phases.
    #[must_use]
    pub const fn new(upcoming_phases: usize) -> Self {
        Self { upcoming_phases }
    }

    /// Sum over all tiles of `water_depth * (1 - contamination_percentage)`.
    ///
    /// Dry tiles contribute nothing whatever their contamination.
    #[must_use]
    pub fn total_clean_water(document: &WorldDocument) -> f64 {
        clean_water_of(document.terrain())
    }

    /// Water depth per tile.
    #[must_use]
    pub fn water_matrix(document: &WorldDocument) -> Matrix {
        Matrix::from_grid(document.terrain(), |t| t.water_depth)
    }

    /// Contaminated share of the water per tile, in [0, 1].
    #[must_use]
    pub fn contamination_matrix(document: &WorldDocument) -> Matrix {
        Matrix::from_grid(document.terrain(), Tile::contamination_percentage)
    }

    /// Soil moisture per tile.
    #[must_use]
    pub fn moisture_matrix(document: &WorldDocument) -> Matrix {
        Matrix::from_grid(document.terrain(), |t| t.moisture)
    }

    /// Soil contamination per tile.
    #[must_use]
    pub fn soil_contamination_matrix(document: &WorldDocument) -> Matrix {
        Matrix::from_grid(document.terrain(), |t| t.soil_contamination)
    }

    /// Evaporation modifiers per tile, when the save has them.
    #[must_use]
    pub fn evaporation_matrix(document: &WorldDocument) -> Option<Matrix> {
        let terrain = document.terrain();
        terrain
            .evaporation()
            .and_then(|values| Matrix::from_values(terrain.dims(), values.to_vec()).ok())
    }

    /// Number of tiles above the soil contamination threshold.
    #[must_use]
    pub fn contaminated_soil_tiles(document: &WorldDocument) -> usize {
        document
            .terrain()
            .tiles()
            .iter()
            .filter(|t| t.is_soil_contaminated())
            .count()
    }

    /// Current phase, remaining days and the next scheduled phases.
    #[must_use]
    pub fn weather_summary(&self, document: &WorldDocument) -> WeatherSummary {
        summarize(
            document.weather(),
            document.time(),
            document.settings(),
            self.upcoming_phases,
        )
    }

    /// Bundles every metric with the document's game time.
    #[must_use]
    pub fn snapshot(&self, document: &WorldDocument) -> MetricsSnapshot {
        let time = document.time();
        let terrain = document.terrain();
        let snapshot = MetricsSnapshot {
            day: time.day,
            cycle: time.cycle,
            timestamp: document.timestamp().map(str::to_string),
            width: terrain.width(),
            height: terrain.height(),
            total_clean_water: Self::total_clean_water(document),
            water_matrix: Self::water_matrix(document),
            contamination_matrix: Self::contamination_matrix(document),
            moisture_matrix: Self::moisture_matrix(document),
            soil_contamination_matrix: Self::soil_contamination_matrix(document),
            evaporation_matrix: Self::evaporation_matrix(document),
            contaminated_soil_tiles: Self::contaminated_soil_tiles(document),
            weather: self.weather_summary(document),
        };
        debug!(
            "Snapshot day {} cycle {}: {:.2} clean water",
            snapshot.day, snapshot.cycle, snapshot.total_clean_water
        );
        snapshot
    }
}

/// Clean water over a grid.
#[must_use]
pub fn clean_water_of(grid: &TerrainGrid) -> f64 {
    let per_tile: Vec<f64> = grid.tiles().iter().map(Tile::clean_water).collect();
    sum_rows(&per_tile, grid.width())
}

fn summarize(
    weather: &WeatherState,
    time: GameTime,
    settings: &WeatherSettings,
    upcoming: usize,
) -> WeatherSummary {
    WeatherSummary {
        phase: weather.phase,
        remaining_days: weather.remaining_days,
        day: time.day,
        cycle: time.cycle,
        temperate_duration: weather.temperate_duration,
        hazardous_duration: weather.hazardous_duration,
        hazardous_phase: weather.hazardous_phase,
        upcoming: weather.schedule(time, settings, upcoming),
    }
}
