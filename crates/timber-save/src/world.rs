//! Typed view of a decoded world.
//!
//! This module provides the world state the metrics and settings layers
//! work with:
//! - Terrain grid of tiles (water, contamination, moisture, soil)
//! - Cycle and day counters
//! - Weather phase, remaining days and the upcoming schedule

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use timber_common::{GridCoord, GridDims, TimberError, TimberResult};
use tracing::warn;

use crate::layout;
use crate::settings::WeatherSettings;

/// Water depth below which contamination is measured against this floor.
pub const CONTAMINATION_EPSILON: f64 = 1e-6;

/// Soil contamination level above which a tile counts as contaminated.
pub const SOIL_CONTAMINATION_THRESHOLD: f64 = 0.1;

// ============================================================================
// Tiles
// ============================================================================

/// Number of values outside `min..=max`.
fn out_of_range(values: &[f64], min: f64, max: f64) -> usize {
    values.iter().filter(|v| !(min..=max).contains(*v)).count()
}

/// One terrain cell.
///
/// Only base scalars are stored; percentages are derived on demand.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Tile {
    /// Standing water depth (>= 0).
    pub water_depth: f64,
    /// Contamination carried by the water (>= 0).
    pub contamination: f64,
    /// Soil moisture in [0, 1].
    pub moisture: f64,
    /// Ground contamination in [0, 1].
    pub soil_contamination: f64,
}

impl Tile {
    /// Creates a tile, clamping each scalar into its domain.
    #[must_use]
    pub fn new(water_depth: f64, contamination: f64, moisture: f64, soil_contamination: f64) -> Self {
        Self {
            water_depth: water_depth.max(0.0),
            contamination: contamination.max(0.0),
            moisture: moisture.clamp(0.0, 1.0),
            soil_contamination: soil_contamination.clamp(0.0, 1.0),
        }
    }

    /// Share of the water that is contaminated, in [0, 1].
    #[must_use]
    pub fn contamination_percentage(&self) -> f64 {
        (self.contamination / self.water_depth.max(CONTAMINATION_EPSILON)).clamp(0.0, 1.0)
    }

    /// Uncontaminated part of the standing water.
    #[must_use]
    pub fn clean_water(&self) -> f64 {
        if self.water_depth <= 0.0 {
            return 0.0;
        }
        self.water_depth * (1.0 - self.contamination_percentage())
    }

    /// Whether the ground counts as contaminated.
    #[must_use]
    pub fn is_soil_contaminated(&self) -> bool {
        self.soil_contamination > SOIL_CONTAMINATION_THRESHOLD
    }
}

// ============================================================================
// Terrain
// ============================================================================

/// Row-major grid of tiles with fixed dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainGrid {
    dims: GridDims,
    tiles: Vec<Tile>,
    evaporation: Option<Vec<f64>>,
}

impl TerrainGrid {
    /// Creates a grid, checking that the tile count matches the dimensions.
    pub fn new(dims: GridDims, tiles: Vec<Tile>) -> TimberResult<Self> {
        if tiles.len() != dims.len() || dims.is_empty() {
            return Err(TimberError::corrupt(
                "terrain",
                format!(
                    "{} tiles do not fill a {}x{} grid",
                    tiles.len(),
                    dims.rows,
                    dims.cols
                ),
            ));
        }
        Ok(Self {
            dims,
            tiles,
            evaporation: None,
        })
    }

    /// Attaches per-tile evaporation modifiers.
    pub fn with_evaporation(mut self, modifiers: Vec<f64>) -> TimberResult<Self> {
        if modifiers.len() != self.dims.len() {
            return Err(TimberError::corrupt(
                "WaterEvaporationMap.EvaporationModifiers",
                format!("expected {} values, found {}", self.dims.len(), modifiers.len()),
            ));
        }
        self.evaporation = Some(modifiers);
        Ok(self)
    }

    pub(crate) fn from_singletons(singletons: &Map<String, Value>) -> TimberResult<Self> {
        let dims = layout::read_dims(singletons)?;
        let grid = |service: &str, field: &str| -> TimberResult<Vec<f64>> {
            layout::read_grid(singletons, service, field, dims, true)?
                .ok_or_else(|| TimberError::corrupt(service, "service is missing"))
        };

        let water = grid("WaterMap", "WaterDepths")?;
        let contamination = grid("ContaminationMap", "Contaminations")?;
        let moisture = grid("SoilMoistureSimulator", "MoistureLevels")?;
        let soil = grid("SoilContaminationSimulator", "ContaminationLevels")?;

        for (section, values, max) in [
            ("WaterMap.WaterDepths", &water, f64::INFINITY),
            ("ContaminationMap.Contaminations", &contamination, f64::INFINITY),
            ("SoilMoistureSimulator.MoistureLevels", &moisture, 1.0),
            ("SoilContaminationSimulator.ContaminationLevels", &soil, 1.0),
        ] {
            let clamped = out_of_range(values, 0.0, max);
            if clamped > 0 {
                warn!("{section}: clamped {clamped} value(s) outside 0..={max}");
            }
        }

        let tiles = (0..dims.len())
            .map(|i| Tile::new(water[i], contamination[i], moisture[i], soil[i]))
            .collect();
        let grid = Self::new(dims, tiles)?;

        match layout::read_grid(
            singletons,
            "WaterEvaporationMap",
            "EvaporationModifiers",
            dims,
            false,
        )? {
            Some(modifiers) => grid.with_evaporation(modifiers),
            None => Ok(grid),
        }
    }

    /// Grid dimensions.
    #[must_use]
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Map width (columns).
    #[must_use]
    pub fn width(&self) -> usize {
        self.dims.cols
    }

    /// Map height (rows).
    #[must_use]
    pub fn height(&self) -> usize {
        self.dims.rows
    }

    /// Tile at `(row, col)`.
    pub fn tile(&self, row: usize, col: usize) -> TimberResult<&Tile> {
        let index = self.dims.index_of(GridCoord::new(row, col))?;
        Ok(&self.tiles[index])
    }

    /// All tiles in row-major order.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Iterates rows as slices.
    pub fn rows(&self) -> impl Iterator<Item = &[Tile]> {
        self.tiles.chunks(self.dims.cols)
    }

    /// Evaporation modifiers in row-major order, when the save has them.
    #[must_use]
    pub fn evaporation(&self) -> Option<&[f64]> {
        self.evaporation.as_deref()
    }
}

// ============================================================================
// Time
// ============================================================================

/// In-game time counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GameTime {
    /// Day within the current cycle (1-based).
    pub day: u32,
    /// Cycle number.
    pub cycle: u32,
}

impl GameTime {
    /// Creates a time value.
    #[must_use]
    pub const fn new(day: u32, cycle: u32) -> Self {
        Self { day, cycle }
    }

    pub(crate) fn from_singletons(singletons: &Map<String, Value>) -> TimberResult<Self> {
        Ok(Self {
            day: layout::read_u32(singletons, "WeatherService", "CycleDay")?,
            cycle: layout::read_u32(singletons, "WeatherService", "Cycle")?,
        })
    }
}

// ============================================================================
// Weather
// ============================================================================

/// Recurring climate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeatherPhase {
    /// Normal weather, rivers flow.
    Temperate,
    /// Hazardous: water sources dry up.
    Drought,
    /// Hazardous: water sources turn contaminated.
    Badtide,
}

impl WeatherPhase {
    /// Get display name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Temperate => "Temperate",
            Self::Drought => "Drought",
            Self::Badtide => "Badtide",
        }
    }

    /// Whether the phase is hazardous.
    #[must_use]
    pub const fn is_hazardous(&self) -> bool {
        !matches!(self, Self::Temperate)
    }
}

impl std::fmt::Display for WeatherPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A phase expected to follow the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledPhase {
    /// Cycle the phase belongs to.
    pub cycle: u32,
    /// Phase, or `None` for a hazardous phase whose kind the game has not rolled yet.
    pub phase: Option<WeatherPhase>,
    /// Shortest expected duration in days.
    pub min_days: u32,
    /// Longest expected duration in days.
    pub max_days: u32,
}

/// Weather state of the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherState {
    /// Current phase.
    pub phase: WeatherPhase,
    /// Days left in the current phase, including today.
    pub remaining_days: u32,
    /// Length of this cycle's temperate phase.
    pub temperate_duration: u32,
    /// Length of this cycle's hazardous phase.
    pub hazardous_duration: u32,
    /// Kind of this cycle's hazardous phase.
    pub hazardous_phase: WeatherPhase,
}

impl WeatherState {
    /// Derives the phase for a day of the cycle.
    #[must_use]
    pub fn at_day(
        day: u32,
        temperate_duration: u32,
        hazardous_duration: u32,
        is_drought: bool,
    ) -> Self {
        let hazardous_phase = if is_drought {
            WeatherPhase::Drought
        } else {
            WeatherPhase::Badtide
        };
        let (phase, end) = if day <= temperate_duration {
            (WeatherPhase::Temperate, temperate_duration)
        } else {
            (hazardous_phase, temperate_duration + hazardous_duration)
        };
        Self {
            phase,
            remaining_days: (end + 1).saturating_sub(day),
            temperate_duration,
            hazardous_duration,
            hazardous_phase,
        }
    }

    pub(crate) fn from_singletons(
        singletons: &Map<String, Value>,
        time: GameTime,
    ) -> TimberResult<Self> {
        Ok(Self::at_day(
            time.day,
            layout::read_u32(singletons, "WeatherService", "TemperateWeatherDuration")?,
            layout::read_u32(singletons, "HazardousWeatherService", "HazardousWeatherDuration")?,
            layout::read_bool(singletons, "HazardousWeatherService", "IsDrought")?,
        ))
    }

    /// Lists up to `count` phases after the current one.
    ///
    /// The rest of this cycle is exact; later cycles use the configured
    /// duration ranges.
    #[must_use]
    pub fn schedule(&self, time: GameTime, settings: &WeatherSettings, count: usize) -> Vec<ScheduledPhase> {
        let mut upcoming = Vec::with_capacity(count);
        if self.phase == WeatherPhase::Temperate {
            upcoming.push(ScheduledPhase {
                cycle: time.cycle,
                phase: Some(self.hazardous_phase),
                min_days: self.hazardous_duration,
                max_days: self.hazardous_duration,
            });
        }

        let hazard_min = settings.drought.min.min(settings.badtide.min);
        let hazard_max = settings.drought.max.max(settings.badtide.max);
        let mut cycle = time.cycle;
        while upcoming.len() < count {
            cycle = cycle.saturating_add(1);
            upcoming.push(ScheduledPhase {
                cycle,
                phase: Some(WeatherPhase::Temperate),
                min_days: settings.temperate.min,
                max_days: settings.temperate.max,
            });
            upcoming.push(ScheduledPhase {
                cycle,
                phase: None,
                min_days: hazard_min,
                max_days: hazard_max,
            });
        }
        upcoming.truncate(count);
        upcoming
    }
}
