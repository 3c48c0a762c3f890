//! Weather duration settings and the mutator that edits them.
//!
//! The game stores min/max durations for each weather phase in three
//! services. Updates arrive as loosely typed values (numbers or numeric
//! strings from a form) and are validated against an explicit key set
//! before anything is changed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use timber_common::{TimberError, TimberResult};
use tracing::{debug, info};

use crate::codec::WorldDocument;
use crate::layout;
use crate::world::WeatherPhase;

/// Inclusive duration range in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DurationRange {
    /// Shortest duration.
    pub min: u32,
    /// Longest duration.
    pub max: u32,
}

impl DurationRange {
    /// Creates a range.
    #[must_use]
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }
}

/// Weather phase duration settings of a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeatherSettings {
    /// Temperate phase duration.
    pub temperate: DurationRange,
    /// Drought duration.
    pub drought: DurationRange,
    /// Badtide duration.
    pub badtide: DurationRange,
}

impl WeatherSettings {
    pub(crate) fn from_singletons(singletons: &Map<String, Value>) -> TimberResult<Self> {
        let read = |key: SettingKey| {
            let (service, field) = key.location();
            layout::read_u32(singletons, service, field)
        };
        Ok(Self {
            temperate: DurationRange::new(
                read(SettingKey::TemperateMin)?,
                read(SettingKey::TemperateMax)?,
            ),
            drought: DurationRange::new(read(SettingKey::DroughtMin)?, read(SettingKey::DroughtMax)?),
            badtide: DurationRange::new(read(SettingKey::BadtideMin)?, read(SettingKey::BadtideMax)?),
        })
    }

    /// Writes the values that differ from `base`; other fields stay as stored.
    pub(crate) fn write_changes(
        &self,
        base: &Self,
        singletons: &mut Map<String, Value>,
    ) -> TimberResult<()> {
        for key in SettingKey::ALL.into_iter().filter(|&k| self.get(k) != base.get(k)) {
            let (service, field) = key.location();
            layout::write_u32(singletons, service, field, self.get(key))?;
        }
        Ok(())
    }

    /// Range for a phase.
    #[must_use]
    pub fn range(&self, phase: WeatherPhase) -> DurationRange {
        match phase {
            WeatherPhase::Temperate => self.temperate,
            WeatherPhase::Drought => self.drought,
            WeatherPhase::Badtide => self.badtide,
        }
    }

    fn range_mut(&mut self, phase: WeatherPhase) -> &mut DurationRange {
        match phase {
            WeatherPhase::Temperate => &mut self.temperate,
            WeatherPhase::Drought => &mut self.drought,
            WeatherPhase::Badtide => &mut self.badtide,
        }
    }

    /// Value of a single setting.
    #[must_use]
    pub fn get(&self, key: SettingKey) -> u32 {
        let range = self.range(key.phase());
        if key.is_min() {
            range.min
        } else {
            range.max
        }
    }

    fn set(&mut self, key: SettingKey, days: u32) {
        let range = self.range_mut(key.phase());
        if key.is_min() {
            range.min = days;
        } else {
            range.max = days;
        }
    }
}

/// A single stored setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingKey {
    /// Minimum temperate duration.
    TemperateMin,
    /// Maximum temperate duration.
    TemperateMax,
    /// Minimum drought duration.
    DroughtMin,
    /// Maximum drought duration.
    DroughtMax,
    /// Minimum badtide duration.
    BadtideMin,
    /// Maximum badtide duration.
    BadtideMax,
}

impl SettingKey {
    /// Every stored setting.
    pub const ALL: [Self; 6] = [
        Self::TemperateMin,
        Self::TemperateMax,
        Self::DroughtMin,
        Self::DroughtMax,
        Self::BadtideMin,
        Self::BadtideMax,
    ];

    /// Key used in update maps.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TemperateMin => "temperate_min",
            Self::TemperateMax => "temperate_max",
            Self::DroughtMin => "drought_min",
            Self::DroughtMax => "drought_max",
            Self::BadtideMin => "badtide_min",
            Self::BadtideMax => "badtide_max",
        }
    }

    /// Service and field holding the value in the world.
    #[must_use]
    pub const fn location(&self) -> (&'static str, &'static str) {
        match self {
            Self::TemperateMin => ("TemperateWeatherDurationService", "MinTemperateWeatherDuration"),
            Self::TemperateMax => ("TemperateWeatherDurationService", "MaxTemperateWeatherDuration"),
            Self::DroughtMin => ("DroughtWeather", "MinDroughtDuration"),
            Self::DroughtMax => ("DroughtWeather", "MaxDroughtDuration"),
            Self::BadtideMin => ("BadtideWeather", "MinBadtideWeatherDuration"),
            Self::BadtideMax => ("BadtideWeather", "MaxBadtideWeatherDuration"),
        }
    }

    /// Phase the setting belongs to.
    #[must_use]
    pub const fn phase(&self) -> WeatherPhase {
        match self {
            Self::TemperateMin | Self::TemperateMax => WeatherPhase::Temperate,
            Self::DroughtMin | Self::DroughtMax => WeatherPhase::Drought,
            Self::BadtideMin | Self::BadtideMax => WeatherPhase::Badtide,
        }
    }

    /// Whether this is the lower bound of its range.
    #[must_use]
    pub const fn is_min(&self) -> bool {
        matches!(self, Self::TemperateMin | Self::DroughtMin | Self::BadtideMin)
    }
}

/// What an update key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateTarget {
    /// One bound.
    Single(SettingKey),
    /// Both bounds of a phase (`*_duration` shorthand).
    Fixed(WeatherPhase),
}

impl UpdateTarget {
    fn parse(name: &str) -> Option<Self> {
        if let Some(key) = SettingKey::ALL.into_iter().find(|k| k.name() == name) {
            return Some(Self::Single(key));
        }
        match name {
            "temperate_duration" => Some(Self::Fixed(WeatherPhase::Temperate)),
            "drought_duration" => Some(Self::Fixed(WeatherPhase::Drought)),
            "badtide_duration" => Some(Self::Fixed(WeatherPhase::Badtide)),
            _ => None,
        }
    }

    fn phase(self) -> WeatherPhase {
        match self {
            Self::Single(key) => key.phase(),
            Self::Fixed(phase) => phase,
        }
    }
}

/// Parses a duration in whole days (>= 1).
fn parse_days(key: &str, value: &Value) -> TimberResult<u32> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| TimberError::validation(key, format!("expected a number of days, got {value}")))?;

    if !number.is_finite() || number.fract() != 0.0 {
        return Err(TimberError::validation(key, "must be a whole number of days"));
    }
    if number < 1.0 {
        return Err(TimberError::validation(
            key,
            format!("must be a positive duration, got {number}"),
        ));
    }
    if number > f64::from(u32::MAX) {
        return Err(TimberError::validation(key, "duration is too large"));
    }
    Ok(number as u32)
}

/// Reads and edits the weather settings of a document.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettingsMutator;

impl SettingsMutator {
    /// Snapshot of the stored settings keyed by setting name.
    #[must_use]
    pub fn current(document: &WorldDocument) -> BTreeMap<&'static str, u32> {
        let settings = document.settings();
        SettingKey::ALL
            .into_iter()
            .map(|key| (key.name(), settings.get(key)))
            .collect()
    }

    /// Returns a copy of `document` with `updates` applied.
    ///
    /// All-or-nothing: any unknown key or invalid value fails the whole
    /// update and `document` is left as it was. `*_duration` shorthands
    /// are applied before individual bounds, so `drought_min` wins over
    /// `drought_duration` when both are given.
    pub fn apply(
        document: &WorldDocument,
        updates: &BTreeMap<String, Value>,
    ) -> TimberResult<WorldDocument> {
        let mut parsed = Vec::with_capacity(updates.len());
        for (name, value) in updates {
            let target =
                UpdateTarget::parse(name).ok_or_else(|| TimberError::UnknownSetting(name.clone()))?;
            parsed.push((name.as_str(), target, parse_days(name, value)?));
        }
        // Shorthands first, then individual bounds
        parsed.sort_by_key(|(_, target, _)| matches!(target, UpdateTarget::Single(_)));

        let mut settings = *document.settings();
        for &(_, target, days) in &parsed {
            match target {
                UpdateTarget::Single(key) => settings.set(key, days),
                UpdateTarget::Fixed(phase) => *settings.range_mut(phase) = DurationRange::new(days, days),
            }
        }

        for &(name, target, _) in &parsed {
            let range = settings.range(target.phase());
            if range.min > range.max {
                return Err(TimberError::validation(
                    name,
                    format!(
                        "{} minimum ({}) exceeds maximum ({})",
                        target.phase(),
                        range.min,
                        range.max
                    ),
                ));
            }
        }

        if parsed.is_empty() {
            debug!("Empty settings update");
        } else {
            info!("Applied {} setting update(s)", parsed.len());
        }
        let mut updated = document.clone();
        updated.replace_settings(settings);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_days() {
        assert_eq!(parse_days("k", &json!(5)).expect("int"), 5);
        assert_eq!(parse_days("k", &json!(5.0)).expect("float"), 5);
        assert_eq!(parse_days("k", &json!(" 12 ")).expect("string"), 12);

        for bad in [json!(0), json!(-1), json!(2.5), json!("abc"), json!(null), json!(true)] {
            match parse_days("drought_min", &bad) {
                Err(TimberError::Validation { key, .. }) => assert_eq!(key, "drought_min"),
                other => panic!("expected validation error for {bad}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_update_target_names() {
        assert_eq!(
            UpdateTarget::parse("badtide_max"),
            Some(UpdateTarget::Single(SettingKey::BadtideMax))
        );
        assert_eq!(
            UpdateTarget::parse("drought_duration"),
            Some(UpdateTarget::Fixed(WeatherPhase::Drought))
        );
        assert_eq!(UpdateTarget::parse("drougth_min"), None);
    }

    #[test]
    fn test_settings_get_set() {
        let mut settings = WeatherSettings {
            temperate: DurationRange::new(1, 2),
            drought: DurationRange::new(3, 4),
            badtide: DurationRange::new(5, 6),
        };
        assert_eq!(settings.get(SettingKey::DroughtMax), 4);
        settings.set(SettingKey::BadtideMin, 9);
        assert_eq!(settings.badtide, DurationRange::new(9, 6));
        assert_eq!(settings.range(WeatherPhase::Temperate), DurationRange::new(1, 2));
    }

    #[test]
    fn test_key_locations_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for key in SettingKey::ALL {
            assert!(seen.insert(key.location()));
            assert_eq!(key.is_min(), key.name().ends_with("_min"));
        }
    }
}
