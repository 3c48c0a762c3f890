//! Save file codec.
//!
//! Decodes `.timber` containers into a [`WorldDocument`] and encodes them
//! back. An unchanged document encodes to the exact bytes it was decoded
//! from; after a settings edit only the world entry is rewritten.

use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use timber_common::fs::{atomic_write, retry_once};
use timber_common::{SchemaVersion, TimberError, TimberResult};
use tracing::{debug, info, warn};

use crate::compression::{CompressionLevel, EntryCompression};
use crate::container::Archive;
use crate::layout::{GAME_VERSION, SINGLETONS, TIMESTAMP, WORLD_ENTRY};
use crate::settings::WeatherSettings;
use crate::world::{GameTime, TerrainGrid, Tile, WeatherState};

/// File extension of save files.
pub const SAVE_EXTENSION: &str = "timber";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A decoded save.
///
/// Owns the raw container so untouched sections can be written back
/// verbatim.
#[derive(Debug, Clone)]
pub struct WorldDocument {
    archive: Archive,
    world_index: usize,
    world_compression: EntryCompression,
    has_bom: bool,
    world: Map<String, Value>,
    format_version: SchemaVersion,
    terrain: TerrainGrid,
    time: GameTime,
    weather: WeatherState,
    settings: WeatherSettings,
    decoded_settings: WeatherSettings,
}

impl WorldDocument {
    /// Decodes container bytes.
    pub fn decode(bytes: &[u8]) -> TimberResult<Self> {
        let archive = Archive::parse(bytes)?;
        let world_index = archive
            .position(WORLD_ENTRY)
            .ok_or_else(|| TimberError::corrupt(WORLD_ENTRY, "section is missing"))?;
        let entry = &archive.entries()[world_index];

        if entry.is_encrypted() {
            return Err(TimberError::Format(format!("{WORLD_ENTRY} is encrypted")));
        }
        let world_compression = EntryCompression::from_method(entry.method()).ok_or_else(|| {
            TimberError::Format(format!(
                "{WORLD_ENTRY} uses unsupported compression method {}",
                entry.method()
            ))
        })?;

        let raw = world_compression.decompress(entry.data(), entry.uncompressed_size())?;
        if raw.len() != entry.uncompressed_size() || crc32fast::hash(&raw) != entry.crc32() {
            return Err(TimberError::corrupt(WORLD_ENTRY, "checksum mismatch"));
        }

        let has_bom = raw.starts_with(UTF8_BOM);
        let text = if has_bom { &raw[UTF8_BOM.len()..] } else { &raw[..] };
        let world = match serde_json::from_slice::<Value>(text) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(TimberError::corrupt(WORLD_ENTRY, "root is not an object")),
            Err(e) => return Err(TimberError::corrupt(WORLD_ENTRY, e.to_string())),
        };

        let version_text = world
            .get(GAME_VERSION)
            .and_then(Value::as_str)
            .ok_or_else(|| TimberError::corrupt(GAME_VERSION, "field is missing"))?;
        let format_version: SchemaVersion = version_text.parse()?;
        if !format_version.is_supported() {
            return Err(TimberError::UnsupportedVersion {
                found: version_text.to_string(),
                supported: SchemaVersion::supported_lines(),
            });
        }

        let singletons = world
            .get(SINGLETONS)
            .and_then(Value::as_object)
            .ok_or_else(|| TimberError::corrupt(SINGLETONS, "section is missing"))?;
        let terrain = TerrainGrid::from_singletons(singletons)?;
        let time = GameTime::from_singletons(singletons)?;
        let weather = WeatherState::from_singletons(singletons, time)?;
        let settings = WeatherSettings::from_singletons(singletons)?;

        debug!(
            "Decoded world v{format_version}: {}x{} map, {} sections",
            terrain.width(),
            terrain.height(),
            archive.entries().len()
        );

        Ok(Self {
            archive,
            world_index,
            world_compression,
            has_bom,
            world,
            format_version,
            terrain,
            time,
            weather,
            settings,
            decoded_settings: settings,
        })
    }

    /// Encodes the document with the default compression level.
    pub fn encode(&self) -> TimberResult<Vec<u8>> {
        self.encode_with(CompressionLevel::default())
    }

    /// Encodes the document.
    ///
    /// `level` only matters when the world section has to be re-compressed.
    pub fn encode_with(&self, level: CompressionLevel) -> TimberResult<Vec<u8>> {
        if !self.is_modified() {
            return self.archive.to_bytes();
        }

        let mut world = self.world.clone();
        let singletons = world
            .get_mut(SINGLETONS)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| TimberError::corrupt(SINGLETONS, "section is missing"))?;
        self.settings.write_changes(&self.decoded_settings, singletons)?;

        let mut payload = Vec::new();
        if self.has_bom {
            payload.extend_from_slice(UTF8_BOM);
        }
        serde_json::to_writer(&mut payload, &world)
            .map_err(|e| TimberError::corrupt(WORLD_ENTRY, e.to_string()))?;

        let mut archive = self.archive.clone();
        archive
            .entry_mut(self.world_index)
            .ok_or_else(|| TimberError::corrupt(WORLD_ENTRY, "section is missing"))?
            .replace_payload(&payload, self.world_compression, level)?;
        archive.to_bytes()
    }

    /// Whether the settings differ from the decoded ones.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.settings != self.decoded_settings
    }

    /// Game version the save was written by.
    #[must_use]
    pub fn format_version(&self) -> SchemaVersion {
        self.format_version
    }

    /// Top-level world members other than the services, in file order.
    pub fn metadata(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.world
            .iter()
            .filter(|(key, _)| key.as_str() != SINGLETONS)
            .map(|(key, value)| (key.as_str(), value))
    }

    /// Save timestamp as written by the game.
    #[must_use]
    pub fn timestamp(&self) -> Option<&str> {
        self.world.get(TIMESTAMP).and_then(Value::as_str)
    }

    /// Section identifiers in container order.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.archive.entries().iter().map(crate::container::Entry::name)
    }

    /// Terrain grid.
    #[must_use]
    pub fn terrain(&self) -> &TerrainGrid {
        &self.terrain
    }

    /// Tile at `(row, col)`.
    pub fn tile(&self, row: usize, col: usize) -> TimberResult<&Tile> {
        self.terrain.tile(row, col)
    }

    /// Current time.
    #[must_use]
    pub fn time(&self) -> GameTime {
        self.time
    }

    /// Current weather.
    #[must_use]
    pub fn weather(&self) -> &WeatherState {
        &self.weather
    }

    /// Current weather settings.
    #[must_use]
    pub fn settings(&self) -> &WeatherSettings {
        &self.settings
    }

    pub(crate) fn replace_settings(&mut self, settings: WeatherSettings) {
        self.settings = settings;
    }
}

/// A save file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveFileInfo {
    /// Full path.
    pub path: PathBuf,
    /// File name including extension.
    pub name: String,
    /// Last modification time.
    pub modified: SystemTime,
    /// Size in bytes.
    pub size: u64,
}

/// Reads and writes saves in one directory.
#[derive(Debug, Clone)]
pub struct SaveDirectory {
    dir: PathBuf,
}

impl SaveDirectory {
    /// Creates a handle for `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Lists save files, newest first.
    pub fn list_save_files(&self) -> TimberResult<Vec<SaveFileInfo>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| TimberError::io(&self.dir, e))?;

        let mut saves = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TimberError::io(&self.dir, e))?;
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == SAVE_EXTENSION) {
                continue;
            }
            // The game may delete a save while we scan
            let metadata = match entry.metadata() {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Skipping {}: {e}", path.display());
                    continue;
                },
            };
            saves.push(SaveFileInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                size: metadata.len(),
                path,
            });
        }

        if saves.is_empty() {
            return Err(TimberError::NoSaveFiles {
                directory: self.dir.clone(),
            });
        }

        // Sort by modification time (newest first), name breaks ties
        saves.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.name.cmp(&a.name)));
        Ok(saves)
    }

    /// Decodes one save file.
    ///
    /// A failed read or decode is retried once, since the game may still be
    /// writing the file.
    pub fn load(&self, path: &Path) -> TimberResult<WorldDocument> {
        load_with(path, || fs::read(path).map_err(|e| TimberError::io(path, e)))
    }

    /// Decodes the most recent save.
    pub fn latest(&self) -> TimberResult<WorldDocument> {
        let saves = self.list_save_files()?;
        let newest = &saves[0];
        info!("Loading latest save {}", newest.name);
        self.load(&newest.path)
    }

    /// Path a save named `filename` is written to.
    pub fn save_path(&self, filename: &str) -> TimberResult<PathBuf> {
        let invalid = |reason: &str| {
            TimberError::io(
                self.dir.join(filename),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, reason.to_string()),
            )
        };
        if filename.is_empty() || filename.contains(['/', '\\']) || filename.starts_with('.') {
            return Err(invalid("save name must be a plain file name"));
        }

        let mut path = self.dir.join(filename);
        if !path.extension().is_some_and(|ext| ext == SAVE_EXTENSION) {
            path = self.dir.join(format!("{filename}.{SAVE_EXTENSION}"));
        }
        Ok(path)
    }

    /// Encodes `document` and atomically writes it as `filename`.
    ///
    /// Uses atomic write (write to temp, then rename) for safety.
    pub fn write(&self, filename: &str, document: &WorldDocument) -> TimberResult<PathBuf> {
        self.write_with(filename, document, CompressionLevel::default())
    }

    /// Same as [`Self::write`] with an explicit compression level.
    pub fn write_with(
        &self,
        filename: &str,
        document: &WorldDocument,
        level: CompressionLevel,
    ) -> TimberResult<PathBuf> {
        let path = self.save_path(filename)?;
        let bytes = document.encode_with(level)?;
        atomic_write(&path, &bytes)?;
        info!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

fn load_with(
    path: &Path,
    mut read: impl FnMut() -> TimberResult<Vec<u8>>,
) -> TimberResult<WorldDocument> {
    retry_once(path, || WorldDocument::decode(&read()?)).map_err(|e| {
        warn!("Failed to load {}: {e}", path.display());
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn world(version: &str) -> Value {
        json!({
            "GameVersion": version,
            "Timestamp": "2024-03-01 10:00:00",
            "Singletons": {
                "MapSize": {"Size": {"X": 2, "Y": 1}},
                "WaterMap": {"WaterDepths": {"Array": "1 0"}},
                "ContaminationMap": {"Contaminations": {"Array": "0.5 0"}},
                "SoilMoistureSimulator": {"MoistureLevels": {"Array": "0.2 0.4"}},
                "SoilContaminationSimulator": {"ContaminationLevels": {"Array": "0 0"}},
                "WeatherService": {"Cycle": 2, "CycleDay": 3, "TemperateWeatherDuration": 8},
                "HazardousWeatherService": {"HazardousWeatherDuration": 4, "IsDrought": true},
                "TemperateWeatherDurationService": {"MinTemperateWeatherDuration": 7, "MaxTemperateWeatherDuration": 11},
                "DroughtWeather": {"MinDroughtDuration": 2, "MaxDroughtDuration": 5},
                "BadtideWeather": {"MinBadtideWeatherDuration": 3, "MaxBadtideWeatherDuration": 6}
            },
            "Entities": []
        })
    }

    fn container(world: &Value) -> Vec<u8> {
        let mut archive = Archive::default();
        let payload = serde_json::to_vec(world).expect("json");
        archive
            .push_entry(WORLD_ENTRY, &payload, EntryCompression::Deflate, CompressionLevel::Normal)
            .expect("push");
        archive.to_bytes().expect("bytes")
    }

    #[test]
    fn test_decode_minimal_world() {
        let doc = WorldDocument::decode(&container(&world("0.5.9.1-abc"))).expect("decode");

        assert_eq!(doc.format_version(), SchemaVersion::new(0, 5, 9));
        assert_eq!(doc.time(), GameTime::new(3, 2));
        assert_eq!(doc.terrain().width(), 2);
        assert_eq!(doc.terrain().height(), 1);
        assert_eq!(doc.tile(0, 0).expect("tile").water_depth, 1.0);
        assert_eq!(doc.timestamp(), Some("2024-03-01 10:00:00"));
        assert_eq!(doc.settings().drought.max, 5);
        assert!(!doc.is_modified());

        let keys: Vec<&str> = doc.metadata().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["GameVersion", "Timestamp", "Entities"]);
        assert_eq!(doc.sections().collect::<Vec<_>>(), vec![WORLD_ENTRY]);
    }

    #[test]
    fn test_unsupported_version() {
        let result = WorldDocument::decode(&container(&world("0.2.1")));
        assert!(matches!(result, Err(TimberError::UnsupportedVersion { found, .. }) if found == "0.2.1"));
    }

    #[test]
    fn test_missing_world_section() {
        let mut archive = Archive::default();
        archive
            .push_entry("other.bin", b"x", EntryCompression::Stored, CompressionLevel::Normal)
            .expect("push");
        let result = WorldDocument::decode(&archive.to_bytes().expect("bytes"));
        assert!(matches!(result, Err(TimberError::CorruptData { section, .. }) if section == WORLD_ENTRY));
    }

    #[test]
    fn test_bom_is_preserved_on_rewrite() {
        let mut payload = UTF8_BOM.to_vec();
        payload.extend(serde_json::to_vec(&world("0.6.0")).expect("json"));
        let mut archive = Archive::default();
        archive
            .push_entry(WORLD_ENTRY, &payload, EntryCompression::Stored, CompressionLevel::Normal)
            .expect("push");

        let mut doc = WorldDocument::decode(&archive.to_bytes().expect("bytes")).expect("decode");
        let mut settings = *doc.settings();
        settings.drought.max = 9;
        doc.replace_settings(settings);

        let encoded = doc.encode().expect("encode");
        let reparsed = Archive::parse(&encoded).expect("parse");
        let entry = reparsed.entry(WORLD_ENTRY).expect("world");
        assert_eq!(entry.method(), EntryCompression::Stored.method());
        assert!(entry.data().starts_with(UTF8_BOM));
        assert_eq!(WorldDocument::decode(&encoded).expect("decode").settings().drought.max, 9);
    }

    #[test]
    fn test_edit_keeps_untouched_settings_as_stored() {
        let mut source = world("0.5.9.1");
        source["Singletons"]["DroughtWeather"]["MaxDroughtDuration"] = json!(5.0);
        let mut doc = WorldDocument::decode(&container(&source)).expect("decode");

        let mut settings = *doc.settings();
        settings.temperate.min = 8;
        doc.replace_settings(settings);

        let encoded = Archive::parse(&doc.encode().expect("encode")).expect("parse");
        let entry = encoded.entry(WORLD_ENTRY).expect("world");
        let raw = EntryCompression::Deflate
            .decompress(entry.data(), entry.uncompressed_size())
            .expect("inflate");
        let written: Value = serde_json::from_slice(&raw).expect("json");
        let services = &written["Singletons"];

        assert_eq!(services["TemperateWeatherDurationService"]["MinTemperateWeatherDuration"], json!(8));
        assert_eq!(services["TemperateWeatherDurationService"]["MaxTemperateWeatherDuration"], json!(11));
        let untouched = &services["DroughtWeather"]["MaxDroughtDuration"];
        assert!(untouched.is_f64(), "expected 5.0 to stay a float, got {untouched}");
        assert_eq!(untouched.as_f64(), Some(5.0));
    }

    #[test]
    fn test_load_retries_a_partially_written_save() {
        let full = container(&world("0.5.9.1"));
        let partial = full[..full.len() / 2].to_vec();
        let mut reads = 0;

        let doc = load_with(Path::new("Autosave.timber"), || {
            reads += 1;
            Ok(if reads == 1 { partial.clone() } else { full.clone() })
        })
        .expect("second read decodes");
        assert_eq!(reads, 2);
        assert_eq!(doc.time(), GameTime::new(3, 2));
    }

    #[test]
    fn test_load_gives_up_after_one_retry() {
        let mut reads = 0;
        let result = load_with(Path::new("Autosave.timber"), || {
            reads += 1;
            Ok(b"PK not really".to_vec())
        });
        assert_eq!(reads, 2);
        assert!(matches!(result, Err(TimberError::Format(_))));

        let mut reads = 0;
        let result = load_with(Path::new("gone.timber"), || {
            reads += 1;
            Err(TimberError::io(
                "gone.timber",
                std::io::Error::new(std::io::ErrorKind::NotFound, "deleted"),
            ))
        });
        assert_eq!(reads, 2);
        assert!(matches!(result, Err(TimberError::Io { .. })));
    }

    #[test]
    fn test_save_path_rules() {
        let dir = SaveDirectory::new("/saves");
        assert_eq!(dir.save_path("Autosave 1").expect("path"), PathBuf::from("/saves/Autosave 1.timber"));
        assert_eq!(dir.save_path("a.timber").expect("path"), PathBuf::from("/saves/a.timber"));
        assert!(dir.save_path("../escape").is_err());
        assert!(dir.save_path("").is_err());
    }
}
