//! Subcommand implementations.
//!
//! Each command is one load, compute or mutate, then save or append cycle
//! over an explicit [`Session`]. Output goes to a caller supplied writer.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use timber_metrics::{HistoricalStore, MetricsEngine};
use timber_save::{CompressionLevel, SaveDirectory, SettingsMutator, WorldDocument};
use tracing::{info, warn};

use crate::config::LensConfig;

/// Parses a `key=value` settings assignment.
///
/// The value is read as JSON when possible, otherwise kept as a string.
pub fn parse_assignment(text: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{text}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing setting name in '{text}'"));
    }
    let value = value.trim();
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn age(modified: SystemTime) -> String {
    match SystemTime::now().duration_since(modified) {
        Ok(elapsed) if elapsed.as_secs() < 60 => format!("{}s ago", elapsed.as_secs()),
        Ok(elapsed) if elapsed.as_secs() < 3600 => format!("{}m ago", elapsed.as_secs() / 60),
        Ok(elapsed) if elapsed.as_secs() < 86_400 => format!("{}h ago", elapsed.as_secs() / 3600),
        Ok(elapsed) => format!("{}d ago", elapsed.as_secs() / 86_400),
        Err(_) => "in the future".to_string(),
    }
}

/// Save directory, history and metric options for one invocation.
#[derive(Debug, Clone)]
pub struct Session {
    saves: SaveDirectory,
    history_path: PathBuf,
    engine: MetricsEngine,
    compression: CompressionLevel,
}

impl Session {
    /// Builds a session from resolved configuration.
    pub fn from_config(config: &LensConfig) -> Result<Self> {
        let Some(save_dir) = config.save_dir.clone() else {
            bail!("no save directory configured (use --save-dir or set save_dir in the config file)");
        };
        let history_path = config
            .history_path()
            .unwrap_or_else(|| save_dir.join(timber_metrics::HISTORY_FILE_NAME));
        Ok(Self {
            saves: SaveDirectory::new(save_dir),
            history_path,
            engine: MetricsEngine::new(config.upcoming_phases),
            compression: config.compression,
        })
    }

    fn load(&self, file: Option<&Path>) -> Result<(PathBuf, WorldDocument)> {
        match file {
            Some(path) => {
                let document = self
                    .saves
                    .load(path)
                    .with_context(|| format!("loading {}", path.display()))?;
                Ok((path.to_path_buf(), document))
            },
            None => {
                let newest = self.saves.list_save_files()?.remove(0);
                let document = self
                    .saves
                    .load(&newest.path)
                    .with_context(|| format!("loading {}", newest.path.display()))?;
                Ok((newest.path, document))
            },
        }
    }

    /// Prints the saves in the directory, newest first.
    pub fn list(&self, out: &mut impl Write) -> Result<()> {
        for save in self.saves.list_save_files()? {
            writeln!(out, "{:<40} {:>10} bytes  {}", save.name, save.size, age(save.modified))?;
        }
        Ok(())
    }

    /// Prints a summary of one save (latest by default), or its snapshot as JSON.
    pub fn inspect(&self, file: Option<&Path>, json: bool, out: &mut impl Write) -> Result<()> {
        let (path, document) = self.load(file)?;
        let snapshot = self.engine.snapshot(&document);
        if json {
            serde_json::to_writer_pretty(&mut *out, &snapshot)?;
            writeln!(out)?;
            return Ok(());
        }

        let settings = document.settings();
        let weather = &snapshot.weather;
        writeln!(out, "Save:        {}", path.display())?;
        writeln!(out, "Version:     {}", document.format_version())?;
        if let Some(timestamp) = &snapshot.timestamp {
            writeln!(out, "Saved at:    {timestamp}")?;
        }
        writeln!(out, "Map:         {}x{}", snapshot.width, snapshot.height)?;
        writeln!(out, "Time:        cycle {} day {}", snapshot.cycle, snapshot.day)?;
        writeln!(
            out,
            "Weather:     {} ({} days left)",
            weather.phase, weather.remaining_days
        )?;
        for phase in &weather.upcoming {
            let name = phase.phase.map_or("Hazardous", |p| p.name());
            if phase.min_days == phase.max_days {
                writeln!(out, "  cycle {}: {name} for {} days", phase.cycle, phase.min_days)?;
            } else {
                writeln!(
                    out,
                    "  cycle {}: {name} for {}-{} days",
                    phase.cycle, phase.min_days, phase.max_days
                )?;
            }
        }
        writeln!(out, "Clean water: {:.2}", snapshot.total_clean_water)?;
        writeln!(out, "Bad soil:    {} tiles", snapshot.contaminated_soil_tiles)?;
        writeln!(
            out,
            "Durations:   temperate {}-{}, drought {}-{}, badtide {}-{}",
            settings.temperate.min,
            settings.temperate.max,
            settings.drought.min,
            settings.drought.max,
            settings.badtide.min,
            settings.badtide.max
        )?;
        writeln!(out, "Sections:    {}", document.sections().collect::<Vec<_>>().join(", "))?;
        Ok(())
    }

    /// Appends snapshots to the history.
    ///
    /// Tracks the latest save, or with `all` every save oldest first. Saves
    /// that fail to decode are skipped. Returns the number of snapshots added.
    pub fn track(&self, all: bool, out: &mut impl Write) -> Result<usize> {
        let mut store = HistoricalStore::open(&self.history_path)?;

        let mut saves = self.saves.list_save_files()?;
        if all {
            saves.reverse();
        } else {
            saves.truncate(1);
        }

        let mut added = 0;
        for save in saves {
            let document = match self.saves.load(&save.path) {
                Ok(document) => document,
                Err(e) if all => {
                    warn!("Skipping {}: {e}", save.name);
                    continue;
                },
                Err(e) => return Err(e.into()),
            };
            let snapshot = self.engine.snapshot(&document);
            writeln!(
                out,
                "{}: cycle {} day {}, clean water {:.2}",
                save.name, snapshot.cycle, snapshot.day, snapshot.total_clean_water
            )?;
            store.append(snapshot)?;
            added += 1;
        }

        info!("Tracked {added} save(s) into {}", self.history_path.display());
        Ok(added)
    }

    /// Prints history entries with a day in `from..=to`.
    pub fn history(
        &self,
        from: Option<u32>,
        to: Option<u32>,
        json: bool,
        out: &mut impl Write,
    ) -> Result<()> {
        let store = HistoricalStore::open(&self.history_path)?;
        let entries = store.range(from, to);
        if json {
            serde_json::to_writer_pretty(&mut *out, &entries)?;
            writeln!(out)?;
            return Ok(());
        }

        for entry in &entries {
            writeln!(
                out,
                "[{}|{}] {:>10.2} clean water  {:<9} {} bad soil tiles",
                entry.cycle,
                entry.day,
                entry.total_clean_water,
                entry.weather.phase.name(),
                entry.contaminated_soil_tiles
            )?;
        }
        if entries.is_empty() {
            writeln!(out, "No history entries")?;
        }
        Ok(())
    }

    /// Prints settings, or applies `updates` and writes the result.
    ///
    /// The edited save is written as `output`, or over the loaded file.
    /// Returns the path written, if any.
    pub fn settings(
        &self,
        file: Option<&Path>,
        updates: &[(String, Value)],
        output: Option<&str>,
        out: &mut impl Write,
    ) -> Result<Option<PathBuf>> {
        let (path, document) = self.load(file)?;

        if updates.is_empty() {
            for (key, value) in SettingsMutator::current(&document) {
                writeln!(out, "{key} = {value}")?;
            }
            return Ok(None);
        }

        let updates: BTreeMap<String, Value> = updates.iter().cloned().collect();
        let updated = SettingsMutator::apply(&document, &updates)?;

        let name = match output {
            Some(name) => name.to_string(),
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .with_context(|| format!("{} has no file name", path.display()))?,
        };
        let written = self.saves.write_with(&name, &updated, self.compression)?;
        writeln!(out, "Wrote {}", written.display())?;
        Ok(Some(written))
    }
}
