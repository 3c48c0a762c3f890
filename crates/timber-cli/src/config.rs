//! Command line configuration.
//!
//! Read from `timber-lens.toml`; command line flags override individual
//! values after loading.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use timber_metrics::{DEFAULT_UPCOMING_PHASES, HISTORY_FILE_NAME};
use timber_save::CompressionLevel;
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "timber-lens.toml";

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "timber=info";

/// Timber Lens configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LensConfig {
    /// Directory holding the `.timber` saves
    pub save_dir: Option<PathBuf>,
    /// History file (None = `historical_data.json` in the save directory)
    pub history_file: Option<PathBuf>,
    /// Phases listed after the current one in weather summaries
    pub upcoming_phases: usize,
    /// Compression used when the world section is rewritten
    pub compression: CompressionLevel,
    /// Log filter used when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            save_dir: None,
            history_file: None,
            upcoming_phases: DEFAULT_UPCOMING_PHASES,
            compression: CompressionLevel::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl LensConfig {
    /// Load configuration from the default file location.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str::<Self>(&contents) {
                    Ok(mut config) => {
                        info!("Loaded config from {}", path.display());
                        config.validate();
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Clamp values to sensible ranges.
    pub fn validate(&mut self) {
        self.upcoming_phases = self.upcoming_phases.clamp(1, 32);
        if self.log_filter.trim().is_empty() {
            self.log_filter = DEFAULT_LOG_FILTER.to_string();
        }
    }

    /// Where the history lives for the configured save directory.
    #[must_use]
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history_file.clone().or_else(|| {
            self.save_dir
                .as_ref()
                .map(|dir| dir.join(HISTORY_FILE_NAME))
        })
    }
}
