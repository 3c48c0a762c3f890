//! Version types for save compatibility.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TimberError;

/// Game version using semantic versioning.
///
/// Timberborn writes versions such as `0.5.9.2-a1b2c3d-sw`; only the
/// first three numeric components are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Major version (breaking changes)
    pub major: u16,
    /// Minor version (game update number)
    pub minor: u16,
    /// Patch version (hotfixes)
    pub patch: u16,
}

impl SchemaVersion {
    /// Creates a new schema version.
    #[must_use]
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Version lines whose world layout this crate can decode.
    pub const SUPPORTED_LINES: [Self; 5] = [
        Self::new(0, 4, 0),
        Self::new(0, 5, 0),
        Self::new(0, 6, 0),
        Self::new(0, 7, 0),
        Self::new(1, 0, 0),
    ];

    /// Checks whether two versions belong to the same release line.
    #[must_use]
    pub const fn same_line(&self, other: &Self) -> bool {
        self.major == other.major && self.minor == other.minor
    }

    /// Checks whether the save layout of this version is recognized.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        Self::SUPPORTED_LINES.iter().any(|line| line.same_line(self))
    }

    /// Formats the supported lines for error messages.
    #[must_use]
    pub fn supported_lines() -> String {
        Self::SUPPORTED_LINES
            .iter()
            .map(|v| format!("{}.{}", v.major, v.minor))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for SchemaVersion {
    type Err = TimberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unsupported = || TimberError::UnsupportedVersion {
            found: s.to_string(),
            supported: Self::supported_lines(),
        };

        // Build hashes and store suffixes follow the first '-'
        let numeric = s.trim().split('-').next().unwrap_or_default();
        let mut parts = numeric.split('.');
        let mut next = |required: bool| -> Result<u16, TimberError> {
            match parts.next() {
                Some(p) => p.parse().map_err(|_| unsupported()),
                None if required => Err(unsupported()),
                None => Ok(0),
            }
        };

        let major = next(true)?;
        let minor = next(true)?;
        let patch = next(false)?;
        Ok(Self::new(major, minor, patch))
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
