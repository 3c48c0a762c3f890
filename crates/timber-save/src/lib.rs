//! # Timber Save
//!
//! Reading, editing and writing Timberborn `.timber` saves.
//!
//! - [`container`]: ZIP framing kept as raw records for byte-exact output
//! - [`compression`]: stored/deflate entry payloads
//! - [`codec`]: [`WorldDocument`] decode/encode and save directory access
//! - [`world`]: terrain grid, time and weather model
//! - [`settings`]: validated, all-or-nothing weather duration edits

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod codec;
pub mod compression;
pub mod container;
pub mod layout;
pub mod settings;
pub mod world;

pub use codec::{SaveDirectory, SaveFileInfo, WorldDocument, SAVE_EXTENSION};
pub use compression::CompressionLevel;
pub use settings::{DurationRange, SettingKey, SettingsMutator, WeatherSettings};
pub use world::{
    GameTime, ScheduledPhase, TerrainGrid, Tile, WeatherPhase, WeatherState,
    CONTAMINATION_EPSILON, SOIL_CONTAMINATION_THRESHOLD,
};
