//! # Timber Metrics
//!
//! Derived metrics for decoded saves and the history they accumulate into.
//!
//! - [`matrix`]: row-major grids aligned with the terrain
//! - [`engine`]: [`MetricsEngine`] and [`MetricsSnapshot`]
//! - [`history`]: [`HistoricalSeries`] and its on-disk [`HistoricalStore`]

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod engine;
pub mod history;
pub mod matrix;

pub use engine::{MetricsEngine, MetricsSnapshot, WeatherSummary, DEFAULT_UPCOMING_PHASES};
pub use history::{CleanWaterPoint, HistoricalSeries, HistoricalStore, HISTORY_FILE_NAME};
pub use matrix::Matrix;
