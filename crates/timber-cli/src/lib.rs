//! # Timber Lens CLI
//!
//! Command implementations behind the `timber-lens` binary.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod commands;
pub mod config;

pub use commands::{parse_assignment, Session};
pub use config::LensConfig;
