//! # Timber Common
//!
//! Common types, utilities, and shared abstractions for Timber Lens.
//!
//! This crate provides foundational types used across all Timber Lens crates:
//! - The error taxonomy shared by the codec, settings, metrics and history
//! - Game version parsing and recognition
//! - Grid coordinates for the terrain map
//! - Atomic file replacement and retrying reads

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod fs;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::version::*;
}

pub use prelude::*;
