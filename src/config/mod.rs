//! Configuration module for markdown-sync
//!
//! This module handles editing preferences, including
//! serialization/deserialization to/from JSON and persistent storage to
//! platform-specific directories.

mod persistence;
mod settings;

pub use persistence::*;
pub use settings::*;
