//! Centralized error handling for markdown-sync
//!
//! This module provides a unified error type that covers all error scenarios
//! in the crate: configuration I/O, document tree mutations, view
//! synchronization, and table editing.

use log::warn;
use std::fmt;
use std::path::PathBuf;

use crate::markdown::{ElementId, NodeKey};

// ─────────────────────────────────────────────────────────────────────────────
// Custom Result Type Alias
// ─────────────────────────────────────────────────────────────────────────────

/// A specialized `Result` type for the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The centralized error type for the crate.
#[derive(Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // I/O and Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to load configuration file
    ConfigLoad {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to save configuration file
    ConfigSave {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to parse configuration (invalid JSON/format)
    ConfigParse {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration directory not found or inaccessible
    ConfigDirNotFound,

    // ─────────────────────────────────────────────────────────────────────────
    // Document Tree Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// The key does not refer to a live node in this tree
    NodeNotFound(NodeKey),

    /// No node is bound to the rendered element
    UnknownElement(ElementId),

    /// Attaching the node would place a table inside another table
    NestedTable,

    /// A mutation would break a structural rule of the tree
    InvalidStructure(String),

    // ─────────────────────────────────────────────────────────────────────────
    // Synchronization Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// The view instance already holds a tree
    AlreadyInitialized,

    /// The view instance has not been given a tree yet
    NotInitialized,

    /// Table placeholders found after block parsing do not match the
    /// number of table regions substituted before it
    PlaceholderMismatch { expected: usize, found: usize },

    /// No view is currently mounted in the session
    NoMountedView,

    /// The operation is not available in the mounted view mode
    WrongViewMode,

    // ─────────────────────────────────────────────────────────────────────────
    // Table Editing Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// The gesture target is not inside a table cell
    NotInTable,
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigParse {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Display trait implementation for user-friendly error messages
// ─────────────────────────────────────────────────────────────────────────────
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // I/O and Configuration Errors
            Error::ConfigLoad { path, source } => {
                write!(
                    f,
                    "Failed to load configuration from '{}': {}",
                    path.display(),
                    source
                )
            }
            Error::ConfigSave { path, source } => {
                write!(
                    f,
                    "Failed to save configuration to '{}': {}",
                    path.display(),
                    source
                )
            }
            Error::ConfigParse { message, .. } => {
                write!(f, "Invalid configuration format: {}", message)
            }
            Error::ConfigDirNotFound => {
                write!(f, "Configuration directory not found")
            }

            // Document Tree Errors
            Error::NodeNotFound(key) => write!(f, "Node {} not found in document tree", key),
            Error::UnknownElement(id) => {
                write!(f, "No document node is bound to element {}", id)
            }
            Error::NestedTable => write!(f, "A table cannot be placed inside another table"),
            Error::InvalidStructure(msg) => write!(f, "Invalid document structure: {}", msg),

            // Synchronization Errors
            Error::AlreadyInitialized => write!(f, "View instance is already initialized"),
            Error::NotInitialized => write!(f, "View instance is not initialized"),
            Error::PlaceholderMismatch { expected, found } => write!(
                f,
                "Table placeholder mismatch: {} table regions substituted, {} placeholders found",
                expected, found
            ),
            Error::NoMountedView => write!(f, "No view is mounted"),
            Error::WrongViewMode => write!(f, "Operation not supported in the mounted view mode"),

            // Table Editing Errors
            Error::NotInTable => write!(f, "Target is not inside a table cell"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// std::error::Error trait implementation for error chaining
// ─────────────────────────────────────────────────────────────────────────────
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ConfigLoad { source, .. } => Some(source.as_ref()),
            Error::ConfigSave { source, .. } => Some(source.as_ref()),
            Error::ConfigParse { source, .. } => source
                .as_ref()
                .map(|s| s.as_ref() as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Graceful Degradation Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Extension trait for Result to support graceful degradation.
pub trait ResultExt<T> {
    /// If the result is an error, log it at warning level and return the provided default.
    fn unwrap_or_warn_default(self, default: T, context: &str) -> T;
}

impl<T> ResultExt<T> for Result<T> {
    fn unwrap_or_warn_default(self, default: T, context: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                warn!("{}: {}. Using default.", context, err);
                default
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_serde_json_error_conversion() {
        let json_result: std::result::Result<String, _> = serde_json::from_str("invalid json");
        let err = Error::from(json_result.unwrap_err());
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_display_placeholder_mismatch() {
        let err = Error::PlaceholderMismatch {
            expected: 2,
            found: 1,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("2 table regions"));
        assert!(msg.contains("1 placeholders"));
    }

    #[test]
    fn test_display_node_not_found() {
        let err = Error::NodeNotFound(NodeKey::from_raw(7));
        assert_eq!(format!("{}", err), "Node #7 not found in document tree");
    }

    #[test]
    fn test_display_config_dir_not_found() {
        let err = Error::ConfigDirNotFound;
        assert_eq!(format!("{}", err), "Configuration directory not found");
    }

    #[test]
    fn test_error_source_config_load() {
        use std::error::Error as StdError;
        let io_err = io::Error::new(io::ErrorKind::NotFound, "not found");
        let err = Error::ConfigLoad {
            path: PathBuf::from("config.json"),
            source: Box::new(io_err),
        };
        assert!(err.source().is_some());
        assert!(format!("{}", err).contains("config.json"));
    }

    #[test]
    fn test_error_source_none_for_simple_variants() {
        use std::error::Error as StdError;
        assert!(Error::NestedTable.source().is_none());
        assert!(Error::AlreadyInitialized.source().is_none());
        assert!(Error::ConfigDirNotFound.source().is_none());
    }

    #[test]
    fn test_unwrap_or_warn_default_ok() {
        let result: Result<i32> = Ok(42);
        assert_eq!(result.unwrap_or_warn_default(0, "test context"), 42);
    }

    #[test]
    fn test_unwrap_or_warn_default_err() {
        let result: Result<i32> = Err(Error::NotInTable);
        assert_eq!(result.unwrap_or_warn_default(0, "test context"), 0);
    }
}
