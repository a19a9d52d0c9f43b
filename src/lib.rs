//! markdown-sync
//!
//! Keeps a canonical markdown string and an editable document tree in step
//! while an editor toggles between a raw-text view and a structured view.
//!
//! The crate is a library; the host UI mounts views through
//! [`markdown::EditorSession`], renders the tree it hands out, and routes
//! gestures and keystrokes back in. Logging goes through the `log` facade and
//! the crate never installs a logger itself.

pub mod config;
pub mod error;
pub mod markdown;
pub mod string_utils;

pub use config::{Settings, TableDimensions, ViewMode};
pub use error::{Error, Result, ResultExt};
pub use markdown::{DocumentTree, EditorSession, NodeKey, NodeKind};
