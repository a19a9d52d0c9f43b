//! Settings file on disk
//!
//! Optional for hosts: the session only ever sees a [`Settings`] value.
//! These helpers read it from and write it to `config.json` in the user's
//! config directory.

use crate::config::Settings;
use crate::error::{Error, Result, ResultExt};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "markdown-sync";
const CONFIG_FILE_NAME: &str = "config.json";
/// Written first, then renamed over the config file
const BACKUP_EXTENSION: &str = "json.bak";

/// `<config dir>/markdown-sync`, e.g. `~/.config/markdown-sync` on Linux.
pub fn get_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|base| base.join(APP_NAME))
        .ok_or(Error::ConfigDirNotFound)
}

fn config_file_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

// ─────────────────────────────────────────────────────────────────────────────
// Load Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Settings from the user's config file, or defaults if it cannot be read.
pub fn load_config() -> Settings {
    config_file_path()
        .and_then(|path| load_config_from(&path))
        .unwrap_or_warn_default(Settings::default(), "Failed to load configuration")
}

/// Load and sanitize settings from `path`.
///
/// A missing or blank file yields defaults. Unreadable files and invalid
/// JSON are errors.
pub fn load_config_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        debug!("Config file not found at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    debug!("Loading config from: {}", path.display());

    let contents = fs::read_to_string(path).map_err(|e| Error::ConfigLoad {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;

    if contents.trim().is_empty() {
        debug!("Config file is empty, using defaults");
        return Ok(Settings::default());
    }

    let settings = Settings::from_json_sanitized(&contents).map_err(|e| {
        warn!(
            "Config file at {} contains invalid JSON: {}",
            path.display(),
            e
        );
        Error::ConfigParse {
            message: format!("Failed to parse config file: {}", e),
            source: Some(Box::new(e)),
        }
    })?;

    info!("Configuration loaded successfully from {}", path.display());
    Ok(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Save Configuration
// ─────────────────────────────────────────────────────────────────────────────

pub fn save_config(settings: &Settings) -> Result<()> {
    save_config_to(settings, &config_file_path()?)
}

/// Write `settings` to `path` through a sibling `.json.bak` file, creating
/// the directory if needed.
pub fn save_config_to(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            debug!("Creating config directory: {}", dir.display());
            fs::create_dir_all(dir).map_err(|e| Error::ConfigSave {
                path: dir.to_path_buf(),
                source: Box::new(e),
            })?;
        }
    }

    let backup_path = path.with_extension(BACKUP_EXTENSION);
    debug!("Saving config to: {}", path.display());

    let json = serde_json::to_string_pretty(settings).map_err(|e| Error::ConfigSave {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;

    fs::write(&backup_path, &json).map_err(|e| Error::ConfigSave {
        path: backup_path.clone(),
        source: Box::new(e),
    })?;

    fs::rename(&backup_path, path).map_err(|e| Error::ConfigSave {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;

    info!("Configuration saved successfully to {}", path.display());
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
