//! Settings persistence and startup wiring.
//!
//! Stores the database and image locations in a JSON file at an
//! OS-appropriate location, and builds the one [`NotesRepository`] the
//! process should use.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{AssetManager, NoteStore, NotesRepository, Result};

/// Persisted storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesConfig {
    /// SQLite file holding notes and their content.
    pub database_path: PathBuf,
    /// Directory that imported images are copied into.
    pub images_directory: PathBuf,
}

impl Default for NotesConfig {
    fn default() -> Self {
        let base = default_data_directory();
        Self {
            database_path: base.join("notes.db"),
            images_directory: base.join("images"),
        }
    }
}

impl NotesConfig {
    /// Loads settings from the default location; returns defaults if the file
    /// is missing or corrupt.
    pub fn load() -> Self {
        Self::load_from(settings_file_path()).unwrap_or_else(|e| {
            log::debug!("using default settings: {e}");
            Self::default()
        })
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Saves settings to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(settings_file_path())
    }

    /// Saves settings to `path`, creating parent directories as needed.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Opens the store and image directory described by these settings.
    ///
    /// Call once at startup and share the result; every caller in the
    /// process should go through the same repository so that writes are
    /// serialised and feeds see every change.
    pub fn open_repository(&self) -> Result<NotesRepository> {
        if let Some(parent) = self.database_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let store = NoteStore::open(&self.database_path)?;
        let assets = AssetManager::local(&self.images_directory)?;
        Ok(NotesRepository::new(Arc::new(store), assets))
    }
}

/// Returns the path to the settings JSON file.
///
/// - macOS / Linux: `~/.config/notekeep/settings.json`
/// - Windows: `%APPDATA%/Notekeep/settings.json`
pub fn settings_file_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("Notekeep").join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("notekeep").join("settings.json")
    }
}

/// Returns the default data directory: `<OS data dir>/notekeep`.
pub fn default_data_directory() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".local")
                .join("share")
        })
        .join("notekeep")
}
