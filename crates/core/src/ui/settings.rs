//! User settings persistence.
//!
//! This module handles loading and saving user preferences: the selected
//! model and the API connection values.

use crate::config::Config;
use crate::error::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// User-configurable settings persisted between sessions.
///
/// Stored as JSON in the user's config directory
/// (e.g., `~/.config/snapsolve/settings.json` on Linux).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Selected model id.
    pub model: String,
    /// API key override (takes precedence over environment).
    #[serde(default)]
    pub api_key: String,
    /// Endpoint base URL.
    #[serde(default)]
    pub api_base_url: String,
}

impl Settings {
    /// Returns the path to the settings file.
    ///
    /// Creates the config directory if it doesn't exist.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "snapsolve").map(|dirs| {
            let config_dir = dirs.config_dir();
            if !config_dir.exists() {
                let _ = fs::create_dir_all(config_dir);
            }
            config_dir.join("settings.json")
        })
    }

    /// Loads settings from disk, falling back to defaults if not found.
    pub fn load(default_model: &str) -> Self {
        Self::config_path()
            .and_then(|path| fs::read_to_string(&path).ok())
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_else(|| Self::with_defaults(default_model))
    }

    /// Creates default settings with the specified model.
    pub fn with_defaults(model: &str) -> Self {
        Self {
            model: model.to_string(),
            api_key: String::new(),
            api_base_url: String::new(),
        }
    }

    /// Persists settings to disk.
    pub fn save(&self) -> Result<()> {
        if let Some(path) = Self::config_path() {
            let json = serde_json::to_string_pretty(self)?;
            fs::write(path, json)?;
        }
        Ok(())
    }

    /// Builds an API [`Config`] from these settings.
    pub fn to_config(&self) -> Result<Config> {
        Config::builder()
            .with_api_key(&self.api_key)
            .with_base_url(&self.api_base_url)
            .with_model(&self.model)
            .build()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_defaults("gpt-4o")
    }
}
