//! Persisted user settings (`settings.json`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::transport::NO_DEVICE;

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub size_factor: f32,
    pub port_in: String,
    pub port_out: String,
    pub dark_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            size_factor: 1.0,
            port_in: NO_DEVICE.to_string(),
            port_out: NO_DEVICE.to_string(),
            dark_mode: false,
        }
    }
}

/// `<config_dir>/tonnetz/settings.json`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tonnetz").join(SETTINGS_FILE))
}

impl Settings {
    /// Read settings from `path`.
    ///
    /// A missing file yields the defaults, which are written back. A file
    /// that exists but cannot be read or parsed is an error.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            let settings = Settings::default();
            if let Err(e) = settings.save(path) {
                log::warn!(target: "config", "could not write default settings: {}", e);
            }
            return Ok(settings);
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        let mut settings: Settings = serde_json::from_str(&content)
            .map_err(|e| format!("malformed settings {}: {}", path.display(), e))?;
        settings.size_factor = clamp_size_factor(settings.size_factor);
        log::info!(target: "config", "loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("cannot create {}: {}", parent.display(), e))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, json).map_err(|e| format!("cannot write {}: {}", path.display(), e))
    }

    pub fn set_size_factor(&mut self, factor: f32) -> f32 {
        self.size_factor = clamp_size_factor(factor);
        self.size_factor
    }
}

fn clamp_size_factor(factor: f32) -> f32 {
    if factor.is_finite() {
        factor.clamp(0.25, 4.0)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tonnetz").join(SETTINGS_FILE);
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(path.exists());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let settings = Settings {
            size_factor: 1.5,
            port_in: "Keystation 49".into(),
            port_out: NO_DEVICE.into(),
            dark_mode: true,
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn partial_document_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{"port_out": "IAC Bus 1"}"#).unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.port_out, "IAC Bus 1");
        assert_eq!(settings.port_in, NO_DEVICE);
        assert_eq!(settings.size_factor, 1.0);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn size_factor_is_clamped() {
        let mut settings = Settings::default();
        assert_eq!(settings.set_size_factor(10.0), 4.0);
        assert_eq!(settings.set_size_factor(f32::NAN), 1.0);
    }
}
