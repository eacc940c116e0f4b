//! Inspector settings with persistence
//!
//! Settings are saved to `~/.config/lancer/inspect.toml`

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn, Level};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectSettings {
    /// Maximum log level: trace, debug, info, warn or error
    pub log_level: String,
    /// Directory relative tree paths are resolved against
    pub data_root: PathBuf,
    /// Tree dumps loaded as resource libraries before any drawable
    pub resource_files: Vec<PathBuf>,
    /// Walk every drawable for missing materials and textures
    pub report_missing: bool,
}

impl Default for InspectSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            data_root: PathBuf::from("."),
            resource_files: Vec::new(),
            report_missing: true,
        }
    }
}

impl InspectSettings {
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("lancer"))
    }

    fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("inspect.toml"))
    }

    /// Load settings from disk, or return defaults if not found
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            warn!("Could not determine config directory");
            return Self::default();
        };

        if !path.exists() {
            info!("No settings file found, using defaults");
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match Self::parse(&content) {
                Ok(settings) => {
                    info!("Loaded settings from {:?}", path);
                    settings
                }
                Err(e) => {
                    warn!("Failed to parse settings: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read settings file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save settings to disk
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let Some(dir) = Self::config_dir() else {
            anyhow::bail!("Could not determine config directory");
        };

        let path = dir.join("inspect.toml");
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        info!("Saved settings to {:?}", path);
        Ok(path)
    }

    /// The configured log level, falling back to `INFO` for unknown names.
    pub fn max_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let settings = InspectSettings::parse("report_missing = false\n").unwrap();
        assert!(!settings.report_missing);
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.data_root, PathBuf::from("."));
    }

    #[test]
    fn pretty_toml_round_trips() {
        let settings = InspectSettings {
            log_level: "debug".into(),
            data_root: PathBuf::from("data"),
            resource_files: vec![PathBuf::from("ships.mat.json")],
            report_missing: true,
        };
        let text = toml::to_string_pretty(&settings).unwrap();
        assert_eq!(InspectSettings::parse(&text).unwrap(), settings);
    }

    #[test]
    fn log_level_names() {
        let mut settings = InspectSettings::default();
        assert_eq!(settings.max_level(), Level::INFO);
        settings.log_level = "DEBUG".into();
        assert_eq!(settings.max_level(), Level::DEBUG);
        settings.log_level = "chatty".into();
        assert_eq!(settings.max_level(), Level::INFO);
    }
}
