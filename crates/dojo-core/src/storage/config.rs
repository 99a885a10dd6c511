//! TOML-based application configuration.
//!
//! Stores economy tuning and playback preferences:
//! - Hearts capacity, regeneration interval, refill price and ticker period
//! - Whether sound cues are emitted
//!
//! Configuration is stored at `~/.config/keyboard-dojo/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::{ConfigError, Result};
use crate::hearts::HeartsConfig;

/// Hearts tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartsSection {
    #[serde(default = "default_max_hearts")]
    pub max_hearts: u32,
    #[serde(default = "default_regeneration_minutes")]
    pub regeneration_minutes: u32,
    #[serde(default = "default_refill_cost")]
    pub refill_cost: u64,
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

/// Sound cue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data dir>/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub hearts: HeartsSection,
    #[serde(default)]
    pub audio: AudioConfig,
}

fn default_max_hearts() -> u32 {
    5
}
fn default_regeneration_minutes() -> u32 {
    30
}
fn default_refill_cost() -> u64 {
    20
}
fn default_tick_interval_secs() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

impl Default for HeartsSection {
    fn default() -> Self {
        Self {
            max_hearts: default_max_hearts(),
            regeneration_minutes: default_regeneration_minutes(),
            refill_cost: default_refill_cost(),
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(root: &mut serde_json::Value, key: &str, value: &str) -> Result<()> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown().into());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => serde_json::Value::Number(
                    value
                        .parse::<u64>()
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?
                        .into(),
                ),
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown().into())
    }

    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing defaults if no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed, or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults there if it is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
                .into()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Get a config value as JSON by dot-separated key.
    pub fn get_value(&self, key: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        Self::get_json_value_by_path(&json, key).cloned()
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.get_value(key)? {
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key and persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.apply(key, value)?;
        self.save()
    }

    /// Set a config value in memory only.
    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json)?;
        Ok(())
    }

    /// Hearts engine settings derived from this config.
    pub fn hearts_config(&self) -> HeartsConfig {
        HeartsConfig {
            max_hearts: self.hearts.max_hearts.max(1),
            regeneration_minutes: self.hearts.regeneration_minutes.max(1),
            refill_cost: self.hearts.refill_cost,
            tick_interval: std::time::Duration::from_secs(self.hearts.tick_interval_secs.max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.hearts.max_hearts, 5);
        assert_eq!(parsed.hearts.regeneration_minutes, 30);
        assert!(parsed.audio.enabled);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[hearts]\nmax_hearts = 8\n").unwrap();
        assert_eq!(parsed.hearts.max_hearts, 8);
        assert_eq!(parsed.hearts.refill_cost, 20);
        assert_eq!(parsed.hearts.tick_interval_secs, 60);
        assert!(parsed.audio.enabled);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("hearts.max_hearts").as_deref(), Some("5"));
        assert_eq!(cfg.get("audio.enabled").as_deref(), Some("true"));
        assert!(cfg.get("hearts.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn apply_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.apply("hearts.refill_cost", "35").unwrap();
        cfg.apply("audio.enabled", "false").unwrap();
        assert_eq!(cfg.hearts.refill_cost, 35);
        assert!(!cfg.audio.enabled);
    }

    #[test]
    fn apply_rejects_unknown_key_and_bad_type() {
        let mut cfg = Config::default();
        assert!(cfg.apply("hearts.nonexistent", "1").is_err());
        assert!(cfg.apply("audio.enabled", "loud").is_err());
        assert!(cfg.apply("hearts.max_hearts", "-3").is_err());
        assert_eq!(cfg.hearts.max_hearts, 5);
    }

    #[test]
    fn hearts_config_clamps_degenerate_values() {
        let mut cfg = Config::default();
        cfg.hearts.max_hearts = 0;
        cfg.hearts.regeneration_minutes = 0;
        let hearts = cfg.hearts_config();
        assert_eq!(hearts.max_hearts, 1);
        assert_eq!(hearts.regeneration_minutes, 1);
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.hearts.max_hearts, 5);
        assert!(path.exists());

        let mut cfg = cfg;
        cfg.apply("hearts.max_hearts", "9").unwrap();
        cfg.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().hearts.max_hearts, 9);
    }

    #[test]
    fn unreadable_file_is_an_error_not_a_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::create_dir(&path).unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, CoreError::Io(_)), "{err}");
        assert!(path.is_dir());
    }

    #[test]
    fn malformed_file_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[hearts\nmax_hearts = ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn get_value_keeps_json_types() {
        let cfg = Config::default();
        assert_eq!(cfg.get_value("hearts.max_hearts"), Some(serde_json::json!(5)));
        assert_eq!(cfg.get_value("audio.enabled"), Some(serde_json::json!(true)));
        assert!(cfg.get_value("audio.volume").is_none());
    }
}
