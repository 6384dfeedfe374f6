//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - The four timer durations (`[timer]`)
//! - Whether the next phase starts by itself after a completion
//!
//! Configuration is stored at `~/.config/pomodoro/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::data_dir;
use crate::error::ConfigError;
use crate::timer::Settings;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: Settings,
    /// Start the following phase as soon as one completes.
    #[serde(default)]
    pub auto_start_next: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timer: Settings::default(),
            auto_start_next: false,
        }
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

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(format!("cannot parse '{value}' as bool: {e}")))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|e| invalid(format!("cannot parse '{value}' as number: {e}")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) => return Err(unknown()),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("config.toml"),
                message: e.to_string(),
            })
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if it holds invalid timer values.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
        };
        let cfg: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        cfg.timer.validate()?;
        Ok(cfg)
    }

    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Load from the data directory, or return defaults.
    ///
    /// # Errors
    /// See [`Config::load_from`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// # Errors
    /// See [`Config::save_to`].
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            warn!(error = %e, "falling back to default configuration");
            Self::default()
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key, in memory only.
    ///
    /// # Errors
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the resulting timer settings are invalid. `self` is unchanged on
    /// error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.timer.validate()?;
        *self = updated;
        Ok(())
    }
}

/// Where the timer settings live between runs.
pub trait SettingsStore {
    /// Stored settings, or defaults when none are stored.
    fn load(&self) -> Settings;

    /// # Errors
    /// Returns a `ConfigError` if the settings are invalid or cannot be written.
    fn save(&self, settings: &Settings) -> Result<(), ConfigError>;
}

/// Settings kept in the `[timer]` table of a TOML config file.
#[derive(Debug, Clone)]
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store backed by the default config file.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn open_default() -> Result<Self, ConfigError> {
        Ok(Self::new(Config::path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for TomlSettingsStore {
    fn load(&self) -> Settings {
        match Config::load_from(&self.path) {
            Ok(cfg) => cfg.timer,
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "using default timer settings");
                Settings::default()
            }
        }
    }

    /// Replace the `[timer]` table, leaving every other key as written.
    ///
    /// Works on the raw TOML table so a file whose current timer values
    /// are invalid still keeps its other settings.
    fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        settings.validate()?;
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: self.path.clone(),
            message,
        };

        let mut table = match std::fs::read_to_string(&self.path) {
            Ok(content) => content
                .parse::<toml::Table>()
                .map_err(|e| ConfigError::ParseFailed(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => toml::Table::new(),
            Err(e) => {
                return Err(ConfigError::LoadFailed {
                    path: self.path.clone(),
                    message: e.to_string(),
                })
            }
        };
        let timer = toml::Value::try_from(settings).map_err(|e| save_failed(e.to_string()))?;
        table.insert("timer".to_string(), timer);

        let content = toml::to_string_pretty(&table).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(&self.path, content).map_err(|e| save_failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.timer.work_minutes, 25);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.work_minutes").as_deref(), Some("25"));
        assert_eq!(cfg.get("auto_start_next").as_deref(), Some("false"));
        assert!(cfg.get("timer.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_nested_number() {
        let mut cfg = Config::default();
        cfg.set("timer.long_break_minutes", "20").unwrap();
        assert_eq!(cfg.timer.long_break_minutes, 20);
        cfg.set("auto_start_next", "true").unwrap();
        assert!(cfg.auto_start_next);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        let err = cfg.set("timer.nonexistent_key", "3").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(_)));
        assert!(cfg.set("timer", "3").is_err());
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(cfg.set("auto_start_next", "maybe").is_err());
        assert!(cfg.set("timer.work_minutes", "-5").is_err());
    }

    #[test]
    fn set_rejects_zero_duration_and_keeps_config() {
        let mut cfg = Config::default();
        let err = cfg.set("timer.cycles_before_long_break", "0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn invalid_file_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[timer]\nwork_minutes = 0\n").unwrap();
        assert!(Config::load_from(&path).is_err());

        let store = TomlSettingsStore::new(&path);
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn settings_store_round_trips_and_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config {
            auto_start_next: true,
            ..Config::default()
        };
        cfg.save_to(&path).unwrap();

        let store = TomlSettingsStore::new(&path);
        let settings = Settings::new(45, 10, 20, 3).unwrap();
        store.save(&settings).unwrap();

        assert_eq!(store.load(), settings);
        assert!(Config::load_from(&path).unwrap().auto_start_next);
    }

    #[test]
    fn settings_store_repairs_invalid_timer_and_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "auto_start_next = true\n[timer]\nwork_minutes = 0\n").unwrap();

        let store = TomlSettingsStore::new(&path);
        store.save(&Settings::default()).unwrap();

        let cfg = Config::load_from(&path).unwrap();
        assert!(cfg.auto_start_next);
        assert_eq!(cfg.timer, Settings::default());
    }

    #[test]
    fn settings_store_refuses_to_overwrite_unparseable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "auto_start_next = = true\n").unwrap();

        let store = TomlSettingsStore::new(&path);
        let err = store.save(&Settings::default()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed(_)));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "auto_start_next = = true\n"
        );
    }

    #[test]
    fn settings_store_refuses_invalid_settings() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlSettingsStore::new(dir.path().join("config.toml"));
        let bad = Settings {
            work_minutes: 0,
            ..Settings::default()
        };
        assert!(store.save(&bad).is_err());
        assert!(!store.path().exists());
    }
}
