use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::warn;

use crate::style::{ClockStyle, TimeFormat};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl FromStr for Theme {
    type Err = ();

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed rejection for settings updates arriving from outside (the companion
/// API). Values loaded from disk never error; they fall back per key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("unknown settings key '{0}'")]
    UnknownKey(String),
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// The flat settings mapping. One in-memory copy is the source of truth for
/// a session; every mutation is flushed while `auto_save` is on.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub theme: Theme,
    pub time_format: TimeFormat,
    pub show_seconds: bool,
    pub show_date: bool,
    pub clock_style: ClockStyle,
    pub font: String,
    pub font_size: u32,
    pub volume: u32,
    pub timezone: String,
    pub voice_enabled: bool,
    pub auto_save: bool,
    pub window_geometry: String,
}

pub const KNOWN_KEYS: [&str; 12] = [
    "theme",
    "time_format",
    "show_seconds",
    "show_date",
    "clock_style",
    "font",
    "font_size",
    "volume",
    "timezone",
    "voice_enabled",
    "auto_save",
    "window_geometry",
];

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            time_format: TimeFormat::Hour24,
            show_seconds: true,
            show_date: true,
            clock_style: ClockStyle::Digital,
            font: "Courier New".to_string(),
            font_size: 42,
            volume: 80,
            timezone: "Local".to_string(),
            voice_enabled: false,
            auto_save: true,
            window_geometry: "600x500".to_string(),
        }
    }
}

impl Settings {
    /// Builds settings from a stored document. Unknown keys are ignored;
    /// a value that fails coercion falls back to the default for that key
    /// only.
    fn from_document(map: &Map<String, Value>) -> Self {
        let mut settings = Settings::default();
        for (key, value) in map {
            if let Err(err) = settings.apply_update(key, value) {
                match err {
                    SettingsError::UnknownKey(_) => {}
                    SettingsError::InvalidValue { key, reason } => {
                        warn!("settings key '{key}' ignored: {reason}; keeping default");
                    }
                }
            }
        }
        settings
    }

    fn to_document(&self) -> Value {
        json!({
            "theme": self.theme.as_str(),
            "time_format": self.time_format.as_hours(),
            "show_seconds": self.show_seconds,
            "show_date": self.show_date,
            "clock_style": self.clock_style.as_str(),
            "font": self.font,
            "font_size": self.font_size,
            "volume": self.volume,
            "timezone": self.timezone,
            "voice_enabled": self.voice_enabled,
            "auto_save": self.auto_save,
            "window_geometry": self.window_geometry,
        })
    }

    /// Applies one `key = value` update, rejecting unknown keys and
    /// uncoercible values.
    pub fn apply_update(&mut self, key: &str, value: &Value) -> Result<(), SettingsError> {
        let invalid = |reason: &str| SettingsError::InvalidValue {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        match key {
            "theme" => {
                self.theme = as_str(value)
                    .and_then(|text| text.parse().ok())
                    .ok_or_else(|| invalid("expected \"light\" or \"dark\""))?;
            }
            "time_format" => {
                self.time_format = as_u32(value)
                    .and_then(TimeFormat::from_hours)
                    .ok_or_else(|| invalid("expected 12 or 24"))?;
            }
            "show_seconds" => {
                self.show_seconds = value.as_bool().ok_or_else(|| invalid("expected a bool"))?;
            }
            "show_date" => {
                self.show_date = value.as_bool().ok_or_else(|| invalid("expected a bool"))?;
            }
            "clock_style" => {
                self.clock_style = as_str(value)
                    .and_then(|text| text.parse().ok())
                    .ok_or_else(|| invalid("expected digital, binary or text"))?;
            }
            "font" => {
                self.font = as_str(value)
                    .ok_or_else(|| invalid("expected a string"))?
                    .to_string();
            }
            "font_size" => {
                let size = as_u32(value).ok_or_else(|| invalid("expected an integer"))?;
                if !(8..=200).contains(&size) {
                    return Err(invalid("expected 8-200"));
                }
                self.font_size = size;
            }
            "volume" => {
                let volume = as_u32(value).ok_or_else(|| invalid("expected an integer"))?;
                if volume > 100 {
                    return Err(invalid("expected 0-100"));
                }
                self.volume = volume;
            }
            "timezone" => {
                self.timezone = as_str(value)
                    .ok_or_else(|| invalid("expected a string"))?
                    .to_string();
            }
            "voice_enabled" => {
                self.voice_enabled = value.as_bool().ok_or_else(|| invalid("expected a bool"))?;
            }
            "auto_save" => {
                self.auto_save = value.as_bool().ok_or_else(|| invalid("expected a bool"))?;
            }
            "window_geometry" => {
                let text = as_str(value).ok_or_else(|| invalid("expected \"WxH\""))?;
                if parse_geometry(text).is_none() {
                    return Err(invalid("expected \"WxH\""));
                }
                self.window_geometry = text.to_string();
            }
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// Window size from the stored geometry string, falling back to the
    /// default when unparsable.
    pub fn window_size(&self) -> (f32, f32) {
        parse_geometry(&self.window_geometry).unwrap_or((600.0, 500.0))
    }
}

fn as_str(value: &Value) -> Option<&str> {
    value.as_str()
}

fn as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn parse_geometry(text: &str) -> Option<(f32, f32)> {
    let (width, height) = text.trim().split_once(['x', 'X'])?;
    let width: u32 = width.parse().ok()?;
    let height: u32 = height.parse().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some((width as f32, height as f32))
}

/// Where the current settings came from at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsSource {
    File,
    Defaults,
}

/// Owns the settings file path and the in-memory mapping. Loading never
/// fails: a missing or undecodable file yields the full defaults.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
    source: SettingsSource,
}

impl SettingsStore {
    pub fn load(path: &Path) -> Self {
        let (settings, source) = match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Value>(&content) {
                Ok(Value::Object(map)) => (Settings::from_document(&map), SettingsSource::File),
                Ok(_) => {
                    warn!(
                        "settings file {} is not a JSON object; using defaults",
                        path.display()
                    );
                    (Settings::default(), SettingsSource::Defaults)
                }
                Err(err) => {
                    warn!(
                        "settings file {} is not valid JSON ({err}); using defaults",
                        path.display()
                    );
                    (Settings::default(), SettingsSource::Defaults)
                }
            },
            Err(_) => (Settings::default(), SettingsSource::Defaults),
        };
        Self {
            path: path.to_path_buf(),
            settings,
            source,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn source(&self) -> SettingsSource {
        self.source
    }

    /// Mutates the in-memory mapping and flushes it while auto-save is on.
    pub fn update(&mut self, mutate: impl FnOnce(&mut Settings)) {
        mutate(&mut self.settings);
        if self.settings.auto_save {
            self.persist();
        }
    }

    pub fn apply_update(&mut self, key: &str, value: &Value) -> Result<(), SettingsError> {
        self.settings.apply_update(key, value)?;
        if self.settings.auto_save {
            self.persist();
        }
        Ok(())
    }

    pub fn reset_to_defaults(&mut self) {
        self.settings = Settings::default();
        self.persist();
    }

    pub fn save(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.settings.to_document())?;
        fs::write(&self.path, format!("{text}\n"))
            .with_context(|| format!("unable to write settings file {}", self.path.display()))?;
        Ok(())
    }

    /// Persistence failures degrade to a warning; the in-memory copy stays
    /// authoritative for the session.
    fn persist(&self) {
        if let Err(err) = self.save() {
            warn!("failed to persist settings: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().expect("tempdir");
        let store = SettingsStore::load(&dir.path().join("missing.json"));
        assert_eq!(store.settings(), &Settings::default());
        assert_eq!(store.source(), SettingsSource::Defaults);
    }

    #[test]
    fn corrupt_file_yields_defaults_without_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("clock_settings.json");
        fs::write(&path, "{ not json at all").expect("write");

        let store = SettingsStore::load(&path);
        assert_eq!(store.settings(), &Settings::default());
        assert_eq!(store.source(), SettingsSource::Defaults);
    }

    #[test]
    fn set_persist_reload_round_trip() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("clock_settings.json");

        let mut store = SettingsStore::load(&path);
        store.update(|settings| settings.theme = Theme::Dark);
        store.update(|settings| settings.volume = 35);

        let reloaded = SettingsStore::load(&path);
        assert_eq!(reloaded.source(), SettingsSource::File);
        assert_eq!(reloaded.settings().theme, Theme::Dark);
        assert_eq!(reloaded.settings().volume, 35);
        assert_eq!(reloaded.settings().font, Settings::default().font);
    }

    #[test]
    fn invalid_stored_value_falls_back_for_that_key_only() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("clock_settings.json");
        fs::write(
            &path,
            r#"{"theme": "plaid", "volume": 250, "show_seconds": false}"#,
        )
        .expect("write");

        let store = SettingsStore::load(&path);
        assert_eq!(store.settings().theme, Theme::Light);
        assert_eq!(store.settings().volume, 80);
        assert!(!store.settings().show_seconds);
    }

    #[test]
    fn unknown_keys_are_ignored_on_load() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("clock_settings.json");
        fs::write(&path, r#"{"weather_api_key": "abc", "theme": "dark"}"#).expect("write");

        let store = SettingsStore::load(&path);
        assert_eq!(store.settings().theme, Theme::Dark);
    }

    #[test]
    fn apply_update_rejects_unknown_key_and_bad_value() {
        let mut settings = Settings::default();
        assert_eq!(
            settings.apply_update("frobnicate", &json!(1)),
            Err(SettingsError::UnknownKey("frobnicate".to_string()))
        );
        assert!(matches!(
            settings.apply_update("time_format", &json!(13)),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(settings.apply_update("time_format", &json!(12)).is_ok());
        assert_eq!(settings.time_format, TimeFormat::Hour12);
        // Numeric strings coerce, the way hand-edited files often arrive.
        assert!(settings.apply_update("time_format", &json!("24")).is_ok());
        assert_eq!(settings.time_format, TimeFormat::Hour24);
    }

    #[test]
    fn reset_to_defaults_overwrites_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("clock_settings.json");

        let mut store = SettingsStore::load(&path);
        store.update(|settings| settings.theme = Theme::Dark);
        store.reset_to_defaults();

        let reloaded = SettingsStore::load(&path);
        assert_eq!(reloaded.settings(), &Settings::default());
    }

    #[test]
    fn geometry_parsing() {
        let mut settings = Settings::default();
        assert_eq!(settings.window_size(), (600.0, 500.0));
        settings.window_geometry = "1024x768".to_string();
        assert_eq!(settings.window_size(), (1024.0, 768.0));
        settings.window_geometry = "banana".to_string();
        assert_eq!(settings.window_size(), (600.0, 500.0));
        assert!(
            settings
                .apply_update("window_geometry", &json!("0x10"))
                .is_err()
        );
    }

    #[test]
    fn auto_save_off_defers_writes() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("clock_settings.json");

        let mut store = SettingsStore::load(&path);
        store.update(|settings| settings.auto_save = false);
        store.update(|settings| settings.theme = Theme::Dark);
        assert!(!path.exists());

        store.save().expect("explicit save");
        let reloaded = SettingsStore::load(&path);
        assert_eq!(reloaded.settings().theme, Theme::Dark);
        assert!(!reloaded.settings().auto_save);
    }
}
