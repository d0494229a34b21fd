use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejections surfaced at the point of alarm creation. Malformed input is
/// never stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlarmInputError {
    #[error("invalid alarm time '{0}', expected HH:MM")]
    MalformedTime(String),
    #[error("alarm hour {0} out of range 0-23")]
    HourOutOfRange(u32),
    #[error("alarm minute {0} out of range 0-59")]
    MinuteOutOfRange(u32),
    #[error("unknown alarm sound '{0}', expected default, beep, chime or bell")]
    UnknownSound(String),
}

/// Wall-clock trigger time of an alarm, minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmTime {
    hour: u8,
    minute: u8,
}

impl AlarmTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self, AlarmInputError> {
        if hour > 23 {
            return Err(AlarmInputError::HourOutOfRange(hour));
        }
        if minute > 59 {
            return Err(AlarmInputError::MinuteOutOfRange(minute));
        }
        Ok(Self {
            hour: hour as u8,
            minute: minute as u8,
        })
    }

    pub fn hour(&self) -> u32 {
        u32::from(self.hour)
    }

    pub fn minute(&self) -> u32 {
        u32::from(self.minute)
    }
}

impl FromStr for AlarmTime {
    type Err = AlarmInputError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let malformed = || AlarmInputError::MalformedTime(input.to_string());
        let (hour_text, minute_text) = input.trim().split_once(':').ok_or_else(malformed)?;
        let hour: u32 = hour_text.parse().map_err(|_| malformed())?;
        let minute: u32 = minute_text.parse().map_err(|_| malformed())?;
        Self::new(hour, minute)
    }
}

impl fmt::Display for AlarmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmSound {
    #[default]
    Default,
    Beep,
    Chime,
    Bell,
}

impl AlarmSound {
    pub const ALL: [AlarmSound; 4] = [
        AlarmSound::Default,
        AlarmSound::Beep,
        AlarmSound::Chime,
        AlarmSound::Bell,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmSound::Default => "default",
            AlarmSound::Beep => "beep",
            AlarmSound::Chime => "chime",
            AlarmSound::Bell => "bell",
        }
    }
}

impl FromStr for AlarmSound {
    type Err = AlarmInputError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(AlarmSound::Default),
            "beep" => Ok(AlarmSound::Beep),
            "chime" => Ok(AlarmSound::Chime),
            "bell" => Ok(AlarmSound::Bell),
            other => Err(AlarmInputError::UnknownSound(other.to_string())),
        }
    }
}

impl fmt::Display for AlarmSound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    pub id: u64,
    pub time: AlarmTime,
    pub label: String,
    pub sound: AlarmSound,
    pub repeat: bool,
    pub enabled: bool,
}

pub fn load_alarm_file(path: &Path) -> Result<Vec<Alarm>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read alarm file {}", path.display()))?;
    parse_alarm_file_text(&content)
}

pub fn parse_alarm_file_text(content: &str) -> Result<Vec<Alarm>> {
    let raw = serde_json::from_str::<AlarmsFile>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow::anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;

    if raw.version != 1 {
        bail!(
            "unsupported alarm file version {}; expected version 1",
            raw.version
        );
    }

    let mut ids = HashSet::new();
    let mut alarms = Vec::with_capacity(raw.alarms.len());
    for record in raw.alarms {
        if !ids.insert(record.id) {
            bail!("duplicate alarm id found: {}", record.id);
        }
        let time = record
            .time
            .parse::<AlarmTime>()
            .with_context(|| format!("alarm {} has an invalid trigger time", record.id))?;
        alarms.push(Alarm {
            id: record.id,
            time,
            label: record.label,
            sound: record.sound,
            repeat: record.repeat,
            enabled: record.enabled,
        });
    }

    Ok(alarms)
}

pub fn save_alarm_file(path: &Path, alarms: &[Alarm]) -> Result<()> {
    let records = alarms
        .iter()
        .map(|alarm| AlarmRecord {
            id: alarm.id,
            time: alarm.time.to_string(),
            label: alarm.label.clone(),
            sound: alarm.sound,
            repeat: alarm.repeat,
            enabled: alarm.enabled,
        })
        .collect();
    let payload = AlarmsFile {
        version: 1,
        alarms: records,
    };
    let text = serde_json::to_string_pretty(&payload)?;
    fs::write(path, format!("{text}\n"))
        .with_context(|| format!("unable to write alarm file {}", path.display()))?;
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct AlarmsFile {
    version: u32,
    alarms: Vec<AlarmRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AlarmRecord {
    id: u64,
    time: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    sound: AlarmSound,
    #[serde(default)]
    repeat: bool,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}
