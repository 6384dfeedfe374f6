use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Work,
    ShortBreak,
    LongBreak,
}

impl PhaseKind {
    pub const ALL: [PhaseKind; 3] = [PhaseKind::Work, PhaseKind::ShortBreak, PhaseKind::LongBreak];

    /// Stable identifier used in the database and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Work => "work",
            PhaseKind::ShortBreak => "short_break",
            PhaseKind::LongBreak => "long_break",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PhaseKind::Work => "Work",
            PhaseKind::ShortBreak => "Short Break",
            PhaseKind::LongBreak => "Long Break",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PhaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "work" | "focus" => Ok(PhaseKind::Work),
            "short_break" | "short" => Ok(PhaseKind::ShortBreak),
            "long_break" | "long" => Ok(PhaseKind::LongBreak),
            other => Err(format!("unknown phase kind: {other}")),
        }
    }
}

/// User-configurable durations.
///
/// All four values must be positive; use [`Settings::validate`] before
/// handing externally supplied values to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_work_minutes")]
    pub work_minutes: u32,
    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: u32,
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u32,
    #[serde(default = "default_cycles_before_long_break")]
    pub cycles_before_long_break: u32,
}

fn default_work_minutes() -> u32 {
    25
}
fn default_short_break_minutes() -> u32 {
    5
}
fn default_long_break_minutes() -> u32 {
    15
}
fn default_cycles_before_long_break() -> u32 {
    4
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_minutes: default_work_minutes(),
            short_break_minutes: default_short_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            cycles_before_long_break: default_cycles_before_long_break(),
        }
    }
}

impl Settings {
    pub fn new(
        work_minutes: u32,
        short_break_minutes: u32,
        long_break_minutes: u32,
        cycles_before_long_break: u32,
    ) -> Result<Self, ConfigError> {
        let settings = Self {
            work_minutes,
            short_break_minutes,
            long_break_minutes,
            cycles_before_long_break,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Reject any zero value, naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("work_minutes", self.work_minutes),
            ("short_break_minutes", self.short_break_minutes),
            ("long_break_minutes", self.long_break_minutes),
            ("cycles_before_long_break", self.cycles_before_long_break),
        ];
        for (key, value) in fields {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must be greater than zero".into(),
                });
            }
        }
        Ok(())
    }

    /// Duration in minutes for a phase kind.
    pub fn duration_for(&self, kind: PhaseKind) -> u32 {
        match kind {
            PhaseKind::Work => self.work_minutes,
            PhaseKind::ShortBreak => self.short_break_minutes,
            PhaseKind::LongBreak => self.long_break_minutes,
        }
    }

    /// Duration in seconds for a phase kind.
    ///
    /// Uses saturating arithmetic to prevent overflow with large values.
    pub fn seconds_for(&self, kind: PhaseKind) -> u64 {
        u64::from(self.duration_for(kind)).saturating_mul(60)
    }
}
