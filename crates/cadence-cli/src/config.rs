use anyhow::Result;
use cadence_core::error::CoreError;
use cadence_core::models::EngineConfig;
use cadence_core::nudge::NudgePolicy;
use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::str::FromStr;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// SQLite database file
    pub database_path: String,
    /// IANA timezone defining calendar days; the system timezone when unset
    pub timezone: Option<String>,
    pub nudge: NudgeConfig,
    pub habit: HabitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "cadence.db".to_string(),
            timezone: None,
            nudge: NudgeConfig::default(),
            habit: HabitConfig::default(),
        }
    }
}

/// Review cadence for someday tasks
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct NudgeConfig {
    pub interval_days: u32,
    pub max_nudge_count: u32,
}

impl Default for NudgeConfig {
    fn default() -> Self {
        let policy = NudgePolicy::default();
        Self {
            interval_days: policy.interval_days,
            max_nudge_count: policy.max_nudge_count,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct HabitConfig {
    /// Grace period for habits created without `--grace`
    pub default_grace_period_days: u32,
}

impl Config {
    /// Loads `config.toml`, overridden by `CADENCE_*` environment variables.
    ///
    /// Nested keys use a double underscore, e.g. `CADENCE_NUDGE__INTERVAL_DAYS=14`.
    pub fn new() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("CADENCE_").split("__"))
            .extract()
    }

    pub fn timezone(&self) -> Result<Tz, CoreError> {
        match &self.timezone {
            Some(name) => validate_timezone(name),
            None => Ok(detect_system_timezone()),
        }
    }

    pub fn engine_config(&self) -> Result<EngineConfig> {
        Ok(EngineConfig {
            timezone: self.timezone()?,
            nudge: NudgePolicy {
                interval_days: self.nudge.interval_days,
                max_nudge_count: self.nudge.max_nudge_count,
            },
            default_grace_period_days: self.habit.default_grace_period_days,
        })
    }
}

/// Validates that a timezone string is a valid IANA timezone name
pub fn validate_timezone(timezone: &str) -> Result<Tz, CoreError> {
    Tz::from_str(timezone.trim()).map_err(|_| {
        CoreError::InvalidTimezone(format!(
            "'{}'. Use IANA timezone names like 'America/New_York'",
            timezone
        ))
    })
}

/// Detects the system timezone, falling back to UTC if detection fails
pub fn detect_system_timezone() -> Tz {
    // Check TZ environment variable
    if let Ok(tz) = std::env::var("TZ") {
        if let Ok(tz) = validate_timezone(&tz) {
            return tz;
        }
    }

    if let Ok(local_tz) = iana_time_zone::get_timezone() {
        if let Ok(tz) = validate_timezone(&local_tz) {
            return tz;
        }
    }

    // Fallback to UTC
    Tz::UTC
}
