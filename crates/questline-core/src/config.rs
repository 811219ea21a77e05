//! Configuration loading and typed config structures for the progress engine.
//!
//! The canonical configuration lives in `questline-config.yaml` next to the
//! binary. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads and validates the file.
//! Every field has a default, so an empty file (or no file) is valid.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use uuid::Uuid;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is outside its allowed range.
    #[error("invalid config value: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
///
/// Mirrors the structure of `questline-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// Fixed time zone used for day boundaries.
    #[serde(default)]
    pub clock: ClockConfig,

    /// Idle-economy constants.
    #[serde(default)]
    pub economy: EconomyConfig,

    /// Daily bonus amounts.
    #[serde(default)]
    pub rewards: RewardsConfig,

    /// Debounce and presence timing.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Local storage location.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Remote store and HTTP port.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// The account the binary activates a session for.
    #[serde(default)]
    pub account: AccountConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `DATABASE_URL` overrides `infrastructure.postgres_url`
    /// - `QUESTLINE_PORT` overrides `infrastructure.server_port`
    /// - `QUESTLINE_DATA_DIR` overrides `storage.data_dir`
    /// - `QUESTLINE_USER_ID` overrides `account.user_id`
    /// - `QUESTLINE_UTC_OFFSET_MINUTES` overrides `clock.utc_offset_minutes`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override values with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DATABASE_URL") {
            self.infrastructure.postgres_url = Some(val);
        }
        if let Ok(val) = std::env::var("QUESTLINE_PORT") {
            match val.parse() {
                Ok(port) => self.infrastructure.server_port = port,
                Err(e) => tracing::warn!(value = %val, error = %e, "ignoring invalid QUESTLINE_PORT"),
            }
        }
        if let Ok(val) = std::env::var("QUESTLINE_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("QUESTLINE_USER_ID") {
            match Uuid::parse_str(&val) {
                Ok(id) => self.account.user_id = Some(id),
                Err(e) => {
                    tracing::warn!(value = %val, error = %e, "ignoring invalid QUESTLINE_USER_ID");
                }
            }
        }
        if let Ok(val) = std::env::var("QUESTLINE_UTC_OFFSET_MINUTES") {
            match val.parse() {
                Ok(offset) => self.clock.utc_offset_minutes = offset,
                Err(e) => {
                    tracing::warn!(value = %val, error = %e, "ignoring invalid QUESTLINE_UTC_OFFSET_MINUTES");
                }
            }
        }
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.economy.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "economy.tick_interval_ms must be at least 1".to_owned(),
            });
        }
        if self.economy.passive_divisor <= 0.0 || !self.economy.passive_divisor.is_finite() {
            return Err(ConfigError::Invalid {
                reason: "economy.passive_divisor must be a positive number".to_owned(),
            });
        }
        if self.economy.energy_per_xp == 0 {
            return Err(ConfigError::Invalid {
                reason: "economy.energy_per_xp must be at least 1".to_owned(),
            });
        }
        if self.clock.utc_offset_minutes.unsigned_abs() >= 24 * 60 {
            return Err(ConfigError::Invalid {
                reason: "clock.utc_offset_minutes must be within one day".to_owned(),
            });
        }
        Ok(())
    }
}

/// Fixed time zone settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClockConfig {
    /// Offset from UTC in minutes (negative = west of Greenwich).
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: default_utc_offset_minutes(),
        }
    }
}

/// Idle-economy constants.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EconomyConfig {
    /// Real-time milliseconds between production ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Minimum production per tick before passive currency is earned.
    #[serde(default = "default_passive_threshold")]
    pub passive_threshold: f64,

    /// Divisor applied to production for passive currency.
    #[serde(default = "default_passive_divisor")]
    pub passive_divisor: f64,

    /// Fraction of offline energy granted as currency on catch-up.
    #[serde(default = "default_offline_currency_rate")]
    pub offline_currency_rate: f64,

    /// Energy exchanged for one point of score.
    #[serde(default = "default_energy_per_xp")]
    pub energy_per_xp: u32,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            passive_threshold: default_passive_threshold(),
            passive_divisor: default_passive_divisor(),
            offline_currency_rate: default_offline_currency_rate(),
            energy_per_xp: default_energy_per_xp(),
        }
    }
}

/// Daily bonus amounts: `daily_base + daily_per_streak * streak`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RewardsConfig {
    /// Flat part of the bonus.
    #[serde(default = "default_daily_base")]
    pub daily_base: u32,

    /// Bonus per streak day.
    #[serde(default = "default_daily_per_streak")]
    pub daily_per_streak: u32,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            daily_base: default_daily_base(),
            daily_per_streak: default_daily_per_streak(),
        }
    }
}

/// Remote write and presence timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyncConfig {
    /// Quiet period before a remote write fires.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Interval of the presence tick.
    #[serde(default = "default_presence_interval_ms")]
    pub presence_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            presence_interval_ms: default_presence_interval_ms(),
        }
    }
}

/// Local storage location.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Directory holding per-user progress files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Remote store and HTTP settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// `PostgreSQL` connection string. `None` disables the remote store.
    #[serde(default)]
    pub postgres_url: Option<String>,

    /// Progress API port.
    #[serde(default = "default_server_port")]
    pub server_port: u16,
}

/// The account the binary serves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AccountConfig {
    /// The learner's id.
    #[serde(default)]
    pub user_id: Option<Uuid>,

    /// Current login streak reported by the account service.
    #[serde(default)]
    pub streak: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

/// UTC-5 is a deployment choice, not a property of the engine. Deployments
/// in another zone set `clock.utc_offset_minutes` or
/// `QUESTLINE_UTC_OFFSET_MINUTES`.
const fn default_utc_offset_minutes() -> i32 {
    -300
}

const fn default_tick_interval_ms() -> u64 {
    1_000
}

const fn default_passive_threshold() -> f64 {
    10.0
}

const fn default_passive_divisor() -> f64 {
    20.0
}

const fn default_offline_currency_rate() -> f64 {
    0.10
}

const fn default_energy_per_xp() -> u32 {
    10
}

const fn default_daily_base() -> u32 {
    50
}

const fn default_daily_per_streak() -> u32 {
    10
}

const fn default_debounce_ms() -> u64 {
    5_000
}

const fn default_presence_interval_ms() -> u64 {
    60_000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("questline-data")
}

const fn default_server_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.economy.tick_interval_ms, 1_000);
        assert_eq!(config.sync.debounce_ms, 5_000);
        assert_eq!(config.rewards.daily_base, 50);
        assert_eq!(config.rewards.daily_per_streak, 10);
        assert_eq!(config.clock.utc_offset_minutes, -300);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
clock:
  utc_offset_minutes: 60

economy:
  tick_interval_ms: 500
  passive_threshold: 5
  passive_divisor: 10
  offline_currency_rate: 0.25
  energy_per_xp: 4

rewards:
  daily_base: 20
  daily_per_streak: 5

sync:
  debounce_ms: 2000
  presence_interval_ms: 30000

storage:
  data_dir: "/tmp/questline"

infrastructure:
  server_port: 9090

account:
  user_id: "0190a5c4-6a4b-7c3e-9f10-2b7d3c4e5f60"
  streak: 4

logging:
  level: "debug"
  json: true
"#;
        let config = EngineConfig::parse(yaml).unwrap();
        assert_eq!(config.clock.utc_offset_minutes, 60);
        assert_eq!(config.economy.tick_interval_ms, 500);
        assert_eq!(config.economy.energy_per_xp, 4);
        assert_eq!(config.rewards.daily_per_streak, 5);
        assert_eq!(config.sync.presence_interval_ms, 30_000);
        assert_eq!(config.account.streak, 4);
        assert!(config.logging.json);
    }

    #[test]
    fn empty_yaml_uses_defaults() {
        let config = EngineConfig::parse("{}").unwrap();
        assert_eq!(config.economy.energy_per_xp, 10);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let result = EngineConfig::parse("economy:\n  tick_interval_ms: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn deployment_offset_replaces_the_default_zone() {
        let config = EngineConfig::parse("clock:\n  utc_offset_minutes: 0\n").unwrap();
        assert_eq!(config.clock.utc_offset_minutes, 0);
        let config = EngineConfig::parse("clock:\n  utc_offset_minutes: 330\n").unwrap();
        assert_eq!(config.clock.utc_offset_minutes, 330);
    }

    #[test]
    fn offset_beyond_a_day_is_rejected() {
        let result = EngineConfig::parse("clock:\n  utc_offset_minutes: 1440\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let result = EngineConfig::parse("economy: [unclosed");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }
}
