//! Stage configuration.
//!
//! # Responsibility
//! - Hold the tunables of a stage session (debounce quiet period, retry
//!   bound, log level, database location).
//! - Load them from a JSON file and apply environment overrides.
//!
//! # Invariants
//! - A validated config has a non-zero quiet period.
//! - `flush_retry_limit` is bounded by `MAX_FLUSH_RETRY_LIMIT`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Quiet period observed between the last keystroke and the background save.
pub const DEFAULT_QUIET_PERIOD_MS: u64 = 3000;
/// Upper bound for immediate re-attempts of a failed flush.
pub const MAX_FLUSH_RETRY_LIMIT: u32 = 5;

pub const ENV_QUIET_PERIOD_MS: &str = "STORYSTAGE_QUIET_PERIOD_MS";
pub const ENV_DB_PATH: &str = "STORYSTAGE_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "STORYSTAGE_LOG_LEVEL";

const DEFAULT_DB_FILE_NAME: &str = "storystage.sqlite3";

/// Tunables for a stage session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StageConfig {
    /// Debounce quiet period in milliseconds.
    pub quiet_period_ms: u64,
    /// Extra attempts after a failed flush. `0` keeps the failure and waits
    /// for the next save trigger.
    pub flush_retry_limit: u32,
    /// Log level name passed to `init_logging`.
    pub log_level: String,
    /// SQLite database path. `None` resolves to the temp directory.
    pub db_path: Option<PathBuf>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: DEFAULT_QUIET_PERIOD_MS,
            flush_retry_limit: 0,
            log_level: crate::logging::default_log_level().to_string(),
            db_path: None,
        }
    }
}

impl StageConfig {
    /// Parses a JSON config document and validates it.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|err| ConfigError::Io {
            path: path.as_ref().to_path_buf(),
            source: err,
        })?;
        Self::from_json(&text)
    }

    /// Applies `STORYSTAGE_*` environment overrides and re-validates.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides from `lookup`; blank values are ignored.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(raw) = read(ENV_QUIET_PERIOD_MS) {
            self.quiet_period_ms = raw.parse().map_err(|_| ConfigError::InvalidValue {
                field: "quiet_period_ms",
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = read(ENV_DB_PATH) {
            self.db_path = Some(PathBuf::from(raw));
        }
        if let Some(raw) = read(ENV_LOG_LEVEL) {
            self.log_level = raw;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quiet_period_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "quiet_period_ms",
                value: "0".to_string(),
            });
        }
        if self.flush_retry_limit > MAX_FLUSH_RETRY_LIMIT {
            return Err(ConfigError::InvalidValue {
                field: "flush_retry_limit",
                value: self.flush_retry_limit.to_string(),
            });
        }
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "log_level",
                value: self.log_level.clone(),
            });
        }
        Ok(())
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    /// Returns the configured database path, or the temp-dir default.
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME))
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    InvalidValue { field: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config document: {err}"),
            Self::InvalidValue { field, value } => {
                write!(f, "invalid value `{value}` for config field `{field}`")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}
