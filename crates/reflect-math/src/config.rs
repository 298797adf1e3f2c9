//! Configuration for the conversion engine.
//!
//! # Configuration Sources
//!
//! - Environment variables (prefixed with `REFLECT_`)
//! - Any serde format (the structs derive `Serialize`/`Deserialize`)
//! - Programmatic defaults
//!
//! # Example
//!
//! ```rust
//! use reflect_math::config::ReflectConfig;
//!
//! let config = ReflectConfig::builder()
//!     .max_fixup_rounds(4)
//!     .trace_balances(true)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.fixup.max_rounds, 4);
//! ```

use crate::{ReflectError, Result};
use serde::{Deserialize, Serialize};
use tracing::Level;

pub const DEFAULT_MAX_FIXUP_ROUNDS: u32 = 3;
pub const HARD_MAX_FIXUP_ROUNDS: u32 = 16;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Complete engine configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectConfig {
    /// Rounding-correction configuration.
    pub fixup: FixupConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl ReflectConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ReflectConfigBuilder {
        ReflectConfigBuilder::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Looks for variables prefixed with `REFLECT_`:
    /// - `REFLECT_MAX_FIXUP_ROUNDS` - Rounding-correction rounds per leg
    /// - `REFLECT_LOG_LEVEL` - Logging level (trace, debug, info, warn, error)
    /// - `REFLECT_TRACE_BALANCES` - Emit `TraceEvent`s to the configured hook (true/false)
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(rounds) = std::env::var("REFLECT_MAX_FIXUP_ROUNDS") {
            config.fixup.max_rounds = rounds.parse().map_err(|e| {
                ReflectError::ConfigError(format!("Invalid REFLECT_MAX_FIXUP_ROUNDS: {}", e))
            })?;
        }

        if let Ok(level) = std::env::var("REFLECT_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Ok(flag) = std::env::var("REFLECT_TRACE_BALANCES") {
            config.logging.trace_balances = flag.parse().map_err(|e| {
                ReflectError::ConfigError(format!("Invalid REFLECT_TRACE_BALANCES: {}", e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.fixup.max_rounds == 0 || self.fixup.max_rounds > HARD_MAX_FIXUP_ROUNDS {
            return Err(ReflectError::ConfigError(format!(
                "max_rounds must be between 1 and {}",
                HARD_MAX_FIXUP_ROUNDS
            )));
        }

        self.logging.tracing_level()?;

        Ok(())
    }
}

/// Rounding-correction configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixupConfig {
    /// Upper bound on correction rounds for a transfer.
    pub max_rounds: u32,
}

impl Default for FixupConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_FIXUP_ROUNDS,
        }
    }
}

/// Logging configuration.
///
/// The engine only emits `tracing` events and never installs a subscriber. `level` is advisory:
/// callers read it through `tracing_level` when they set up their own subscriber.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Whether intermediate balances are reported to the trace hook.
    pub trace_balances: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            trace_balances: false,
        }
    }
}

impl LoggingConfig {
    /// The configured level as a `tracing::Level`.
    pub fn tracing_level(&self) -> Result<Level> {
        if !LOG_LEVELS.contains(&self.level.as_str()) {
            return Err(ReflectError::ConfigError(format!(
                "unknown log level: {}",
                self.level
            )));
        }
        self.level
            .parse()
            .map_err(|e| ReflectError::ConfigError(format!("unknown log level: {}", e)))
    }
}

/// Builder for ReflectConfig.
#[derive(Default)]
pub struct ReflectConfigBuilder {
    config: ReflectConfig,
}

impl ReflectConfigBuilder {
    /// Set the number of rounding-correction rounds.
    pub fn max_fixup_rounds(mut self, rounds: u32) -> Self {
        self.config.fixup.max_rounds = rounds;
        self
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Enable balance tracing.
    pub fn trace_balances(mut self, enabled: bool) -> Self {
        self.config.logging.trace_balances = enabled;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<ReflectConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
