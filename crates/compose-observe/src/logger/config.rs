use serde::{Deserialize, Serialize};
use std::io::IsTerminal;

use crate::logger::{
    error::{LoggerError, LoggerResult},
    object::{LoggerFormat, LoggerLevel, LoggerTimeZone},
};

const ENV_FORMAT: &str = "LOG_FORMAT";
const ENV_LEVEL: &str = "LOG_LEVEL";
const ENV_TZ: &str = "LOG_TZ";
const ENV_COLOR: &str = "LOG_COLOR";
const ENV_TARGETS: &str = "LOG_TARGETS";

/// Logger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Output format.
    pub format: LoggerFormat,
    /// Log level filter expression (e.g., "info", "compose_core=debug,info").
    pub level: LoggerLevel,
    /// Timezone for timestamps.
    pub tz: LoggerTimeZone,
    /// Whether to include module/target names in log output.
    pub with_targets: bool,
    /// Whether to use colored output.
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::default(),
            level: LoggerLevel::default(),
            tz: LoggerTimeZone::default(),
            with_targets: true,
            use_color: true,
        }
    }
}

impl LoggerConfig {
    /// Reads `LOG_FORMAT`, `LOG_LEVEL`, `LOG_TZ`, `LOG_COLOR` and `LOG_TARGETS`
    /// from the process environment. Unset variables keep their defaults.
    pub fn from_env() -> LoggerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LoggerConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> LoggerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = lookup(ENV_FORMAT) {
            cfg.format = v.parse()?;
        }
        if let Some(v) = lookup(ENV_LEVEL) {
            cfg.level = v.parse()?;
        }
        if let Some(v) = lookup(ENV_TZ) {
            cfg.tz = v.parse()?;
        }
        if let Some(v) = lookup(ENV_COLOR) {
            cfg.use_color = parse_bool(ENV_COLOR, &v)?;
        }
        if let Some(v) = lookup(ENV_TARGETS) {
            cfg.with_targets = parse_bool(ENV_TARGETS, &v)?;
        }
        Ok(cfg)
    }

    /// Color is used only when enabled in config AND stdout is a terminal.
    ///
    /// Call during logger initialization, not while parsing config.
    pub fn should_use_color(&self) -> bool {
        self.use_color && std::io::stdout().is_terminal()
    }
}

fn parse_bool(key: &'static str, value: &str) -> LoggerResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(LoggerError::InvalidBool {
            key,
            value: value.to_string(),
        }),
    }
}
