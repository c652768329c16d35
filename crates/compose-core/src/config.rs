//! Environment-style settings for one compose invocation.
use std::{path::PathBuf, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use compose_model::Flag;

pub const ENV_BASE_DIR: &str = "BASE_DIR";
pub const ENV_OUTPUT_DIR: &str = "OUTPUT_DIR";
pub const ENV_OLD_LIMIT: &str = "OLD_LIMIT";
pub const ENV_MAX_WORKERS: &str = "MAX_WORKERS";
pub const ENV_BUILDER: &str = "APPSTREAM_BUILDER";
pub const ENV_ORIGIN: &str = "APPSTREAM_ORIGIN";
pub const ENV_TEMP_DIR: &str = "APPSTREAM_TEMP_DIR";
pub const ENV_TAR: &str = "TAR_PROGRAM";
pub const ENV_FAIL_ON_NONZERO: &str = "FAIL_ON_NONZERO";
pub const ENV_BUILD_TIMEOUT: &str = "BUILD_TIMEOUT_SECS";
pub const ENV_ATOMIC_PUBLISH: &str = "ATOMIC_PUBLISH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable(s): {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings of one run over all repositories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeConfig {
    /// Directory whose immediate subdirectories are repositories.
    pub base_dir: PathBuf,
    /// Output root; excluded from the scan when it lives under `base_dir`.
    pub output_dir: PathBuf,
    /// Run directories kept per repository.
    #[serde(default = "default_keep")]
    pub keep: usize,
    /// Repositories processed at the same time.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_builder")]
    pub builder: String,
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Builder temp root; each repository gets `<temp_root>/<repo>`.
    #[serde(default = "default_temp_root")]
    pub temp_root: PathBuf,
    #[serde(default = "default_archiver")]
    pub archiver: String,
    /// Treat a non-zero exit of the builder or archiver as a stage failure.
    #[serde(default)]
    pub fail_on_non_zero: Flag,
    /// Kill a child still running after this many seconds. Unset waits forever.
    #[serde(default)]
    pub build_timeout_secs: Option<u64>,
    /// Publish through a temporary link and `rename` instead of remove-then-link.
    #[serde(default = "Flag::disabled")]
    pub atomic_publish: Flag,
}

fn default_keep() -> usize {
    5
}

fn default_workers() -> usize {
    5
}

fn default_builder() -> String {
    "appstream-builder".into()
}

fn default_origin() -> String {
    "terra".into()
}

fn default_temp_root() -> PathBuf {
    PathBuf::from("/tmp/appstream")
}

fn default_archiver() -> String {
    "tar".into()
}

impl ComposeConfig {
    /// Config with the two required paths and defaults for everything else.
    pub fn new(base_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            output_dir: output_dir.into(),
            keep: default_keep(),
            workers: default_workers(),
            builder: default_builder(),
            origin: default_origin(),
            temp_root: default_temp_root(),
            archiver: default_archiver(),
            fail_on_non_zero: Flag::enabled(),
            build_timeout_secs: None,
            atomic_publish: Flag::disabled(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    ///
    /// All missing required variables are reported together.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_dir = get(ENV_BASE_DIR);
        let output_dir = get(ENV_OUTPUT_DIR);
        let (base_dir, output_dir) = match (base_dir, output_dir) {
            (Some(b), Some(o)) => (b, o),
            (b, o) => {
                let mut missing = Vec::new();
                if b.is_none() {
                    missing.push(ENV_BASE_DIR);
                }
                if o.is_none() {
                    missing.push(ENV_OUTPUT_DIR);
                }
                return Err(ConfigError::Missing(missing));
            }
        };

        let mut cfg = Self::new(base_dir, output_dir);
        if let Some(v) = get(ENV_OLD_LIMIT) {
            cfg.keep = parse(ENV_OLD_LIMIT, &v)?;
        }
        if let Some(v) = get(ENV_MAX_WORKERS) {
            cfg.workers = parse(ENV_MAX_WORKERS, &v)?;
        }
        if let Some(v) = get(ENV_BUILDER) {
            cfg.builder = v;
        }
        if let Some(v) = get(ENV_ORIGIN) {
            cfg.origin = v;
        }
        if let Some(v) = get(ENV_TEMP_DIR) {
            cfg.temp_root = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_TAR) {
            cfg.archiver = v;
        }
        if let Some(v) = get(ENV_FAIL_ON_NONZERO) {
            cfg.fail_on_non_zero = parse(ENV_FAIL_ON_NONZERO, &v)?;
        }
        if let Some(v) = get(ENV_BUILD_TIMEOUT) {
            cfg.build_timeout_secs = Some(parse(ENV_BUILD_TIMEOUT, &v)?);
        }
        if let Some(v) = get(ENV_ATOMIC_PUBLISH) {
            cfg.atomic_publish = parse(ENV_ATOMIC_PUBLISH, &v)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Rules:
    /// - `keep >= 1`: zero would delete the run `latest` was just pointed at;
    /// - `workers >= 1`;
    /// - `build_timeout_secs`, when set, is non-zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keep == 0 {
            return Err(invalid(ENV_OLD_LIMIT, "0", "must keep at least one run"));
        }
        if self.workers == 0 {
            return Err(invalid(ENV_MAX_WORKERS, "0", "need at least one worker"));
        }
        if self.build_timeout_secs == Some(0) {
            return Err(invalid(ENV_BUILD_TIMEOUT, "0", "timeout must be non-zero"));
        }
        Ok(())
    }

    pub fn build_timeout(&self) -> Option<Duration> {
        self.build_timeout_secs.map(Duration::from_secs)
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, value, &e.to_string()))
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
