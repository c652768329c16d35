use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Boolean switch with explicit enable/disable semantics.
///
/// Parses the usual environment spellings (`true`/`false`, `1`/`0`, `yes`/`no`, `on`/`off`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flag(bool);

impl Flag {
    /// Create an enabled flag.
    pub const fn enabled() -> Self {
        Self(true)
    }

    /// Create a disabled flag.
    pub const fn disabled() -> Self {
        Self(false)
    }

    /// Check if the flag is enabled.
    pub const fn is_enabled(&self) -> bool {
        self.0
    }

    /// Check if the flag is disabled.
    pub const fn is_disabled(&self) -> bool {
        !self.0
    }
}

impl Default for Flag {
    fn default() -> Self {
        Self::enabled()
    }
}

impl From<bool> for Flag {
    fn from(b: bool) -> Self {
        Self(b)
    }
}

impl From<Flag> for bool {
    fn from(f: Flag) -> Self {
        f.0
    }
}

impl FromStr for Flag {
    type Err = ModelError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Self::enabled()),
            "false" | "0" | "no" | "off" => Ok(Self::disabled()),
            _ => Err(ModelError::InvalidFlag(s.to_string())),
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0 { "enabled" } else { "disabled" })
    }
}
