use std::{fmt, str::FromStr};

use time::OffsetDateTime;

use crate::ModelError;

const STAMP_LEN: usize = 12;

/// Minute-resolution run timestamp, rendered as `YYYYMMDDHHMM`.
///
/// Stamps are fixed width and zero padded, so lexicographic order of the
/// rendered names is chronological order. Retention relies on this: changing
/// the format means re-validating that ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunStamp(String);

impl RunStamp {
    /// Stamp for the minute containing `at`.
    pub fn from_datetime(at: OffsetDateTime) -> Self {
        Self(format!(
            "{:04}{:02}{:02}{:02}{:02}",
            at.year(),
            u8::from(at.month()),
            at.day(),
            at.hour(),
            at.minute(),
        ))
    }

    /// Returns `true` if `name` is a well-formed run stamp.
    pub fn is_run_stamp(name: &str) -> bool {
        name.parse::<RunStamp>().is_ok()
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RunStamp {
    type Err = ModelError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ModelError::InvalidStamp(s.to_string());
        if s.len() != STAMP_LEN || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let field = |range: std::ops::Range<usize>| s[range].parse::<u32>().map_err(|_| invalid());
        let (month, day, hour, minute) = (field(4..6)?, field(6..8)?, field(8..10)?, field(10..12)?);
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) || hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for RunStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
