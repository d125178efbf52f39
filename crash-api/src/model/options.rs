//! The trigger options an operator may pick for a crash.
//!
//! Both values are closed sets. A raw integer coming from a form or the
//! command line only becomes a `CrashIntensity` / `CrashDuration` through
//! `TryFrom<u32>`, so an out-of-range request never reaches the pricing
//! service.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How far prices move toward the floor price, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct CrashIntensity(u32);

impl CrashIntensity {
    /// The percentages offered to operators.
    pub const ALLOWED: [u32; 5] = [20, 35, 50, 75, 90];

    pub fn percent(&self) -> u32 {
        self.0
    }
}

impl Default for CrashIntensity {
    fn default() -> Self {
        Self(50)
    }
}

impl TryFrom<u32> for CrashIntensity {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if Self::ALLOWED.contains(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::IntensityNotAllowed(value))
        }
    }
}

impl From<CrashIntensity> for u32 {
    fn from(value: CrashIntensity) -> Self {
        value.0
    }
}

impl fmt::Display for CrashIntensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Length of a crash window, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct CrashDuration(u32);

impl CrashDuration {
    /// The durations offered to operators.
    pub const ALLOWED: [u32; 5] = [5, 10, 15, 30, 60];

    pub fn minutes(&self) -> u32 {
        self.0
    }

    pub fn as_chrono(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.0))
    }
}

impl Default for CrashDuration {
    fn default() -> Self {
        Self(15)
    }
}

impl TryFrom<u32> for CrashDuration {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if Self::ALLOWED.contains(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::DurationNotAllowed(value))
        }
    }
}

impl From<CrashDuration> for u32 {
    fn from(value: CrashDuration) -> Self {
        value.0
    }
}

impl fmt::Display for CrashDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} min", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(CrashIntensity::default().percent(), 50);
        assert_eq!(CrashDuration::default().minutes(), 15);
    }

    #[test]
    fn test_rejects_values_outside_allowed_set() {
        assert_eq!(
            CrashIntensity::try_from(40),
            Err(ValidationError::IntensityNotAllowed(40))
        );
        assert_eq!(
            CrashDuration::try_from(0),
            Err(ValidationError::DurationNotAllowed(0))
        );
        for value in CrashIntensity::ALLOWED {
            assert!(CrashIntensity::try_from(value).is_ok());
        }
        for value in CrashDuration::ALLOWED {
            assert!(CrashDuration::try_from(value).is_ok());
        }
    }

    #[test]
    fn test_serde_enforces_allowed_set() {
        let ok: CrashDuration = serde_json::from_str("30").unwrap();
        assert_eq!(ok.minutes(), 30);
        assert!(serde_json::from_str::<CrashDuration>("7").is_err());
        assert_eq!(serde_json::to_string(&CrashIntensity::default()).unwrap(), "50");
    }
}
