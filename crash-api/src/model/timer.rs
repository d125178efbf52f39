use serde::{Deserialize, Serialize};
use std::fmt;

/// Live countdown value derived from a branch's authoritative end time.
///
/// Recomputed on every tick and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashTimerState {
    remaining_seconds: u64,
    expired: bool,
}

impl CrashTimerState {
    pub fn new(remaining_seconds: u64, expired: bool) -> Self {
        Self {
            remaining_seconds,
            expired,
        }
    }

    /// The value shown for a branch that is not crashing.
    pub fn ended() -> Self {
        Self::new(0, true)
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub fn expired(&self) -> bool {
        self.expired
    }

    /// Countdown as `MM:SS`, or `H:MM:SS` from one hour up.
    pub fn display(&self) -> String {
        let hours = self.remaining_seconds / 3600;
        let minutes = (self.remaining_seconds % 3600) / 60;
        let seconds = self.remaining_seconds % 60;
        if hours > 0 {
            format!("{}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{:02}:{:02}", minutes, seconds)
        }
    }
}

impl fmt::Display for CrashTimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats() {
        assert_eq!(CrashTimerState::new(30, false).display(), "00:30");
        assert_eq!(CrashTimerState::new(14 * 60 + 5, false).display(), "14:05");
        assert_eq!(CrashTimerState::new(3600, false).display(), "1:00:00");
        assert_eq!(CrashTimerState::ended().display(), "00:00");
    }
}
