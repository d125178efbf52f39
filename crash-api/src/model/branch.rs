//! Branch crash records, mirrored read-only from the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

fn default_duration_minutes() -> u32 {
    15
}

fn default_intensity_percent() -> u32 {
    50
}

/// Opaque, unique branch identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(String);

impl BranchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BranchId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Anything that carries the crash-relevant fields of a branch.
///
/// Implemented by both the full record and the list summary so the countdown
/// can be computed from either.
pub trait CrashWindow {
    fn is_active(&self) -> bool;

    fn start_time(&self) -> Option<DateTime<Utc>>;

    fn end_time(&self) -> Option<DateTime<Utc>>;

    fn duration_minutes(&self) -> u32;

    /// The explicit end time, or `start_time + duration_minutes` when the
    /// backend did not send one. `None` when neither can be known.
    fn effective_end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time().or_else(|| {
            self.start_time()
                .map(|start| start + chrono::Duration::minutes(i64::from(self.duration_minutes())))
        })
    }
}

/// The backend's record of a single branch's crash status.
///
/// When `active` is true the backend guarantees a start time and an end time
/// not earlier than it. Only the latest crash window is kept per branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchCrashState {
    branch_id: BranchId,

    #[serde(default)]
    name: String,

    #[serde(default)]
    active: bool,

    #[serde(default)]
    start_time: Option<DateTime<Utc>>,

    #[serde(default)]
    end_time: Option<DateTime<Utc>>,

    #[serde(default = "default_duration_minutes")]
    duration_minutes: u32,

    /// Kept for history display only.
    #[serde(default = "default_intensity_percent")]
    intensity_percent: u32,
}

impl BranchCrashState {
    /// Creates a branch that has never crashed.
    pub fn new(branch_id: BranchId, name: impl Into<String>) -> Self {
        Self {
            branch_id,
            name: name.into(),
            active: false,
            start_time: None,
            end_time: None,
            duration_minutes: default_duration_minutes(),
            intensity_percent: default_intensity_percent(),
        }
    }

    /// Opens a crash window at `start` for `duration_minutes`. The end time is
    /// left for the reader to derive.
    pub fn started_at(mut self, start: DateTime<Utc>, duration_minutes: u32) -> Self {
        self.active = true;
        self.start_time = Some(start);
        self.end_time = None;
        self.duration_minutes = duration_minutes;
        self
    }

    pub fn with_end_time(mut self, end: Option<DateTime<Utc>>) -> Self {
        self.end_time = end;
        self
    }

    pub fn with_intensity(mut self, intensity_percent: u32) -> Self {
        self.intensity_percent = intensity_percent;
        self
    }

    /// Closes the current crash window at `end`.
    pub fn ended_at(mut self, end: DateTime<Utc>) -> Self {
        self.active = false;
        self.end_time = Some(end);
        self
    }

    pub fn branch_id(&self) -> &BranchId {
        &self.branch_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name when the backend sent one, otherwise the id.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            self.branch_id.as_str()
        } else {
            &self.name
        }
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn intensity_percent(&self) -> u32 {
        self.intensity_percent
    }

    pub fn summary(&self) -> BranchSummary {
        BranchSummary {
            branch_id: self.branch_id.clone(),
            name: self.name.clone(),
            active: self.active,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_minutes: self.duration_minutes,
        }
    }
}

impl CrashWindow for BranchCrashState {
    fn is_active(&self) -> bool {
        self.active
    }

    fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }
}

/// One row of the branch list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchSummary {
    branch_id: BranchId,

    #[serde(default)]
    name: String,

    #[serde(default)]
    active: bool,

    #[serde(default)]
    start_time: Option<DateTime<Utc>>,

    #[serde(default)]
    end_time: Option<DateTime<Utc>>,

    #[serde(default = "default_duration_minutes")]
    duration_minutes: u32,
}

impl BranchSummary {
    pub fn branch_id(&self) -> &BranchId {
        &self.branch_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            self.branch_id.as_str()
        } else {
            &self.name
        }
    }

    pub fn active(&self) -> bool {
        self.active
    }
}

impl From<&BranchCrashState> for BranchSummary {
    fn from(state: &BranchCrashState) -> Self {
        state.summary()
    }
}

impl CrashWindow for BranchSummary {
    fn is_active(&self) -> bool {
        self.active
    }

    fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }
}
