use thiserror::Error;

/// A precondition failed locally. No network call was made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// An operation needs a selected branch and none is loaded.
    #[error("No branch is selected")]
    NoBranchSelected,

    /// Triggering while a crash window is already open for the branch.
    #[error("A market crash is already active for branch {0}")]
    CrashAlreadyActive(String),

    /// Ending a crash on a branch that is not crashing.
    #[error("No market crash is active for branch {0}")]
    CrashNotActive(String),

    /// Intensity outside the allowed set.
    #[error("Intensity {0}% is not allowed (expected one of 20, 35, 50, 75, 90)")]
    IntensityNotAllowed(u32),

    /// Duration outside the allowed set.
    #[error("Duration of {0} minutes is not allowed (expected one of 5, 10, 15, 30, 60)")]
    DurationNotAllowed(u32),

    /// A confirmed action is still settling, a new request must wait for it.
    #[error("Another confirmed action is still in progress")]
    ConfirmationPending,
}

/// Global error type for crash lifecycle operations.
///
/// `Clone` so that one coalesced refresh can hand the same failure to every
/// caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrashError {
    /// Blocked before any network call.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The backend answered with a failure or a structured error body.
    #[error("{message}")]
    Remote {
        /// HTTP status when the transport has one.
        status: Option<u16>,
        message: String,
    },

    /// The request did not complete.
    #[error("Network error: {0}")]
    Network(String),
}

impl CrashError {
    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CrashError::Validation(_))
    }

    /// `true` when the backend rejected the request because its state
    /// disagrees with ours (HTTP 409).
    pub fn is_conflict(&self) -> bool {
        matches!(self, CrashError::Remote { status: Some(409), .. })
    }
}

/// A specialized Result type for crash lifecycle operations.
pub type Result<T> = std::result::Result<T, CrashError>;
