//! # Crash API
//!
//! The shared vocabulary of the market-crash lifecycle manager: the branch
//! crash records mirrored from the backend, the allowed trigger options, the
//! derived countdown value, confirmation intents and notifications, plus the
//! collaborator traits the core consumes (branch directory, pricing service,
//! notification sink).

pub mod error;
pub mod model;
pub mod traits;

pub use error::{CrashError, Result, ValidationError};
pub use model::ack::CrashAck;
pub use model::branch::{BranchCrashState, BranchId, BranchSummary, CrashWindow};
pub use model::history::{CrashBadge, CrashHistoryEntry};
pub use model::intent::{ConfirmationIntent, IntentKind};
pub use model::notification::{Notification, NotificationVariant};
pub use model::options::{CrashDuration, CrashIntensity};
pub use model::timer::CrashTimerState;
pub use traits::directory::BranchDirectory;
pub use traits::notifier::NotificationSink;
pub use traits::pricing::PricingService;

pub mod prelude {
    pub use crate::error::{CrashError, ValidationError};
    pub use crate::model::branch::{BranchCrashState, BranchId, BranchSummary};
    pub use crate::model::options::{CrashDuration, CrashIntensity};
    pub use crate::traits::directory::BranchDirectory;
    pub use crate::traits::notifier::NotificationSink;
    pub use crate::traits::pricing::PricingService;
}
