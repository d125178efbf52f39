use crate::model::branch::BranchId;
use crate::model::options::{CrashDuration, CrashIntensity};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentKind {
    Trigger,
    End,
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntentKind::Trigger => f.write_str("trigger"),
            IntentKind::End => f.write_str("end"),
        }
    }
}

/// An irreversible action waiting for operator confirmation.
///
/// Carries everything needed to run the action once confirmed. Discarded
/// without side effect when the operator cancels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationIntent {
    Trigger {
        branch_id: BranchId,
        intensity: CrashIntensity,
        duration: CrashDuration,
    },
    End {
        branch_id: BranchId,
    },
}

impl ConfirmationIntent {
    pub fn kind(&self) -> IntentKind {
        match self {
            ConfirmationIntent::Trigger { .. } => IntentKind::Trigger,
            ConfirmationIntent::End { .. } => IntentKind::End,
        }
    }

    pub fn branch_id(&self) -> &BranchId {
        match self {
            ConfirmationIntent::Trigger { branch_id, .. } => branch_id,
            ConfirmationIntent::End { branch_id } => branch_id,
        }
    }

    /// The question put to the operator.
    pub fn prompt(&self) -> String {
        match self {
            ConfirmationIntent::Trigger {
                branch_id,
                intensity,
                duration,
            } => format!(
                "Trigger a market crash on branch {} ({} toward floor price for {})?",
                branch_id, intensity, duration
            ),
            ConfirmationIntent::End { branch_id } => format!(
                "End the market crash on branch {}? Prices will be reset.",
                branch_id
            ),
        }
    }
}
