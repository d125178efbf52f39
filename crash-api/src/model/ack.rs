use serde::{Deserialize, Serialize};

/// What the pricing service reports back after a trigger or end call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashAck {
    /// Human-readable message from the backend, if any.
    #[serde(default)]
    pub message: Option<String>,

    /// Number of item prices reset to floor when a crash ends.
    #[serde(default)]
    pub reset_count: Option<u64>,
}

impl CrashAck {
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_reset_count(mut self, count: u64) -> Self {
        self.reset_count = Some(count);
        self
    }
}
