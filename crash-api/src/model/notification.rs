use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationVariant {
    Info,
    Success,
    Destructive,
}

/// User-visible feedback for a success or failure path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: NotificationVariant,
}

impl Notification {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        variant: NotificationVariant,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant,
        }
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(title, description, NotificationVariant::Success)
    }

    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(title, description, NotificationVariant::Info)
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(title, description, NotificationVariant::Destructive)
    }

    pub fn is_error(&self) -> bool {
        self.variant == NotificationVariant::Destructive
    }
}
