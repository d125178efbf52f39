use crate::model::notification::Notification;

/// Fire-and-forget user feedback.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}
