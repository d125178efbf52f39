use crash::{Notification, NotificationSink};
use std::sync::Mutex;

/// Keeps every notification for later assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Notification> {
        self.notifications.lock().unwrap().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn errors(&self) -> Vec<Notification> {
        self.all().into_iter().filter(|n| n.is_error()).collect()
    }

    pub fn clear(&self) {
        self.notifications.lock().unwrap().clear();
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}
