use crash::{Notification, NotificationSink, NotificationVariant};
use log::{error, info};

/// Writes notifications to the log. Destructive ones go out at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.variant {
            NotificationVariant::Destructive => {
                error!("{}: {}", notification.title, notification.description)
            }
            NotificationVariant::Success | NotificationVariant::Info => {
                info!("{}: {}", notification.title, notification.description)
            }
        }
    }
}
