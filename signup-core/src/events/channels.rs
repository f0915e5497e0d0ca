use super::types::NotificationEvent;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

/// Default buffer size for event channels.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for NotificationEvent events.
pub type NotificationEventSender = mpsc::Sender<NotificationEvent>;
/// Receiver handle for NotificationEvent events.
pub type NotificationEventReceiver = mpsc::Receiver<NotificationEvent>;

/// Create a new NotificationEvent channel.
///
/// Multiple senders can be cloned from the returned sender; there is one
/// dispatcher per receiver.
pub fn notification_channel() -> (NotificationEventSender, NotificationEventReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Enqueue `event` without waiting for queue space.
///
/// Writers call this while holding a lock, so a backed-up dispatcher must not
/// stall them. A full or closed queue drops the event with a warning; the
/// write it describes is already committed. Returns whether it was queued.
pub fn enqueue_notification(sender: &NotificationEventSender, event: NotificationEvent) -> bool {
    match sender.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(event)) => {
            warn!(subject_id = %event.subject_id(), "Notification queue full, event dropped");
            false
        }
        Err(TrySendError::Closed(event)) => {
            warn!(subject_id = %event.subject_id(), "Notification queue closed, event dropped");
            false
        }
    }
}
