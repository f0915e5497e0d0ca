//! Side-effect events emitted by committed writes.
//!
//! Writers enqueue a [`NotificationEvent`] from inside their critical
//! section, after the write is persisted, without waiting for queue space.
//! The
//! [`NotificationDispatcher`](crate::processors::notification_dispatcher::NotificationDispatcher)
//! drains the channel and delivers each event with retries.

pub mod channels;
pub mod types;

pub use channels::{
    DEFAULT_CHANNEL_BUFFER, NotificationEventReceiver, NotificationEventSender,
    enqueue_notification, notification_channel,
};
pub use types::NotificationEvent;
