//! Long-running background processors.

pub mod notification_dispatcher;

pub use notification_dispatcher::{
    LoggingSink, NotificationDispatcher, NotificationError, NotificationSink, WebhookSink,
};
