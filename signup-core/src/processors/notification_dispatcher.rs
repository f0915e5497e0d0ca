//! NotificationDispatcher processor.
//!
//! Receives `NotificationEvent`s from the queue and hands each one to a
//! `NotificationSink`, retrying failed deliveries with exponential backoff
//! (2^0 to 2^11 seconds). Each event is delivered on its own task so one
//! slow recipient does not hold up the rest of the queue.

use crate::events::{NotificationEvent, NotificationEventReceiver};
use async_trait::async_trait;
use signup_sdk::objects::notification::NotificationPayload;
use signup_sdk::signature::{SIGNATURE_HEADER, SignedObject};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use url::Url;

/// Largest backoff exponent (2^11 = 2048 seconds).
const MAX_RETRY_EXPONENT: u32 = 11;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The recipient answered with a non-success status.
    #[error("delivery failed with status {status}: {body}")]
    DeliveryFailed { status: u16, body: String },

    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Where confirmation messages go.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), NotificationError>;
}

/// Writes notifications to the log only. Used when no mailer is configured.
pub struct LoggingSink;

#[async_trait]
impl NotificationSink for LoggingSink {
    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), NotificationError> {
        info!(?payload, "Notification");
        Ok(())
    }
}

/// Posts signed JSON payloads to a mailer service.
pub struct WebhookSink {
    http_client: reqwest::Client,
    url: Url,
    secret: Box<[u8]>,
}

impl WebhookSink {
    pub fn new(url: Url, secret: &[u8]) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            url,
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), NotificationError> {
        let signed = SignedObject::new(payload.clone(), &self.secret)?;
        let response = self
            .http_client
            .post(self.url.clone())
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signed.to_header())
            .body(signed.json)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(NotificationError::DeliveryFailed {
                status: status.as_u16(),
                body,
            })
        }
    }
}

pub struct NotificationDispatcher {
    sink: Arc<dyn NotificationSink>,
    notification_rx: NotificationEventReceiver,
    shutdown_rx: watch::Receiver<bool>,
    max_attempts: u32,
}

impl NotificationDispatcher {
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        notification_rx: NotificationEventReceiver,
        shutdown_rx: watch::Receiver<bool>,
        max_attempts: u32,
    ) -> Self {
        Self {
            sink,
            notification_rx,
            shutdown_rx,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Run until shutdown is signalled, or until every sender is dropped and
    /// the deliveries already started have finished.
    ///
    /// Deliveries still retrying at shutdown are abandoned.
    pub async fn run(mut self) {
        info!("NotificationDispatcher started");
        let mut deliveries = JoinSet::new();
        let mut queue_open = true;

        loop {
            if !queue_open && deliveries.is_empty() {
                break;
            }

            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("NotificationDispatcher received shutdown signal");
                        break;
                    }
                }

                event = self.notification_rx.recv(), if queue_open => match event {
                    Some(event) => {
                        debug!(event = ?event, "Received NotificationEvent");
                        let sink = self.sink.clone();
                        let shutdown_rx = self.shutdown_rx.clone();
                        let max_attempts = self.max_attempts;
                        deliveries.spawn(deliver_with_retry(sink, event, shutdown_rx, max_attempts));
                    }
                    None => {
                        info!(in_flight = deliveries.len(), "NotificationEvent channel closed");
                        queue_open = false;
                    }
                },

                Some(joined) = deliveries.join_next(), if !deliveries.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Notification delivery task failed");
                    }
                }
            }
        }

        if !deliveries.is_empty() {
            warn!(in_flight = deliveries.len(), "Abandoning notification deliveries");
        }
        deliveries.shutdown().await;

        info!("NotificationDispatcher shutdown complete");
    }
}

async fn deliver_with_retry(
    sink: Arc<dyn NotificationSink>,
    event: NotificationEvent,
    mut shutdown_rx: watch::Receiver<bool>,
    max_attempts: u32,
) {
    let subject_id = event.subject_id();
    let payload = event.to_payload(time::OffsetDateTime::now_utc().unix_timestamp());

    for attempt in 0..max_attempts {
        match sink.deliver(&payload).await {
            Ok(()) => {
                info!(%subject_id, attempt, "Notification delivered");
                return;
            }
            Err(e) => {
                warn!(%subject_id, attempt, error = %e, "Notification delivery failed");
            }
        }

        if attempt + 1 == max_attempts {
            break;
        }
        if !sleep_unless_shutdown(calculate_retry_delay(attempt), &mut shutdown_rx).await {
            return;
        }
    }

    error!(%subject_id, max_attempts, "Giving up on notification");
}

/// Returns `false` if shutdown was signalled before `delay` elapsed.
async fn sleep_unless_shutdown(delay: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            biased;
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    return false;
                }
            }
            _ = &mut sleep => return true,
        }
    }
}

/// Calculate the delay before the next retry.
pub fn calculate_retry_delay(retry_count: u32) -> Duration {
    let seconds = 2u64.pow(retry_count.min(MAX_RETRY_EXPONENT));
    Duration::from_secs(seconds)
}
