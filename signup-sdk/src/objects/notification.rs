//! Payloads posted to the mailer webhook for confirmation messages.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::signature::Signature;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum NotificationPayload {
    RegistrationConfirmed {
        registration_id: Uuid,
        event_id: Uuid,
        role_id: Uuid,
        email: String,
        name: Option<String>,
        timestamp: i64,
    },
    PurchaseCompleted {
        purchase_id: Uuid,
        program_id: Uuid,
        user_id: Uuid,
        class_rep: bool,
        timestamp: i64,
    },
}

impl Signature for NotificationPayload {}
