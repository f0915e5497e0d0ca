use crate::entities::RoleRef;
use signup_sdk::objects::notification::NotificationPayload;
use uuid::Uuid;

/// A confirmation message owed to a participant or buyer.
///
/// Emitted exactly once per successful state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    RegistrationConfirmed {
        registration_id: Uuid,
        role: RoleRef,
        email: String,
        name: Option<String>,
    },
    PurchaseCompleted {
        purchase_id: Uuid,
        program_id: Uuid,
        user_id: Uuid,
        class_rep: bool,
    },
}

impl NotificationEvent {
    /// Id of the record the event is about, for logging.
    pub fn subject_id(&self) -> Uuid {
        match self {
            NotificationEvent::RegistrationConfirmed {
                registration_id, ..
            } => *registration_id,
            NotificationEvent::PurchaseCompleted { purchase_id, .. } => *purchase_id,
        }
    }

    pub fn to_payload(&self, timestamp: i64) -> NotificationPayload {
        match self.clone() {
            NotificationEvent::RegistrationConfirmed {
                registration_id,
                role,
                email,
                name,
            } => NotificationPayload::RegistrationConfirmed {
                registration_id,
                event_id: role.event_id,
                role_id: role.role_id,
                email,
                name,
                timestamp,
            },
            NotificationEvent::PurchaseCompleted {
                purchase_id,
                program_id,
                user_id,
                class_rep,
            } => NotificationPayload::PurchaseCompleted {
                purchase_id,
                program_id,
                user_id,
                class_rep,
                timestamp,
            },
        }
    }
}
