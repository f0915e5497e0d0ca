//! Purchase and payment provider types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::signature::Signature;

/// Body of `POST /purchases`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePurchaseRequest {
    pub user_id: Uuid,
    pub program_id: Uuid,
    /// Ask for one of the program's limited class-rep slots.
    #[serde(default)]
    pub request_class_rep: bool,
}

/// Purchase status for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Failed,
}

impl std::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PurchaseStatus::Pending => write!(f, "pending"),
            PurchaseStatus::Completed => write!(f, "completed"),
            PurchaseStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseResponse {
    pub purchase_id: Uuid,
    pub program_id: Uuid,
    pub status: PurchaseStatus,
    pub amount: Decimal,
    pub currency: String,
    pub class_rep: bool,
    pub checkout_session_id: Option<String>,
    pub checkout_url: Option<Url>,
}

/// Request sent to the payment provider to open a checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSessionRequest {
    /// Our purchase id, echoed back by the provider as client reference.
    pub client_reference_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
}

/// Provider response for a freshly created checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSessionResponse {
    pub session_id: String,
    pub url: Url,
}

/// Kind of asynchronous signal delivered by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentEventType {
    #[serde(rename = "checkout.session.completed")]
    CheckoutCompleted,
    #[serde(rename = "checkout.session.expired")]
    CheckoutExpired,
    #[serde(rename = "checkout.session.failed")]
    CheckoutFailed,
}

/// Payment provider callback body (`POST /webhooks/payments`).
///
/// Delivery is at-least-once; the same event may arrive several times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub event_type: PaymentEventType,
    pub session_id: String,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl Signature for PaymentEvent {}

/// Acknowledgement returned to the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventOutcome {
    Completed,
    AlreadyCompleted,
    Failed,
    AlreadyFinal,
}
