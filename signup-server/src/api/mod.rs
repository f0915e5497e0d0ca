//! HTTP API.
//!
//! # Endpoints
//!
//! - `POST /events/{event_id}/roles/{role_id}/signup`        – account holder signs up
//! - `POST /events/{event_id}/roles/{role_id}/guest-signup`  – guest self-registration
//! - `POST /events/{event_id}/roles/{role_id}/public-signup` – public registration
//! - `POST /events/{event_id}/roles/{role_id}/invitations`   – invite a guest (admin)
//! - `GET  /events/{event_id}/roles/{role_id}/availability`  – occupancy view
//! - `POST /invitations/{token}/accept`                      – accept an invitation
//! - `POST /registrations/{registration_id}/cancel`          – cancel a registration
//! - `POST /purchases`                                       – start a program purchase
//! - `POST /webhooks/payments`                               – payment provider callback
//! - `GET  /admin/locks/stats`, `POST /admin/locks/clear`    – lock administration

pub mod admin;
pub mod extractors;
pub mod purchases;
pub mod registrations;
pub mod webhooks;


use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use signup_core::framework::ErrorClass;
use signup_core::payments::PaymentError;
use signup_core::registration::RegistrationError;
use signup_sdk::objects::ErrorResponse;

/// Errors returned by API handlers.
#[derive(Debug)]
pub(crate) enum ApiError {
    Registration(RegistrationError),
    Payment(PaymentError),
    /// The request body is well-formed JSON but not acceptable.
    Validation(&'static str),
}

impl From<RegistrationError> for ApiError {
    fn from(err: RegistrationError) -> Self {
        ApiError::Registration(err)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::Payment(err)
    }
}

fn status_for(class: ErrorClass) -> StatusCode {
    match class {
        ErrorClass::Rejected => StatusCode::CONFLICT,
        ErrorClass::NotFound => StatusCode::NOT_FOUND,
        ErrorClass::Retryable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn registration_code(err: &RegistrationError) -> &'static str {
    match err {
        RegistrationError::LockTimeout(_) => "lock_timeout",
        RegistrationError::CapacityExceeded { .. } => "capacity_exceeded",
        RegistrationError::DuplicateRegistration { .. } => "duplicate_registration",
        RegistrationError::RoleNotFound(_) => "role_not_found",
        RegistrationError::RoleNotOpenToPublic(_) => "role_not_open_to_public",
        RegistrationError::InvitationNotFound => "invitation_not_found",
        RegistrationError::InvitationNotPending(_) => "invitation_not_pending",
        RegistrationError::RegistrationNotFound(_) => "registration_not_found",
        RegistrationError::OperationFailure(_) => "operation_failed",
    }
}

fn payment_code(err: &PaymentError) -> &'static str {
    match err {
        PaymentError::LockTimeout(_) => "lock_timeout",
        PaymentError::ProgramNotFound(_) => "program_not_found",
        PaymentError::CapacityExceeded { .. } => "capacity_exceeded",
        PaymentError::PurchaseNotFound(_) => "purchase_not_found",
        PaymentError::Gateway(_) => "payment_provider_unavailable",
        PaymentError::OperationFailure(_) => "operation_failed",
    }
}

/// Client-facing message. Internal failures stay opaque; their details go
/// to the log only.
fn public_message(class: ErrorClass, detail: String) -> String {
    match class {
        ErrorClass::Internal => "internal server error".to_owned(),
        ErrorClass::Retryable => "temporarily unavailable, try again".to_owned(),
        ErrorClass::Rejected | ErrorClass::NotFound => detail,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (class, code, detail) = match &self {
            ApiError::Registration(e) => (e.class(), registration_code(e), e.to_string()),
            ApiError::Payment(e) => (e.class(), payment_code(e), e.to_string()),
            ApiError::Validation(message) => {
                let body = ErrorResponse::new("invalid_request", *message);
                return (StatusCode::BAD_REQUEST, Json(body)).into_response();
            }
        };

        match class {
            ErrorClass::Internal => tracing::error!(error = %detail, code, "API request failed"),
            ErrorClass::Retryable => tracing::warn!(error = %detail, code, "API request failed"),
            ErrorClass::Rejected | ErrorClass::NotFound => {
                tracing::debug!(error = %detail, code, "API request rejected")
            }
        }

        let body = ErrorResponse::new(code, public_message(class, detail));
        (status_for(class), Json(body)).into_response()
    }
}
