//! Payment provider callbacks.
//!
//! The provider delivers at least once and may redeliver at any time, so
//! every outcome, including "already handled", is acknowledged with 200.
//! A 404 for an unknown session makes the provider retry later.

use axum::{Json, Router, extract::State, routing::post};
use kanau::processor::Processor;
use signup_core::payments::{
    CompleteCheckout, CompletionOutcome, FailCheckout, FailureOutcome,
};
use signup_sdk::objects::payment::{PaymentEvent, PaymentEventOutcome, PaymentEventType};

use super::ApiError;
use super::extractors::SignedBody;
use crate::state::AppState;

/// Build the webhook router.
pub fn router() -> Router<AppState> {
    Router::new().route("/webhooks/payments", post(payment_event))
}

/// `POST /webhooks/payments`
async fn payment_event(
    State(state): State<AppState>,
    SignedBody(event): SignedBody<PaymentEvent>,
) -> Result<Json<PaymentEventOutcome>, ApiError> {
    tracing::debug!(
        session_id = %event.session_id,
        event_type = ?event.event_type,
        "Payment event received"
    );

    let outcome = match event.event_type {
        PaymentEventType::CheckoutCompleted => {
            let outcome = state
                .payments
                .process(CompleteCheckout {
                    session_id: event.session_id,
                    payment_reference: event.payment_reference,
                    amount: event.amount,
                    currency: event.currency,
                })
                .await?;
            match outcome {
                CompletionOutcome::Completed(_) => PaymentEventOutcome::Completed,
                CompletionOutcome::AlreadyCompleted(_) => PaymentEventOutcome::AlreadyCompleted,
                CompletionOutcome::AlreadyFailed(_) => PaymentEventOutcome::AlreadyFinal,
            }
        }
        PaymentEventType::CheckoutExpired | PaymentEventType::CheckoutFailed => {
            let outcome = state
                .payments
                .process(FailCheckout {
                    session_id: event.session_id,
                })
                .await?;
            match outcome {
                FailureOutcome::Failed(_) => PaymentEventOutcome::Failed,
                FailureOutcome::AlreadyFinal(_) => PaymentEventOutcome::AlreadyFinal,
            }
        }
    };

    Ok(Json(outcome))
}
