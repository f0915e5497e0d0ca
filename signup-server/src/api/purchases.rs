//! Program purchase handlers.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use kanau::processor::Processor;
use signup_core::payments::InitiatePurchase;
use signup_sdk::objects::payment::CreatePurchaseRequest;

use super::ApiError;
use crate::state::AppState;

/// Build the purchase router.
pub fn router() -> Router<AppState> {
    Router::new().route("/purchases", post(create_purchase))
}

/// `POST /purchases`: record a pending purchase, then open a checkout
/// session for it.
///
/// The response carries the checkout URL the buyer should be sent to.
async fn create_purchase(
    State(state): State<AppState>,
    Json(payload): Json<CreatePurchaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let initiated = state
        .payments
        .process(InitiatePurchase {
            user_id: payload.user_id,
            program_id: payload.program_id,
            class_rep: payload.request_class_rep,
        })
        .await?;
    let response = initiated
        .purchase
        .to_response(Some(initiated.checkout_url));
    Ok((StatusCode::CREATED, Json(response)))
}
