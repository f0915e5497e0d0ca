//! Admin API handlers.
//!
//! These endpoints require the `Signup-Admin-Authorization` header with the
//! plaintext admin secret.
//!
//! # Endpoints
//!
//! - `GET  /locks/stats` – lock manager counters
//! - `POST /locks/clear` – drop every lock entry (refused in production)

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use signup_sdk::objects::ErrorResponse;
use signup_sdk::objects::admin::{ClearLocksResponse, LockStatsResponse};

use crate::api::extractors::AdminAuth;
use crate::state::AppState;

/// Build the Admin API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/locks/stats", get(lock_stats))
        .route("/locks/clear", post(clear_locks))
}

/// `GET /locks/stats`
async fn lock_stats(State(state): State<AppState>, _auth: AdminAuth) -> Json<LockStatsResponse> {
    let stats = state.locks.stats();
    Json(LockStatsResponse {
        active_locks: stats.active_locks,
        total_locks_acquired: stats.total_locks_acquired,
        total_timeouts: stats.total_timeouts,
        average_wait_time_ms: stats.average_wait_time_ms,
    })
}

/// `POST /locks/clear`: emergency reset. Callers already inside a critical
/// section finish normally.
async fn clear_locks(State(state): State<AppState>, _auth: AdminAuth) -> Response {
    match state.locks.clear_all_locks() {
        Ok(cleared) => {
            tracing::info!(cleared, "Lock table cleared by admin request");
            Json(ClearLocksResponse { cleared }).into_response()
        }
        Err(forbidden) => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new("forbidden", forbidden.to_string())),
        )
            .into_response(),
    }
}
