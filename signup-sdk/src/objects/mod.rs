//! Request, response and webhook payload types.
//!
//! These are the API/DTO versions of the domain types. Storage-facing
//! versions with `sqlx::Type` live in `signup-core::entities`.

pub mod admin;
pub mod notification;
pub mod payment;
pub mod registration;

use serde::{Deserialize, Serialize};

/// Body returned with every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable error code (e.g. `capacity_exceeded`).
    pub error: String,
    /// Human-readable message safe to show to the end user.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
