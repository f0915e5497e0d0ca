//! Custom Axum extractors for request authentication.
//!
//! Provides:
//! - `SignedBody<T>`: verifies the `Signup-Signature` header against a signed
//!   JSON body (used by the payment provider webhook).
//! - `AdminAuth`: checks the `Signup-Admin-Authorization` header against the
//!   hashed admin secret.
//!
//! All cryptographic operations are delegated to [`signup_sdk::signature`]
//! and [`signup_sdk::config::AdminConfig`].

use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use signup_sdk::signature::{
    ADMIN_AUTH_HEADER, SIGNATURE_HEADER, Signature, SignatureError, SignedObject,
};

use crate::state::AppState;

/// Upper bound on webhook bodies.
const MAX_BODY_BYTES: usize = 1024 * 1024;

// ---------------------------------------------------------------------------
// SignedBody: webhook authentication via signed JSON body
// ---------------------------------------------------------------------------

/// An Axum extractor that verifies the `Signup-Signature` header and
/// deserializes + authenticates the JSON request body.
///
/// # Header format
///
/// ```text
/// Signup-Signature: {unix_timestamp}.{base64_signature}
/// ```
///
/// The signature is computed as `HMAC-SHA256("{timestamp}.{json_body}", webhook_secret)`.
pub struct SignedBody<T: Signature>(pub T);

/// Errors that can occur during signed-body verification.
#[derive(Debug, thiserror::Error)]
pub enum SignedBodyError {
    #[error("missing Signup-Signature header")]
    MissingHeader,
    #[error("invalid Signup-Signature header format")]
    InvalidHeader,
    #[error("invalid signature encoding")]
    InvalidBase64,
    #[error("failed to read request body")]
    BodyReadError,
    #[error("invalid JSON body: {0}")]
    JsonError(serde_json::Error),
    #[error("signature verification failed")]
    VerificationFailed,
}

impl From<SignatureError> for SignedBodyError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::InvalidFormat => Self::InvalidHeader,
            SignatureError::InvalidBase64 => Self::InvalidBase64,
            SignatureError::Json(e) => Self::JsonError(e),
            SignatureError::SignatureMismatch | SignatureError::Expired => Self::VerificationFailed,
        }
    }
}

impl IntoResponse for SignedBodyError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            SignedBodyError::MissingHeader => {
                (StatusCode::UNAUTHORIZED, "missing Signup-Signature header")
            }
            SignedBodyError::InvalidHeader => (
                StatusCode::BAD_REQUEST,
                "invalid Signup-Signature header format",
            ),
            SignedBodyError::InvalidBase64 => {
                (StatusCode::BAD_REQUEST, "invalid signature encoding")
            }
            SignedBodyError::BodyReadError => {
                (StatusCode::BAD_REQUEST, "failed to read request body")
            }
            SignedBodyError::JsonError(_) => (StatusCode::BAD_REQUEST, "invalid JSON body"),
            SignedBodyError::VerificationFailed => {
                (StatusCode::UNAUTHORIZED, "signature verification failed")
            }
        };
        (status, message).into_response()
    }
}

impl<T: Signature + Send> FromRequest<AppState> for SignedBody<T> {
    type Rejection = SignedBodyError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let header_value = req
            .headers()
            .get(SIGNATURE_HEADER)
            .ok_or(SignedBodyError::MissingHeader)?
            .to_str()
            .map_err(|_| SignedBodyError::InvalidHeader)?
            .to_owned();

        let body_bytes = axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|_| SignedBodyError::BodyReadError)?;

        let json =
            String::from_utf8(body_bytes.to_vec()).map_err(|_| SignedBodyError::BodyReadError)?;

        let signed = SignedObject::<T>::from_header_and_body(&header_value, json)?;

        let payments = state.config.payments.read().await;
        let verified_body = signed.verify(payments.secret_bytes())?;
        drop(payments);

        Ok(SignedBody(verified_body))
    }
}

// ---------------------------------------------------------------------------
// AdminAuth: admin API authentication via shared secret
// ---------------------------------------------------------------------------

/// An Axum extractor that admits the request only when the
/// `Signup-Admin-Authorization` header carries the plaintext admin secret.
pub struct AdminAuth;

/// Errors returned by the [`AdminAuth`] extractor.
#[derive(Debug)]
pub enum AdminAuthError {
    MissingHeader,
    InvalidHeader,
    InvalidSecret,
}

impl IntoResponse for AdminAuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AdminAuthError::MissingHeader => (
                StatusCode::UNAUTHORIZED,
                "missing Signup-Admin-Authorization header",
            ),
            AdminAuthError::InvalidHeader => (
                StatusCode::BAD_REQUEST,
                "invalid Signup-Admin-Authorization header",
            ),
            AdminAuthError::InvalidSecret => (StatusCode::UNAUTHORIZED, "invalid admin secret"),
        };
        (status, message).into_response()
    }
}

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AdminAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let secret = parts
            .headers
            .get(ADMIN_AUTH_HEADER)
            .ok_or(AdminAuthError::MissingHeader)?
            .to_str()
            .map_err(|_| AdminAuthError::InvalidHeader)?;

        let admin = state.config.admin.read().await;
        if !admin.verify_secret(secret) {
            drop(admin);
            tracing::warn!("Rejected admin request with invalid secret");
            return Err(AdminAuthError::InvalidSecret);
        }
        drop(admin);

        Ok(AdminAuth)
    }
}
