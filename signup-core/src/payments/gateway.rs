//! Payment provider port for opening checkout sessions.

use async_trait::async_trait;
use signup_sdk::objects::payment::{CheckoutSessionRequest, CheckoutSessionResponse};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider rejected the session with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid checkout URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    async fn create_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSessionResponse, GatewayError>;
}

/// Talks to the payment provider's session endpoint over HTTPS.
pub struct HttpCheckoutGateway {
    http_client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpCheckoutGateway {
    pub fn new(endpoint: Url, api_key: Option<String>) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl CheckoutGateway for HttpCheckoutGateway {
    async fn create_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSessionResponse, GatewayError> {
        let mut builder = self.http_client.post(self.endpoint.clone()).json(request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<CheckoutSessionResponse>().await?)
    }
}

/// Mints local session ids without contacting a provider. For development
/// and the in-memory server mode; completion is then driven by posting
/// signed events to the webhook endpoint by hand.
pub struct LocalCheckoutGateway {
    base_url: Url,
}

impl LocalCheckoutGateway {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }
}

#[async_trait]
impl CheckoutGateway for LocalCheckoutGateway {
    async fn create_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSessionResponse, GatewayError> {
        let session_id = format!("cs_local_{}", Uuid::now_v7().simple());
        let url = self.base_url.join(&format!("checkout/{session_id}"))?;
        debug!(
            purchase_id = %request.client_reference_id,
            %session_id,
            "Opened local checkout session"
        );
        Ok(CheckoutSessionResponse { session_id, url })
    }
}
