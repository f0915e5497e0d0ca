//! Validated runtime configuration.
//!
//! Sections that can change on SIGHUP live in [`SharedConfig`] behind
//! their own lock. Lock and notification settings are read once at
//! startup.

use signup_core::config::Environment;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

pub use signup_sdk::config::AdminConfig;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub environment: Environment,
    pub public_url: Url,
}

#[derive(Debug, Clone)]
pub struct PaymentsConfig {
    webhook_secret: Box<[u8]>,
    pub checkout_endpoint: Option<Url>,
    pub api_key: Option<String>,
}

impl PaymentsConfig {
    pub fn new(webhook_secret: Box<[u8]>, checkout_endpoint: Option<Url>, api_key: Option<String>) -> Self {
        Self {
            webhook_secret,
            checkout_endpoint,
            api_key,
        }
    }

    /// Key for verifying payment provider webhook signatures.
    pub fn secret_bytes(&self) -> &[u8] {
        &self.webhook_secret
    }
}

/// Mailer endpoint for confirmation messages.
#[derive(Debug, Clone)]
pub struct MailerWebhook {
    pub url: Url,
    pub secret: Box<[u8]>,
}

#[derive(Debug, Clone)]
pub struct NotificationSettings {
    pub webhook: Option<MailerWebhook>,
    pub max_attempts: u32,
}

/// Reloadable configuration sections, each behind its own lock.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    pub server: Arc<RwLock<ServerConfig>>,
    pub admin: Arc<RwLock<AdminConfig>>,
    pub payments: Arc<RwLock<PaymentsConfig>>,
}
