//! TOML file configuration structures.
//!
//! These structs directly map to the `signup-config.toml` file format.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use signup_core::config::{DEFAULT_LOCK_TIMEOUT, DEFAULT_NOTIFICATION_ATTEMPTS, Environment};
use std::net::{Ipv4Addr, SocketAddr};
use url::Url;
use uuid::Uuid;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    #[serde(default)]
    pub locks: LocksConfig,
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    /// Fixtures loaded into the in-memory store. Ignored with PostgreSQL.
    #[serde(default, skip_serializing_if = "SeedConfig::is_empty")]
    pub seed: SeedConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
    /// `production` disables administrative lock resets.
    #[serde(default)]
    pub environment: Environment,
    /// Externally reachable base URL, used for local checkout links.
    /// Defaults to `http://{listen}/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<Url>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// Admin configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// The admin secret. If this is plaintext (doesn't start with `$argon2`),
    /// it will be hashed and the config file will be rewritten.
    pub secret: String,
}

/// Lock manager section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocksConfig {
    /// How long a caller may queue for a lock before failing.
    #[serde(default = "default_lock_timeout_ms")]
    pub default_timeout_ms: u64,
}

impl Default for LocksConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT.as_millis() as u64
}

/// Payment provider section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    /// Shared secret the provider signs webhook bodies with.
    pub webhook_secret: String,
    /// Provider endpoint for opening checkout sessions. Sessions are minted
    /// locally when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout_endpoint: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Notification delivery section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Mailer webhook. Notifications are only logged when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<Url>,
    /// Secret for signing mailer webhook bodies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            secret: None,
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_NOTIFICATION_ATTEMPTS
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub event_roles: Vec<SeedEventRole>,
    #[serde(default)]
    pub programs: Vec<SeedProgram>,
}

impl SeedConfig {
    pub fn is_empty(&self) -> bool {
        self.event_roles.is_empty() && self.programs.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedEventRole {
    pub event_id: Uuid,
    pub role_id: Uuid,
    pub name: String,
    pub max_participants: u32,
    #[serde(default)]
    pub open_to_public: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedProgram {
    pub id: Uuid,
    pub title: String,
    pub price: Decimal,
    pub currency: String,
    #[serde(default)]
    pub class_rep_limit: u32,
}

impl FileConfig {
    /// Check if the admin secret is already hashed (argon2 format).
    pub fn is_admin_secret_hashed(&self) -> bool {
        signup_sdk::config::AdminConfig::is_hashed(&self.admin.secret)
    }
}
