//! Runtime configuration types used by the core.
//!
//! Loading and parsing is handled by the server crate; these are the
//! validated values handed to the components.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time a caller may wait in a lock queue before giving up.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default number of delivery attempts for one notification.
pub const DEFAULT_NOTIFICATION_ATTEMPTS: u32 = 6;

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    /// Administrative resets (clearing the lock table) are only allowed
    /// outside production.
    pub fn allows_admin_reset(self) -> bool {
        !matches!(self, Environment::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Lock manager settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConfig {
    /// Applied when a caller does not pass its own timeout.
    pub default_timeout: Duration,
    pub environment: Environment,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_LOCK_TIMEOUT,
            environment: Environment::default(),
        }
    }
}
