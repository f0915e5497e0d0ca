//! Configuration module for signup-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables. Also handles admin secret hashing.

pub mod file;
pub mod runtime;

use crate::config::file::{FileConfig, SeedConfig};
use crate::config::runtime::{
    AdminConfig, MailerWebhook, NotificationSettings, PaymentsConfig, ServerConfig, SharedConfig,
};
use signup_core::config::LockConfig;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("password hashing error: {0}")]
    HashError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub locks: LockConfig,
    pub payments: PaymentsConfig,
    pub notifications: NotificationSettings,
    pub seed: SeedConfig,
}

impl LoadedConfig {
    /// Convert the reloadable sections into a SharedConfig.
    pub fn into_shared(self) -> SharedConfig {
        SharedConfig {
            server: Arc::new(RwLock::new(self.server)),
            admin: Arc::new(RwLock::new(self.admin)),
            payments: Arc::new(RwLock::new(self.payments)),
        }
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Hash the admin secret if it's plaintext (and rewrite the file)
    /// 5. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;

        let secret_hash = if file_config.is_admin_secret_hashed() {
            file_config.admin.secret.clone()
        } else {
            let hash = AdminConfig::hash_plaintext(&file_config.admin.secret)
                .map_err(|e| ConfigError::HashError(e.to_string()))?;
            file_config.admin.secret = hash.clone();
            // The CLI override must not leak into the file.
            let mut persisted = file_config.clone();
            if self.listen_override.is_some() {
                let original: FileConfig = toml::from_str(&config_content)?;
                persisted.server.listen = original.server.listen;
            }
            self.rewrite_config(&persisted)?;
            tracing::info!("Admin secret hashed and config file updated");
            hash
        };

        build_loaded_config(file_config, secret_hash)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn rewrite_config(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(config)?;

        // Write atomically: write to temp file, then rename
        let temp_path = self.config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, toml_string)?;
        std::fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.admin.secret.is_empty() {
        return Err(ConfigError::ValidationError("admin secret is empty".into()));
    }
    if config.payments.webhook_secret.is_empty() {
        return Err(ConfigError::ValidationError(
            "payments webhook_secret is empty".into(),
        ));
    }
    if config.locks.default_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "locks default_timeout_ms must be positive".into(),
        ));
    }
    if config.notifications.webhook_url.is_some() && config.notifications.secret.is_none() {
        return Err(ConfigError::ValidationError(
            "notifications webhook_url requires a secret".into(),
        ));
    }
    Ok(())
}

fn build_loaded_config(
    file_config: FileConfig,
    secret_hash: String,
) -> Result<LoadedConfig, ConfigError> {
    let server = file_config.server;
    let public_url = match server.public_url {
        Some(url) => url,
        None => Url::parse(&format!("http://{}/", server.listen))
            .map_err(|e| ConfigError::ValidationError(format!("public_url: {e}")))?,
    };

    let notifications = file_config.notifications;
    let webhook = match (notifications.webhook_url, notifications.secret) {
        (Some(url), Some(secret)) => Some(MailerWebhook {
            url,
            secret: secret.into_bytes().into_boxed_slice(),
        }),
        _ => None,
    };

    Ok(LoadedConfig {
        server: ServerConfig {
            listen: server.listen,
            environment: server.environment,
            public_url,
        },
        admin: AdminConfig::new(secret_hash),
        locks: LockConfig {
            default_timeout: Duration::from_millis(file_config.locks.default_timeout_ms),
            environment: server.environment,
        },
        payments: PaymentsConfig::new(
            file_config.payments.webhook_secret.into_bytes().into_boxed_slice(),
            file_config.payments.checkout_endpoint,
            file_config.payments.api_key,
        ),
        notifications: NotificationSettings {
            webhook,
            max_attempts: notifications.max_attempts,
        },
        seed: file_config.seed,
    })
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use signup_core::config::Environment;

    const CONFIG: &str = r#"
[server]
listen = "127.0.0.1:3100"
environment = "test"

[admin]
secret = "plain-admin-secret"

[locks]
default_timeout_ms = 250

[payments]
webhook_secret = "whsec_test"
"#;

    fn write_config(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("signup-config-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_hashes_secret_and_rewrites_file() {
        let path = write_config("signup-config.toml", CONFIG);
        let loader = ConfigLoader::new(&path, None);

        let loaded = loader.load().unwrap();
        assert!(loaded.admin.verify_secret("plain-admin-secret"));
        assert_eq!(loaded.locks.default_timeout, Duration::from_millis(250));
        assert_eq!(loaded.locks.environment, Environment::Test);
        assert_eq!(loaded.server.public_url.as_str(), "http://127.0.0.1:3100/");
        assert!(loaded.notifications.webhook.is_none());

        let rewritten: FileConfig =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(rewritten.is_admin_secret_hashed());

        // A second load keeps the stored hash.
        let reloaded = loader.reload().unwrap();
        assert_eq!(reloaded.admin.secret_hash, loaded.admin.secret_hash);
    }

    #[test]
    fn test_listen_override_is_not_persisted() {
        let path = write_config("signup-config.toml", CONFIG);
        let listen: SocketAddr = "0.0.0.0:9999".parse().unwrap();
        let loaded = ConfigLoader::new(&path, Some(listen)).load().unwrap();
        assert_eq!(loaded.server.listen, listen);

        let rewritten: FileConfig =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(rewritten.server.listen.port(), 3100);
    }

    #[test]
    fn test_mailer_without_secret_is_rejected() {
        let content = format!(
            "{CONFIG}\n[notifications]\nwebhook_url = \"https://mailer.example.com/hook\"\n"
        );
        let path = write_config("signup-config.toml", &content);
        let err = ConfigLoader::new(&path, None).load().err().unwrap();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
