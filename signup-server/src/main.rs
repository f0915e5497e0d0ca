//! Sign-up Server
//!
//! Capacity-guarded event role sign-ups and program purchases with
//! idempotent payment completion.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::file::SeedConfig;
use config::runtime::NotificationSettings;
use config::{ConfigLoader, get_database_url};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use signup_core::entities::event_roles::EventRole;
use signup_core::entities::programs::Program;
use signup_core::events::notification_channel;
use signup_core::framework::DatabaseProcessor;
use signup_core::payments::{CheckoutGateway, HttpCheckoutGateway, LocalCheckoutGateway};
use signup_core::processors::{LoggingSink, NotificationDispatcher, NotificationSink, WebhookSink};
use signup_core::store::InMemoryStore;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Sign-up server - capacity-guarded registrations and program checkout
#[derive(Parser, Debug)]
#[command(name = "signup-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./signup-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Keep all data in memory, seeded from the `[seed]` config section.
    /// DATABASE_URL is not read.
    #[arg(long, default_value = "false", env = "SIGNUP_IN_MEMORY")]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting signup-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = loaded_config.server.listen;
    let lock_config = loaded_config.locks;
    tracing::info!(
        path = ?args.config,
        environment = %lock_config.environment,
        lock_timeout_ms = lock_config.default_timeout.as_millis() as u64,
        "Configuration loaded"
    );

    let gateway = build_gateway(&loaded_config);
    let sink = build_sink(&loaded_config.notifications);
    let max_attempts = loaded_config.notifications.max_attempts;
    let seed = loaded_config.seed.clone();

    // Convert to shared config with separate locks for each section
    let shared_config = loaded_config.into_shared();

    // Notification pipeline
    let (notification_tx, notification_rx) = notification_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher = NotificationDispatcher::new(sink, notification_rx, shutdown_rx, max_attempts);
    let dispatcher_handle = tokio::spawn(dispatcher.run());

    // Storage backend
    let (state, db_pool) = if args.in_memory {
        tracing::warn!("Running with the in-memory store; data is lost on exit");
        let store = Arc::new(seeded_store(&seed));
        let state = AppState::new(shared_config, lock_config, store, gateway, notification_tx);
        (state, None)
    } else {
        let database_url = get_database_url().map_err(|e| {
            tracing::error!("DATABASE_URL environment variable not set");
            e
        })?;

        tracing::info!("Connecting to database...");
        let db_pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&database_url)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to database: {}", e);
                e
            })?;
        tracing::info!("Database connection established");

        if args.migrate {
            tracing::info!("Running database migrations...");
            sqlx::migrate!("../migrations")
                .run(&db_pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to run migrations: {}", e);
                    e
                })?;
            tracing::info!("Migrations completed successfully");
        }

        let store = Arc::new(DatabaseProcessor::new(db_pool.clone()));
        let state = AppState::new(shared_config, lock_config, store, gateway, notification_tx);
        (state, Some(db_pool))
    };

    // Spawn config reload handler (listens for SIGHUP)
    let reload_shutdown = spawn_config_reload_handler(state.clone(), config_loader);

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Signal background tasks to stop
    reload_shutdown.notify_one();
    let _ = shutdown_tx.send(true);
    if let Err(e) = dispatcher_handle.await {
        tracing::error!(error = %e, "Notification dispatcher panicked");
    }

    // Close database connections gracefully
    if let Some(db_pool) = db_pool {
        tracing::info!("Closing database connections...");
        db_pool.close().await;
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Use the configured provider endpoint, or mint sessions locally against
/// the public URL.
fn build_gateway(loaded: &config::LoadedConfig) -> Arc<dyn CheckoutGateway> {
    match &loaded.payments.checkout_endpoint {
        Some(endpoint) => {
            tracing::info!(%endpoint, "Using HTTP checkout gateway");
            Arc::new(HttpCheckoutGateway::new(
                endpoint.clone(),
                loaded.payments.api_key.clone(),
            ))
        }
        None => {
            tracing::warn!(
                public_url = %loaded.server.public_url,
                "No checkout endpoint configured, minting local checkout sessions"
            );
            Arc::new(LocalCheckoutGateway::new(loaded.server.public_url.clone()))
        }
    }
}

fn build_sink(settings: &NotificationSettings) -> Arc<dyn NotificationSink> {
    match &settings.webhook {
        Some(webhook) => Arc::new(WebhookSink::new(webhook.url.clone(), &webhook.secret)),
        None => {
            tracing::info!("No mailer webhook configured, notifications are only logged");
            Arc::new(LoggingSink)
        }
    }
}

fn seeded_store(seed: &SeedConfig) -> InMemoryStore {
    let store = InMemoryStore::new();
    for role in &seed.event_roles {
        store.add_event_role(EventRole {
            event_id: role.event_id,
            role_id: role.role_id,
            name: role.name.clone(),
            max_participants: role.max_participants,
            open_to_public: role.open_to_public,
        });
    }
    for program in &seed.programs {
        store.add_program(Program {
            id: program.id,
            title: program.title.clone(),
            price: program.price,
            currency: program.currency.clone(),
            class_rep_limit: program.class_rep_limit,
        });
    }
    tracing::info!(
        event_roles = seed.event_roles.len(),
        programs = seed.programs.len(),
        "In-memory store seeded"
    );
    store
}
