//! Duelbot Server
//!
//! Receives chat from a relay, runs wagered rock-paper-scissors duels, and
//! sends announcements and whispers back through the relay.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use duelbot_core::commands::CommandRouter;
use duelbot_core::events::EventRegistry;
use duelbot_core::framework::DatabaseProcessor;
use duelbot_core::gateways::{MemoryLedger, PgLedger, RelayChatGateway, SettlementGateway};
use duelbot_core::processors::{DuelEngine, DuelReaper};
use duelbot_core::config::ConfigStore;
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Duelbot - wagered rock-paper-scissors for Twitch chat
#[derive(Parser, Debug)]
#[command(name = "duelbot-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./duelbot-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Keep points in memory instead of Postgres; every new user starts
    /// with this balance
    #[arg(long, value_name = "STARTING_BALANCE")]
    memory_ledger: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting duelbot-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let listen_addr = loaded_config.listen;
    let duel_config_store = ConfigStore::new(loaded_config.duel);

    // Pick the points ledger
    let (ledger, db_pool) = match args.memory_ledger {
        Some(starting_balance) => {
            tracing::warn!(
                starting_balance,
                "Using in-memory ledger, balances are lost on exit"
            );
            let ledger: Arc<dyn SettlementGateway> = Arc::new(MemoryLedger::new(starting_balance));
            (ledger, None)
        }
        None => {
            let db_pool = connect_database(args.migrate).await?;
            let ledger: Arc<dyn SettlementGateway> =
                Arc::new(PgLedger::new(DatabaseProcessor::new(db_pool.clone())));
            (ledger, Some(db_pool))
        }
    };

    // Outbound chat
    let relay = loaded_config.relay;
    let chat = Arc::new(RelayChatGateway::new(
        relay.outbound_url.clone(),
        relay.secret.clone(),
    ));

    // Duel engine and its background reaper
    let engine = Arc::new(DuelEngine::new(
        EventRegistry::new(),
        ledger,
        chat,
        duel_config_store.clone(),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper_handle = tokio::spawn(
        DuelReaper::new(engine.clone()).run(shutdown_rx, duel_config_store.subscribe()),
    );

    // Create application state
    let state = AppState::new(CommandRouter::with_duel_commands(engine), relay.secret);

    // Spawn config reload handler (listens for SIGHUP)
    let reload_notify = spawn_config_reload_handler(config_loader, duel_config_store);

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Stop background tasks
    reload_notify.notify_one();
    let _ = shutdown_tx.send(true);
    if let Err(e) = reaper_handle.await {
        tracing::error!("DuelReaper task failed: {}", e);
    }

    // Close database connections gracefully
    if let Some(db_pool) = db_pool {
        tracing::info!("Closing database connections...");
        db_pool.close().await;
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Connect to Postgres using `DATABASE_URL`, optionally running migrations.
async fn connect_database(migrate: bool) -> anyhow::Result<PgPool> {
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

    if migrate {
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

    Ok(db_pool)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
