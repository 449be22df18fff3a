//! Portier auth service binary.
//!
//! Serves the login, refresh and validation routes and owns the rendezvous
//! sweeper. A panicking sweeper takes the process down.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use portier_core::directory::{MemoryUserDirectory, PgUserDirectory, UserDirectory};
use portier_core::identity::OAuthExchange;
use portier_core::rendezvous::{MemoryRendezvousStore, RendezvousStore, Sweeper};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// CLI arguments for the auth service.
#[derive(Parser, Debug)]
#[command(name = "portier_api_server", about = "Portier auth service")]
struct Args {
    /// Address to listen on; overrides `BIND_ADDR`.
    #[arg(long)]
    bind: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5)]
    max_connections: u32,

    /// Keep users in memory instead of PostgreSQL. Nothing survives a restart.
    #[arg(long, default_value_t = false)]
    memory_directory: bool,

    /// Timeout of the identity provider HTTP client, in seconds.
    #[arg(long, default_value_t = 10)]
    provider_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,portier_api=debug,portier_core=debug".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = portier_api::config::ApiConfig::from_env();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    info!(bind_addr = %config.bind_addr, "starting portier_api_server");

    let directory: Arc<dyn UserDirectory> = if args.memory_directory {
        warn!("using in-memory user directory");
        Arc::new(MemoryUserDirectory::new())
    } else {
        info!(max_connections = args.max_connections, "configuring connection pool");
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.pg_connection_url)
            .await?;

        info!("running database migrations");
        portier_core::migrate::migrate(&pool).await?;
        Arc::new(PgUserDirectory::new(pool))
    };

    let mut exchange = OAuthExchange::new(Duration::from_secs(args.provider_timeout_secs))?;
    for (provider, credentials) in config.providers() {
        info!(%provider, "identity provider configured");
        exchange = exchange.with_provider(provider, credentials.provider_config(provider));
    }

    let store: Arc<dyn RendezvousStore> = Arc::new(MemoryRendezvousStore::new());
    let sweeper = Sweeper::spawn(store.clone(), config.sweep_interval);
    let sweeper_ct = sweeper.cancellation_token();

    let bind_addr = config.bind_addr.clone();
    let state = portier_api::AppState::new(config, store, directory, Arc::new(exchange));
    let app = portier_api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("shutdown signal received");
                    shutdown.cancel();
                }
                Err(e) => warn!(error = %e, "cannot listen for shutdown signal"),
            }
        }
    });

    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
    });

    let mut sweeper_done = pin!(sweeper.join());
    tokio::select! {
        joined = &mut sweeper_done => {
            match joined {
                Err(e) if e.is_panic() => error!(error = %e, "rendezvous sweeper panicked"),
                Err(e) => error!(error = %e, "rendezvous sweeper aborted"),
                Ok(()) => error!("rendezvous sweeper stopped unexpectedly"),
            }
            std::process::exit(1);
        }
        served = server => {
            sweeper_ct.cancel();
            if let Err(e) = sweeper_done.await {
                error!(error = %e, "rendezvous sweeper failed during shutdown");
            }
            served??;
        }
    }

    info!("portier_api_server stopped");
    Ok(())
}
