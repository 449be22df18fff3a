//! Portier client tier binary.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use portier_web::config::WebConfig;
use portier_web::downstream::HttpDownstream;
use portier_web::gateway::HttpAuthGateway;
use portier_web::session::MemorySessionCache;
use portier_web::{WebState, router};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// CLI arguments for the client tier.
#[derive(Parser, Debug)]
#[command(name = "portier_web_server", about = "Portier client tier")]
struct Args {
    /// Address to listen on; overrides `BIND_ADDR`.
    #[arg(long)]
    bind: Option<String>,

    /// Seconds between purges of expired sessions.
    #[arg(long, env = "SESSION_CLEANUP_SECS", default_value_t = 60)]
    cleanup_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,portier_web=debug".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = WebConfig::from_env();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    info!(
        bind_addr = %config.bind_addr,
        auth_url = %config.auth_url,
        main_url = %config.main_url,
        dev_mode = config.dev_mode,
        "starting portier_web_server"
    );

    let cache = Arc::new(MemorySessionCache::new());
    let gateway = HttpAuthGateway::new(&config.auth_url, config.upstream_timeout)?;
    let downstream = HttpDownstream::new(&config.main_url, config.upstream_timeout)?;

    let shutdown = CancellationToken::new();
    tokio::spawn(purge_sessions(
        cache.clone(),
        Duration::from_secs(args.cleanup_secs.max(1)),
        shutdown.clone(),
    ));
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

    let bind_addr = config.bind_addr.clone();
    let state = WebState {
        config,
        cache,
        gateway: Arc::new(gateway),
        downstream: Arc::new(downstream),
    };

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %listener.local_addr()?, "client tier listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.cancelled().await }
        })
        .await?;

    shutdown.cancel();
    info!("portier_web_server stopped");
    Ok(())
}

async fn purge_sessions(cache: Arc<MemorySessionCache>, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                cache.cleanup();
                debug!("expired sessions purged");
            }
        }
    }
}
