//! Periodic eviction of expired rendezvous entries.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::RendezvousStore;

/// Default sweep interval: 5 minutes.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Owned background task that purges expired entries on a fixed interval.
///
/// Ticks never overlap: a slow purge delays the next tick. A panic inside
/// the task surfaces as a panicked [`JoinError`] from [`Sweeper::join`] and
/// must be treated as fatal by the owner.
pub struct Sweeper {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn the sweeper on the current tokio runtime.
    pub fn spawn(store: Arc<dyn RendezvousStore>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(store, interval, cancel.clone()));
        info!(interval_secs = interval.as_secs(), "rendezvous sweeper started");
        Self { cancel, handle }
    }

    /// Token that stops the sweeper when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request the sweeper to stop after its current tick.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the task to finish.
    pub async fn join(self) -> Result<(), JoinError> {
        self.handle.await
    }

    /// Stop the sweeper and wait for it to finish.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        self.stop();
        self.join().await
    }
}

async fn run(store: Arc<dyn RendezvousStore>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => sweep_once(store.as_ref()).await,
        }
    }
    info!("rendezvous sweeper stopped");
}

/// Run a single purge pass.
pub async fn sweep_once(store: &dyn RendezvousStore) {
    match store.purge_expired(Utc::now()).await {
        Ok(stats) if stats.total() > 0 => {
            debug!(
                login_states = stats.login_states,
                auth_codes = stats.auth_codes,
                "purged expired rendezvous entries"
            );
        }
        Ok(_) => {}
        Err(e) => warn!("rendezvous sweep failed: {e}"),
    }
}
