use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tracing::{error, info};

use crate::auth::Denylist;

/// Background job that drops expired entries from the token denylist.
///
/// Revoked tokens stop mattering once their own expiry passes, so the
/// denylist only has to hold them that long.
#[derive(Clone)]
pub struct PurgeScheduler {
    denylist: Arc<dyn Denylist>,

    /// Polling interval in seconds
    poll_interval_seconds: u64,

    running: Arc<RwLock<bool>>,
    wake: Arc<Notify>,
}

impl PurgeScheduler {
    pub fn new(denylist: Arc<dyn Denylist>, poll_interval_seconds: Option<u64>) -> Self {
        Self {
            denylist,
            poll_interval_seconds: poll_interval_seconds.unwrap_or(300).max(1),
            running: Arc::new(RwLock::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Runs the purge loop until `stop` is called.
    ///
    /// A failed purge is logged and retried on the next tick.
    pub async fn start(&self) -> Result<(), anyhow::Error> {
        *self.running.write().await = true;
        info!(
            "PurgeScheduler started with poll interval: {} seconds",
            self.poll_interval_seconds
        );

        while *self.running.read().await {
            match self.purge_once().await {
                Ok(count) => {
                    if count > 0 {
                        info!("Purged {} expired revoked token(s)", count);
                    }
                }
                Err(e) => {
                    error!("Error in purge loop: {}", e);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(self.poll_interval_seconds)) => {}
                _ = self.wake.notified() => {}
            }
        }

        info!("PurgeScheduler stopped");
        Ok(())
    }

    /// Stops the loop; a sleeping loop wakes up immediately.
    pub async fn stop(&self) {
        info!("Stopping PurgeScheduler...");
        *self.running.write().await = false;
        self.wake.notify_one();
    }

    pub async fn purge_once(&self) -> Result<u64, anyhow::Error> {
        self.denylist.purge_expired(Utc::now()).await
    }
}
