use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::users::UserRepository;

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(j) = self.join.take() {
            let _ = j.await;
        }
    }
}

/// Periodically deletes sign-on tokens older than their TTL.
///
/// Failures are logged and retried on the next tick.
#[derive(Debug)]
pub struct SignOnTokenPurgeWorker;

impl SignOnTokenPurgeWorker {
    /// Spawn the worker on the current tokio runtime. The first purge runs
    /// immediately, then once per `every`.
    pub fn spawn(repo: Arc<dyn UserRepository>, every: Duration) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let join = tokio::spawn(worker_loop(repo, every, shutdown_rx));

        WorkerHandle {
            shutdown: Some(shutdown_tx),
            join: Some(join),
        }
    }
}

async fn worker_loop(repo: Arc<dyn UserRepository>, every: Duration, mut shutdown_rx: oneshot::Receiver<()>) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => match repo.delete_expired_sign_on_tokens().await {
                Ok(0) => debug!(worker = "sign_on_token_purge", "no expired sign-on tokens"),
                Ok(n) => info!(worker = "sign_on_token_purge", deleted = n, "purged expired sign-on tokens"),
                Err(err) => warn!(worker = "sign_on_token_purge", error = %err, "sign-on token purge failed"),
            },
        }
    }
}
