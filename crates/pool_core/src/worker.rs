//! Matching cycle coordinator: a cancellable interval-driven task.
//!
//! The worker owns no state of its own; everything a cycle touches goes
//! through the engine's store interfaces. Cycle errors are logged and the
//! loop continues. Shutdown stops new cycles and waits for an in-flight
//! cycle to finish; the lock TTL keeps a crashed holder from blocking
//! other instances for more than one TTL period.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::engine::PoolEngine;

pub struct MatchingWorker;

impl MatchingWorker {
    /// Spawn the coordinator loop, one cycle per interval tick.
    pub fn spawn(engine: Arc<PoolEngine>, interval: Duration) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "matching worker started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = engine.run_matching_cycle().await {
                            warn!(%err, "matching cycle failed");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("matching worker stopped");
        });
        WorkerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to a running coordinator.
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Stop accepting new cycles and wait for an in-flight one to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }

    /// Whether the loop is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}
