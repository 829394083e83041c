//! Fixed-interval driver for the orchestrator.
//!
//! One cycle runs to completion before the next wait begins, so cycles never
//! overlap. Shutdown is honoured before a cycle starts and while waiting for
//! the next tick; a cycle already in flight is allowed to finish.

use crate::orchestrator::{CycleOutcome, Orchestrator};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub struct PollLoop {
    orchestrator: Orchestrator,
    interval: Duration,
}

impl PollLoop {
    pub fn new(orchestrator: Orchestrator, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval,
        }
    }

    /// Runs cycles until `shutdown` flips to `true` (or its sender is
    /// dropped). Returns the number of cycles run.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut cycles = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }

            cycles += 1;
            match self.orchestrator.run_cycle().await {
                Ok(CycleOutcome::Initialized { progress }) | Ok(CycleOutcome::Unsealed { progress }) => {
                    info!(
                        "Vault unsealed with {}/{} keys",
                        progress.threshold, progress.total_shares
                    );
                }
                Ok(outcome) => debug!("Cycle {} finished: {:?}", cycles, outcome),
                Err(e) if e.is_alerting() => {
                    error!("Cycle {} failed, manual intervention required: {}", cycles, e)
                }
                Err(e) => warn!("Cycle {} failed, retrying next tick: {}", cycles, e),
            }

            info!("Next check in {:?}", self.interval);
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("Shutting down after {} cycles", cycles);
        cycles
    }
}

/// Resolves once SIGINT or SIGTERM is received.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
