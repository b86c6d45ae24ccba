//! Periodic dispatch of pending mints to per-txid handlers.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::{sync::broadcast, time::MissedTickBehavior};

use super::client::{MonitorClient, MonitorClientError};
use super::executor::MintExecutor;
use super::state::WorkerState;

pub struct MintScheduler {
    state: Arc<WorkerState>,
    client: MonitorClient,
    executor: Arc<MintExecutor>,
    interval: Duration,
    inter_dispatch: Duration,
}

impl MintScheduler {
    pub fn new(
        state: Arc<WorkerState>,
        client: MonitorClient,
        executor: Arc<MintExecutor>,
        interval: Duration,
        inter_dispatch: Duration,
    ) -> Self {
        Self {
            state,
            client,
            executor,
            interval,
            inter_dispatch,
        }
    }

    /// Runs ticks until shutdown. A tick that is due while the previous one
    /// is still dispatching is dropped, not queued.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = shutdown_rx.recv() => {
                    info!("Scheduler received shutdown signal. Exiting gracefully.");
                    break;
                }
            }
        }
    }

    /// One tick: fetch the queue, hand each txid to a handler. Dispatches are
    /// spaced by `inter_dispatch` so the wallet tool is not hammered; a txid
    /// whose handler from an earlier tick is still running is left alone.
    pub async fn tick(&self) {
        let pending = match self.client.pending_mints().await {
            Ok(pending) => pending,
            Err(e @ MonitorClientError::ConnectionRefused(_)) => {
                error!(error:% = e; "Monitor is not reachable; is the monitor daemon running?");
                return;
            },
            Err(e) => {
                warn!(error:% = e; "Failed to fetch pending mints; will retry next tick");
                return;
            },
        };

        if pending.is_empty() {
            return;
        }
        debug!(count = pending.len() as u64; "Dispatching pending mints");

        for mint in pending {
            if self.state.is_in_flight(&mint.txid) {
                debug!(txid = &*mint.txid; "Handler still in flight, skipping");
                continue;
            }
            let executor = self.executor.clone();
            tokio::spawn(async move {
                executor.process(&mint).await;
            });
            tokio::time::sleep(self.inter_dispatch).await;
        }
    }
}
