//! The monitor daemon: upstream poller, ledger, HTTP API.
//!
//! Orchestrates the monitor's long-running tasks:
//!
//! 1. **Poller loop**: fetches the watched address's transactions every
//!    `poll_interval_ms` and feeds them to the ingestor. Ticks never overlap;
//!    a tick that is due while the previous one still runs is dropped, so an
//!    upstream slowdown cannot amplify into a request pileup.
//! 2. **API server**: serves the minting ledger to the worker and operators.
//! 3. **Retention sweeper** (optional): deletes old settled records.
//!
//! All tasks listen on a shutdown broadcast channel; Ctrl-C drains the API
//! server and stops the loops before the process exits.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail};
use chrono::Utc;
use log::{error, info, warn};
use tokio::{signal, sync::broadcast, time::MissedTickBehavior};
use url::Url;

use crate::{
    api,
    config::MonitorConfig,
    db,
    explorer::ExplorerClient,
    ingest::Ingestor,
    tasks::sweeper::RetentionSweeper,
};

/// Shared monitor health state feeding `/api/status`.
pub struct MonitorStatus {
    started_at: Instant,
    last_check_ms: AtomicI64,
}

impl Default for MonitorStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorStatus {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            last_check_ms: AtomicI64::new(0),
        }
    }

    /// Stamps the completion of a successful poll tick.
    pub fn mark_checked(&self) {
        self.last_check_ms.store(Utc::now().timestamp_millis(), Ordering::SeqCst);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Zero means no tick has succeeded yet.
    pub fn last_check_ms(&self) -> Option<i64> {
        match self.last_check_ms.load(Ordering::SeqCst) {
            0 => None,
            ms => Some(ms),
        }
    }
}

pub struct Daemon {
    config: MonitorConfig,
}

impl Daemon {
    pub fn new(config: MonitorConfig) -> Self {
        Self { config }
    }

    /// Runs the monitor until Ctrl-C or a fatal error.
    pub async fn run(&self) -> anyhow::Result<()> {
        if self.config.watched_address.is_empty() {
            bail!("watched_address is not configured; set monitor.watched_address in the config file");
        }

        info!("Monitor daemon started. Press Ctrl+C to stop.");

        let (shutdown_tx, _) = broadcast::channel(1);

        let db_pool = db::init_db(&self.config.database_path)?;

        let explorer_url = Url::parse(&self.config.explorer_url)?;
        let explorer = ExplorerClient::new(explorer_url, Duration::from_millis(self.config.upstream_timeout_ms))?;
        let ingestor = Ingestor::new(
            db_pool.clone(),
            self.config.watched_address.clone(),
            self.config.eligibility_threshold_sats,
        );

        let status = Arc::new(MonitorStatus::new());

        let sweeper_handle = self.config.retention_days.map(|days| {
            let sweeper = RetentionSweeper::new(db_pool.clone(), days);
            sweeper.run(shutdown_tx.subscribe())
        });

        let router = api::create_router(db_pool.clone(), status.clone(), self.config.watched_address.clone());
        let addr = format!("0.0.0.0:{}", self.config.api_port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| anyhow!("Failed to bind API server to {}: {}", addr, e))?;

        info!(address = &*addr; "API server listening");

        let mut shutdown_rx_api = shutdown_tx.subscribe();
        let api_server_handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_rx_api.recv().await.ok();
                })
                .await
        });

        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            signal::ctrl_c().await.expect("Failed to listen for ctrl_c");
            info!("Received shutdown signal, stopping all tasks...");
            let _ = shutdown_tx_clone.send(());
        });

        self.poll_loop(&ingestor, &explorer, &status, shutdown_tx.subscribe())
            .await;

        if shutdown_tx.send(()).is_err() {
            error!("Failed to send shutdown signal. All tasks may not have received it.");
        }

        api_server_handle
            .await
            .map_err(|e| anyhow!("API server task panicked: {}", e))??;
        if let Some(handle) = sweeper_handle {
            handle.await.map_err(|e| anyhow!("Sweeper task panicked: {}", e))?;
        }

        info!("Monitor daemon stopped gracefully.");
        Ok(())
    }

    /// The poller: one upstream listing fetch per tick, entries ingested in
    /// upstream-reported order. Errors abort the tick and are retried on the
    /// next one; the ledger is never mutated on a failed fetch.
    async fn poll_loop(
        &self,
        ingestor: &Ingestor,
        explorer: &ExplorerClient,
        status: &MonitorStatus,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let mut interval = tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Poller received shutdown signal. Exiting gracefully.");
                    break;
                }
                _ = interval.tick() => {
                    match self.poll_once(ingestor, explorer).await {
                        Ok(ingested) => {
                            status.mark_checked();
                            if ingested > 0 {
                                info!(new_records = ingested as u64; "Poll tick complete");
                            }
                        },
                        Err(e) => {
                            warn!(error:% = e; "Poll tick failed; will retry next interval");
                        },
                    }
                }
            }
        }
    }

    async fn poll_once(&self, ingestor: &Ingestor, explorer: &ExplorerClient) -> anyhow::Result<usize> {
        let entries = explorer.address_txs(ingestor.watched_address()).await?;

        let mut ingested = 0;
        for entry in entries {
            match ingestor.ingest(entry, explorer).await {
                Ok(crate::ingest::IngestOutcome::Recorded(_)) => ingested += 1,
                Ok(_) => {},
                Err(e) => {
                    // Ledger write failure: drop the rest of the tick, the
                    // next poll re-observes everything we skipped.
                    error!(error:% = e; "Ingestion aborted");
                    return Err(e.into());
                },
            }
        }
        Ok(ingested)
    }
}
