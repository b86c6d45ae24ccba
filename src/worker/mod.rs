//! The minter worker process.
//!
//! Polls the monitor for pending mints, invokes the external inscription
//! tool exactly once per eligible transaction (with bounded retries), and
//! confirms completions back to the monitor. Keeps a local append-only
//! journal and a small introspection HTTP server; all durable truth lives in
//! the monitor's ledger.
//!
//! Ctrl-C logs and exits. A subprocess in flight at that moment is orphaned
//! rather than killed mid-inscription; the next run re-discovers its
//! transaction through the pending list.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use log::info;
use tokio::{signal, sync::broadcast};
use url::Url;

use crate::config::WorkerConfig;

pub mod client;
pub mod executor;
pub mod journal;
pub mod scheduler;
pub mod server;
pub mod state;

pub use client::{MonitorClient, MonitorClientError, PendingMint};
pub use executor::MintExecutor;
pub use journal::{JournalEntry, MintJournal};
pub use scheduler::MintScheduler;
pub use state::WorkerState;

pub struct Worker {
    config: WorkerConfig,
    wallet: String,
    file: PathBuf,
}

impl Worker {
    pub fn new(config: WorkerConfig, wallet: String, file: PathBuf) -> Self {
        Self { config, wallet, file }
    }

    /// Runs the worker until Ctrl-C.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!(
            wallet = &*self.wallet,
            file:% = self.file.display(),
            server_url = &*self.config.server_url;
            "Minter worker started. Press Ctrl+C to stop."
        );

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(WorkerState::new());
        let journal = Arc::new(MintJournal::new(self.config.journal_path.clone()));
        state.seed_total_mints(journal.load_entries().len() as u64);

        let base_url = Url::parse(&self.config.server_url)?;
        let client = MonitorClient::new(base_url)?;

        let executor = Arc::new(MintExecutor::new(
            state.clone(),
            client.clone(),
            journal.clone(),
            self.config.mint_command.clone(),
            self.wallet.clone(),
            self.file.clone(),
            self.config.max_retries,
            Duration::from_millis(self.config.retry_backoff_ms),
        ));
        let scheduler = MintScheduler::new(
            state.clone(),
            client,
            executor,
            Duration::from_millis(self.config.worker_interval_ms),
            Duration::from_millis(self.config.inter_dispatch_ms),
        );

        let router = server::create_worker_router(state, journal, self.config.max_retries);
        let addr = format!("0.0.0.0:{}", self.config.status_port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| anyhow!("Failed to bind status server to {}: {}", addr, e))?;
        info!(address = &*addr; "Status server listening");

        let mut shutdown_rx_api = shutdown_tx.subscribe();
        let server_handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_rx_api.recv().await.ok();
                })
                .await
        });

        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            signal::ctrl_c().await.expect("Failed to listen for ctrl_c");
            info!("Received interrupt, stopping worker...");
            let _ = shutdown_tx_clone.send(());
        });

        scheduler.run(shutdown_tx.subscribe()).await;

        let _ = shutdown_tx.send(());
        server_handle
            .await
            .map_err(|e| anyhow!("Status server task panicked: {}", e))??;

        info!("Minter worker stopped.");
        Ok(())
    }
}
