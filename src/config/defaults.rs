use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cli::{ApplyArgs, DatabaseArgs, ExplorerArgs, WorkerArgs};

/// Configuration for the monitor process: poller, ingestor, ledger, API.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// The single deposit address this system watches.
    pub watched_address: String,
    /// Base URL of the esplora-compatible chain explorer.
    pub explorer_url: String,
    pub database_path: PathBuf,
    pub api_port: u16,
    pub poll_interval_ms: u64,
    pub upstream_timeout_ms: u64,
    pub eligibility_threshold_sats: i64,
    /// Settled records older than this many days are swept. Unset (the
    /// default) disables the sweep entirely; pending records are never swept.
    pub retention_days: Option<u64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            watched_address: String::new(),
            explorer_url: "https://mempool.space/api".to_string(),
            database_path: PathBuf::from("data/bitbar.db"),
            api_port: 3000,
            poll_interval_ms: 10_000,
            upstream_timeout_ms: 5_000,
            eligibility_threshold_sats: 1_641,
            retention_days: None,
        }
    }
}

impl ApplyArgs for MonitorConfig {
    fn apply_database(&mut self, args: &DatabaseArgs) {
        if let Some(database_path) = &args.database_path {
            self.database_path = database_path.clone();
        }
    }

    fn apply_explorer(&mut self, args: &ExplorerArgs) {
        if let Some(explorer_url) = &args.explorer_url {
            self.explorer_url = explorer_url.clone();
        }
        if let Some(watched_address) = &args.watched_address {
            self.watched_address = watched_address.clone();
        }
    }

    fn apply_worker(&mut self, _args: &WorkerArgs) {}
}

/// Configuration for the minter worker process.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Base URL of the monitor's HTTP API.
    pub server_url: String,
    /// Port for the worker's introspection server.
    pub status_port: u16,
    pub worker_interval_ms: u64,
    pub inter_dispatch_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Inscription command template. `{wallet}`, `{file}` and `{destination}`
    /// are substituted before the command is spawned.
    pub mint_command: String,
    pub journal_path: PathBuf,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".to_string(),
            status_port: 3001,
            worker_interval_ms: 30_000,
            inter_dispatch_ms: 1_000,
            max_retries: 3,
            retry_backoff_ms: 5_000,
            mint_command: "ord wallet --name {wallet} inscribe --fee-rate 1 --file {file} --destination {destination}"
                .to_string(),
            journal_path: PathBuf::from("mints.json"),
        }
    }
}

impl ApplyArgs for WorkerConfig {
    fn apply_database(&mut self, _args: &DatabaseArgs) {}

    fn apply_explorer(&mut self, _args: &ExplorerArgs) {}

    fn apply_worker(&mut self, args: &WorkerArgs) {
        if let Some(server_url) = &args.server_url {
            self.server_url = server_url.clone();
        }
        if let Some(status_port) = args.status_port {
            self.status_port = status_port;
        }
    }
}
