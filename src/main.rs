//! Bitbar CLI entry point.
//!
//! Dispatches to one of the two processes: the deposit monitor
//! (`bitbar monitor`) or the minter worker (`bitbar mint`). Configuration
//! comes from `config/config.toml` (created on first run), overridden by
//! `BITBAR_`-prefixed environment variables and CLI flags; the worker's
//! monitor URL additionally honors `SERVER_URL`.

use anyhow::bail;
use clap::Parser;

use bitbar::{
    cli::{ApplyArgs, Cli, Commands},
    config::{self, MonitorConfig, WorkerConfig},
    daemon::Daemon,
    log::init_logging,
    worker::Worker,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let settings = config::load_configuration(&cli.config)?;

    match cli.command {
        Commands::Monitor { db, explorer, api_port } => {
            let mut monitor_config: MonitorConfig = config::section(&settings, "monitor")?;
            monitor_config.apply_database(&db);
            monitor_config.apply_explorer(&explorer);
            if let Some(api_port) = api_port {
                monitor_config.api_port = api_port;
            }

            Daemon::new(monitor_config).run().await
        },
        Commands::Mint {
            wallet_name,
            file_path,
            worker,
        } => {
            if !file_path.exists() {
                bail!("Inscription file not found: {}", file_path.display());
            }

            let mut worker_config: WorkerConfig = config::section(&settings, "worker")?;
            if let Ok(server_url) = std::env::var("SERVER_URL") {
                worker_config.server_url = server_url;
            }
            worker_config.apply_worker(&worker);

            Worker::new(worker_config, wallet_name, file_path).run().await
        },
    }
}
