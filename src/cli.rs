use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line interface for the bitbar deposit monitor and minter worker.
///
/// Two long-running subcommands, one per process:
///
/// - [`Commands::Monitor`] - watch the deposit address and serve the ledger
/// - [`Commands::Mint`] - poll the monitor and issue inscriptions
#[derive(Parser)]
#[command(name = "bitbar", about = "Bitbar deposit monitor and minting worker", version, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config/config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct DatabaseArgs {
    /// Path to the SQLite ledger database.
    #[arg(short = 'd', long, help = "Path to the SQLite ledger database")]
    pub database_path: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ExplorerArgs {
    /// Base URL of the esplora-compatible chain explorer.
    #[arg(short = 'u', long, help = "The base URL of the chain explorer API")]
    pub explorer_url: Option<String>,

    /// Deposit address to watch for incoming payments.
    #[arg(short = 'a', long, help = "The Bitcoin address to watch")]
    pub watched_address: Option<String>,
}

#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Base URL of the monitor's HTTP API.
    #[arg(short = 's', long, help = "The base URL of the monitor API")]
    pub server_url: Option<String>,

    /// TCP port for the worker's introspection server.
    #[arg(long, help = "Port for the worker status server")]
    pub status_port: Option<u16>,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the deposit monitor: poller, ledger and HTTP API.
    ///
    /// Watches a single Bitcoin address on a chain explorer, records every
    /// incoming payment in the ledger, classifies deposits against the
    /// eligibility threshold, and exposes the minting queue over HTTP:
    ///
    /// - `GET /api/pending-mints` - the worker's job queue
    /// - `POST /api/confirm-mint` - record a finished inscription
    /// - `GET /api/status` - counters and poll health
    /// - `GET /api/minted` - completed mints, newest first
    ///
    /// API documentation is served at `/swagger-ui` while running.
    ///
    /// # Shutdown
    ///
    /// Press Ctrl+C for a graceful stop: in-flight API requests complete and
    /// the ledger is closed cleanly.
    Monitor {
        #[command(flatten)]
        db: DatabaseArgs,
        #[command(flatten)]
        explorer: ExplorerArgs,

        /// TCP port for the monitor API server.
        #[arg(long, help = "Port for the API server")]
        api_port: Option<u16>,
    },

    /// Run the minter worker: inscribe bitbars for eligible deposits.
    ///
    /// Polls the monitor for pending mints and invokes the external
    /// inscription tool once per transaction, sending the bitbar back to the
    /// depositing address. Failed attempts are retried on later polls up to
    /// the retry ceiling.
    ///
    /// The monitor base URL is taken from the config file, overridden by the
    /// `SERVER_URL` environment variable, overridden by `--server-url`.
    ///
    /// # Exit Codes
    ///
    /// Exits non-zero when `<FILE_PATH>` does not exist or the arguments are
    /// missing.
    Mint {
        /// Name of the wallet the inscription tool should use.
        wallet_name: String,
        /// Path to the file to inscribe.
        file_path: PathBuf,

        #[command(flatten)]
        worker: WorkerArgs,
    },
}

pub trait ApplyArgs {
    fn apply_database(&mut self, args: &DatabaseArgs);
    fn apply_explorer(&mut self, args: &ExplorerArgs);
    fn apply_worker(&mut self, args: &WorkerArgs);
}
