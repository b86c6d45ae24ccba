//! Bitbar: a two-process service that rewards Bitcoin deposits with
//! inscriptions.
//!
//! A **monitor** watches a single deposit address on a public chain explorer,
//! de-duplicates what the explorer reports, persists a minting ledger in
//! SQLite, and exposes a job queue over HTTP. A separate **minter worker**
//! polls that queue, invokes an external inscription tool once per eligible
//! deposit (bounded retries, one subprocess per txid), and confirms each
//! finished inscription back to the monitor.
//!
//! # Architecture
//!
//! ```text
//! explorer --> poller --> ingestor --> ledger --> API
//!                                                  ^
//!                         scheduler --> executor --+--> inscription tool
//!                             |            |
//!                             +-- journal -+
//! ```
//!
//! The ledger is the only authoritative state. A deposit becomes a ledger
//! record exactly once (replaying the explorer's listing is a no-op), a
//! pending record becomes completed exactly once (concurrent confirms
//! serialize in SQLite), and the worker's journal is a local forensic
//! projection, never consulted for correctness.
//!
//! # Modules
//!
//! - [`api`]: the monitor's HTTP surface (pending queue, confirm, status)
//! - [`cli`]: clap command definitions for both processes
//! - [`config`]: TOML configuration with environment and CLI overrides
//! - [`daemon`]: monitor orchestration - poller loop, API server, shutdown
//! - [`db`]: the SQLite ledger and its operations
//! - [`explorer`]: client for the esplora-compatible upstream
//! - [`ingest`]: normalization and eligibility classification
//! - [`log`]: log4rs initialisation
//! - [`models`]: the transaction record and its status machine
//! - [`tasks`]: optional retention sweeper
//! - [`worker`]: the minter worker - scheduler, executor, journal

pub mod api;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod db;
pub mod explorer;
pub mod ingest;
pub mod log;
pub mod models;
pub mod tasks;
pub mod worker;

pub use crate::api::ApiDoc;
pub use crate::daemon::{Daemon, MonitorStatus};
pub use crate::db::init_db;
pub use crate::models::{MintStatus, TransactionRecord};
pub use crate::worker::Worker;
