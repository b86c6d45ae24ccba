//! The worker's HTTP introspection server.
//!
//! Read-only: `/status` surfaces the in-flight set, retry counters and mint
//! total; `/mints` dumps the local journal. Operators reconcile a failed
//! confirmation from here (journal entry present, ledger still pending).

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};

use super::journal::{JournalEntry, MintJournal};
use super::state::WorkerState;

#[derive(Clone)]
pub struct WorkerApiState {
    pub state: Arc<WorkerState>,
    pub journal: Arc<MintJournal>,
    pub max_retries: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRetry {
    pub txid: String,
    pub attempts: u32,
    pub max_retries: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatusResponse {
    /// Seconds since the worker started.
    pub uptime: u64,
    /// Txids with a subprocess currently running.
    pub active_operations: Vec<String>,
    /// Txids that have failed at least once, with their counters.
    pub pending_retries: Vec<PendingRetry>,
    pub total_mints: u64,
}

pub fn create_worker_router(state: Arc<WorkerState>, journal: Arc<MintJournal>, max_retries: u32) -> Router {
    let api_state = WorkerApiState {
        state,
        journal,
        max_retries,
    };

    Router::new()
        .route("/status", get(worker_status))
        .route("/mints", get(worker_mints))
        .with_state(api_state)
}

async fn worker_status(State(api): State<WorkerApiState>) -> Json<WorkerStatusResponse> {
    let pending_retries = api
        .state
        .failed_attempts()
        .into_iter()
        .map(|(txid, attempts)| PendingRetry {
            txid,
            attempts,
            max_retries: api.max_retries,
        })
        .collect();

    Json(WorkerStatusResponse {
        uptime: api.state.uptime_secs(),
        active_operations: api.state.active_operations(),
        pending_retries,
        total_mints: api.state.total_mints(),
    })
}

async fn worker_mints(State(api): State<WorkerApiState>) -> Json<Vec<JournalEntry>> {
    Json(api.journal.load_entries())
}
