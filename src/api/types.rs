use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::TransactionRecord;

/// One entry of the worker's job queue: an eligible deposit awaiting its
/// inscription.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PendingMintItem {
    pub txid: String,
    /// Deposited amount in sats.
    pub amount: i64,
    /// First-seen time, milliseconds since the epoch.
    pub timestamp: i64,
    pub sender_address: Option<String>,
}

impl From<TransactionRecord> for PendingMintItem {
    fn from(record: TransactionRecord) -> Self {
        Self {
            txid: record.txid,
            amount: record.amount_sats,
            timestamp: record.first_seen_ms,
            sender_address: record.sender_address,
        }
    }
}

/// Body of `POST /api/confirm-mint`. Fields are optional so a missing field
/// can be answered with 400 rather than a generic decode rejection.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConfirmMintRequest {
    pub txid: Option<String>,
    pub inscription_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConfirmMintResponse {
    pub success: bool,
    pub transaction: TransactionRecord,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub total_transactions: i64,
    pub pending_mints: i64,
    /// Seconds since the monitor started.
    pub uptime: u64,
    /// Completion time of the last successful poll tick, milliseconds since
    /// the epoch. Absent until the first tick succeeds.
    pub last_check: Option<i64>,
}
