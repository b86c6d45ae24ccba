//! Data models shared across the monitor and worker.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Minting status of a watched transaction.
///
/// Transitions are monotonic: a record is created as either `NotRequired`
/// (terminal) or `Pending`, and a pending record moves to `Completed` exactly
/// once via the confirm-mint operation. Downgrades are forbidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MintStatus {
    /// Below the eligibility threshold, or no sender address could be
    /// determined. Terminal.
    NotRequired,
    /// Eligible for minting; the worker has not yet confirmed an inscription.
    Pending,
    /// An inscription id has been recorded. Terminal.
    Completed,
}

impl fmt::Display for MintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MintStatus::NotRequired => write!(f, "not_required"),
            MintStatus::Pending => write!(f, "pending"),
            MintStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for MintStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_required" => Ok(MintStatus::NotRequired),
            "pending" => Ok(MintStatus::Pending),
            "completed" => Ok(MintStatus::Completed),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// A row of the `transactions` table: the durable binding between a chain
/// transaction and its minting outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransactionRecord {
    /// Transaction id as reported by the chain explorer (64 hex characters).
    pub txid: String,
    /// Wall-clock time of first ingestion, milliseconds since the epoch.
    pub first_seen_ms: i64,
    /// Sum of the outputs paying the watched address, in sats.
    pub amount_sats: i64,
    /// Block height, present once the upstream reports confirmation.
    pub block_height: Option<i64>,
    /// Recipient of the reward inscription, from the first input's prevout.
    pub sender_address: Option<String>,
    pub status: MintStatus,
    /// Present iff `status` is `completed`.
    pub inscription_id: Option<String>,
    /// Wall-clock time of confirmation, present iff `status` is `completed`.
    pub completed_at_ms: Option<i64>,
}

impl TransactionRecord {
    /// Returns true if every structural invariant of the ledger holds for
    /// this record.
    pub fn invariants_hold(&self, threshold_sats: i64) -> bool {
        if self.amount_sats < 0 {
            return false;
        }
        match self.status {
            MintStatus::Pending => self.amount_sats >= threshold_sats && self.sender_address.is_some(),
            MintStatus::NotRequired => self.amount_sats < threshold_sats || self.sender_address.is_none(),
            MintStatus::Completed => self.inscription_id.is_some() && self.completed_at_ms.is_some(),
        }
    }
}

/// Returns true if `txid` looks like a transaction id: exactly 64 hex
/// characters.
pub fn is_valid_txid(txid: &str) -> bool {
    txid.len() == 64 && hex::decode(txid).is_ok()
}
