use chrono::Utc;
use log::{debug, info, warn};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, named_params};

use crate::db::error::LedgerResult;
use crate::models::{MintStatus, TransactionRecord};

const RECORD_COLUMNS: &str = "txid, first_seen_ms, amount_sats, block_height, sender_address, status, \
                              inscription_id, completed_at_ms";

/// A record as produced by the ingestor, before it has a minting outcome.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub txid: String,
    pub amount_sats: i64,
    pub block_height: Option<i64>,
    pub sender_address: Option<String>,
    pub status: MintStatus,
}

#[derive(Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The txid is already in the ledger; the insert was a no-op.
    AlreadyKnown,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed(Box<TransactionRecord>),
    NotFound,
    /// The record is not pending: either already completed, or `not_required`.
    /// Confirming a `not_required` record reports this too, so a confused
    /// worker cannot resurrect a record the ingestor classified away.
    AlreadyCompleted,
}

#[derive(Debug, Clone, Copy)]
pub struct LedgerCounts {
    pub total: i64,
    pub pending: i64,
}

/// Inserts a newly observed transaction. A primary-key conflict means some
/// earlier poll already recorded this txid and is reported as
/// [`InsertOutcome::AlreadyKnown`].
pub fn insert_transaction(conn: &Connection, tx: &NewTransaction) -> LedgerResult<InsertOutcome> {
    let first_seen_ms = Utc::now().timestamp_millis();

    let res = conn.execute(
        r#"
        INSERT INTO transactions (txid, first_seen_ms, amount_sats, block_height, sender_address, status)
        VALUES (:txid, :first_seen_ms, :amount_sats, :block_height, :sender_address, :status)
        "#,
        named_params! {
            ":txid": tx.txid,
            ":first_seen_ms": first_seen_ms,
            ":amount_sats": tx.amount_sats,
            ":block_height": tx.block_height,
            ":sender_address": tx.sender_address,
            ":status": tx.status.to_string(),
        },
    );

    match res {
        Ok(_) => {
            info!(
                target: "audit",
                txid = &*tx.txid,
                amount_sats = tx.amount_sats,
                status:% = tx.status;
                "Ledger: recorded transaction"
            );
            Ok(InsertOutcome::Inserted)
        },
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            debug!(txid = &*tx.txid; "Ledger: transaction already known");
            Ok(InsertOutcome::AlreadyKnown)
        },
        Err(e) => Err(e.into()),
    }
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TransactionRecord> {
    let status_str: String = row.get(5)?;
    let status = status_str.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(TransactionRecord {
        txid: row.get(0)?,
        first_seen_ms: row.get(1)?,
        amount_sats: row.get(2)?,
        block_height: row.get(3)?,
        sender_address: row.get(4)?,
        status,
        inscription_id: row.get(6)?,
        completed_at_ms: row.get(7)?,
    })
}

pub fn get_transaction(conn: &Connection, txid: &str) -> LedgerResult<Option<TransactionRecord>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {RECORD_COLUMNS} FROM transactions WHERE txid = :txid"
    ))?;
    let row = stmt
        .query_row(named_params! { ":txid": txid }, record_from_row)
        .optional()?;
    Ok(row)
}

/// All records awaiting a mint, oldest first. Only records with a sender
/// address qualify; the worker needs a destination for the inscription.
pub fn list_pending(conn: &Connection) -> LedgerResult<Vec<TransactionRecord>> {
    let mut stmt = conn.prepare_cached(&format!(
        r#"
        SELECT {RECORD_COLUMNS}
        FROM transactions
        WHERE status = 'pending' AND sender_address IS NOT NULL
        ORDER BY first_seen_ms ASC
        "#
    ))?;
    let rows = stmt.query_map(named_params! {}, record_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Completed records, newest first.
pub fn list_completed(conn: &Connection) -> LedgerResult<Vec<TransactionRecord>> {
    let mut stmt = conn.prepare_cached(&format!(
        r#"
        SELECT {RECORD_COLUMNS}
        FROM transactions
        WHERE status = 'completed'
        ORDER BY completed_at_ms DESC
        "#
    ))?;
    let rows = stmt.query_map(named_params! {}, record_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn count_transactions(conn: &Connection) -> LedgerResult<LedgerCounts> {
    let (total, pending) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(status = 'pending'), 0) FROM transactions",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(LedgerCounts { total, pending })
}

/// Transitions `pending -> completed`, recording the inscription id and the
/// completion time. Serialized by an immediate transaction: of N concurrent
/// confirms for one txid exactly one observes `pending` and wins.
pub fn confirm_mint(conn: &mut Connection, txid: &str, inscription_id: &str) -> LedgerResult<ConfirmOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let outcome = match get_transaction(&tx, txid)? {
        None => ConfirmOutcome::NotFound,
        Some(record) if record.status != MintStatus::Pending => {
            warn!(txid = txid, status:% = record.status; "Ledger: confirm on a settled record");
            ConfirmOutcome::AlreadyCompleted
        },
        Some(_) => {
            let completed_at_ms = Utc::now().timestamp_millis();
            tx.execute(
                r#"
                UPDATE transactions
                SET status = 'completed',
                    inscription_id = :inscription_id,
                    completed_at_ms = :completed_at_ms
                WHERE txid = :txid AND status = 'pending'
                "#,
                named_params! {
                    ":txid": txid,
                    ":inscription_id": inscription_id,
                    ":completed_at_ms": completed_at_ms,
                },
            )?;
            info!(
                target: "audit",
                txid = txid,
                inscription_id = inscription_id;
                "Ledger: mint confirmed"
            );
            let record = get_transaction(&tx, txid)?
                .ok_or_else(|| super::LedgerError::Unexpected(format!("record vanished during confirm: {txid}")))?;
            ConfirmOutcome::Confirmed(Box::new(record))
        },
    };

    tx.commit()?;
    Ok(outcome)
}

/// Retention sweep: deletes settled records first seen before `cutoff_ms`.
/// Pending records are never touched; they are immortal until confirmed.
pub fn delete_settled_older_than(conn: &Connection, cutoff_ms: i64) -> LedgerResult<usize> {
    let count = conn.execute(
        "DELETE FROM transactions WHERE status != 'pending' AND first_seen_ms < :cutoff_ms",
        named_params! { ":cutoff_ms": cutoff_ms },
    )?;
    Ok(count)
}
