//! Ingestion of upstream transactions into the ledger.
//!
//! One upstream entry comes in, at most one ledger row comes out. The
//! ingestor is the idempotence anchor of the monitor: a txid already in the
//! ledger is dropped before any further upstream traffic, so replaying the
//! same listing any number of times leaves the ledger unchanged.

use log::{debug, info, warn};
use thiserror::Error;

use crate::db::{self, InsertOutcome, NewTransaction, SqlitePool};
use crate::explorer::{ExplorerClient, ExplorerTx};
use crate::models::{MintStatus, is_valid_txid};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] db::LedgerError),
}

/// What happened to one upstream entry.
#[derive(Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Decoded and persisted with the given classification.
    Recorded(MintStatus),
    /// The txid was already in the ledger.
    AlreadyKnown,
    /// The entry pays nothing to the watched address (it appears in the
    /// listing because of its inputs). Not persisted.
    NotForUs,
    /// Undecodable entry or invalid txid. Not persisted.
    Malformed,
}

pub struct Ingestor {
    db_pool: SqlitePool,
    watched_address: String,
    threshold_sats: i64,
}

impl Ingestor {
    pub fn new(db_pool: SqlitePool, watched_address: String, threshold_sats: i64) -> Self {
        Self {
            db_pool,
            watched_address,
            threshold_sats,
        }
    }

    pub fn watched_address(&self) -> &str {
        &self.watched_address
    }

    /// Ingests one raw listing entry. Malformed entries are skipped so the
    /// rest of the tick can proceed.
    pub async fn ingest(
        &self,
        raw: serde_json::Value,
        explorer: &ExplorerClient,
    ) -> Result<IngestOutcome, IngestError> {
        let tx: ExplorerTx = match serde_json::from_value(raw) {
            Ok(tx) => tx,
            Err(e) => {
                warn!(error:% = e; "Ingest: skipping malformed upstream entry");
                return Ok(IngestOutcome::Malformed);
            },
        };

        if !is_valid_txid(&tx.txid) {
            warn!(txid = &*tx.txid; "Ingest: skipping entry with invalid txid");
            return Ok(IngestOutcome::Malformed);
        }

        let conn = self.db_pool.get().map_err(db::LedgerError::from)?;

        if db::get_transaction(&conn, &tx.txid)?.is_some() {
            return Ok(IngestOutcome::AlreadyKnown);
        }

        let amount_sats: i64 = tx
            .vout
            .iter()
            .filter(|out| out.scriptpubkey_address.as_deref() == Some(self.watched_address.as_str()))
            .map(|out| out.value as i64)
            .sum();

        if amount_sats == 0 {
            debug!(txid = &*tx.txid; "Ingest: transaction does not pay the watched address");
            return Ok(IngestOutcome::NotForUs);
        }

        // The listing endpoint may omit prevout data; the detail endpoint is
        // canonical for both the sender and the block height. A failed detail
        // fetch leaves the sender absent and the record not_required.
        let mut sender_address = tx.first_input_address().map(String::from);
        let mut block_height = tx.block_height();
        if sender_address.is_none() {
            match explorer.tx_detail(&tx.txid).await {
                Ok(detail) => {
                    sender_address = detail.first_input_address().map(String::from);
                    if let Some(height) = detail.block_height() {
                        block_height = Some(height);
                    }
                },
                Err(e) => {
                    warn!(txid = &*tx.txid, error:% = e; "Ingest: sender lookup failed, recording without sender");
                },
            }
        }

        let status = if amount_sats >= self.threshold_sats && sender_address.is_some() {
            MintStatus::Pending
        } else {
            MintStatus::NotRequired
        };

        let record = NewTransaction {
            txid: tx.txid.clone(),
            amount_sats,
            block_height,
            sender_address,
            status,
        };

        match db::insert_transaction(&conn, &record)? {
            InsertOutcome::Inserted => {
                info!(
                    txid = &*tx.txid,
                    amount_sats = amount_sats,
                    status:% = status;
                    "Ingest: new deposit recorded"
                );
                Ok(IngestOutcome::Recorded(status))
            },
            // Lost a race with another ingestion of the same txid.
            InsertOutcome::AlreadyKnown => Ok(IngestOutcome::AlreadyKnown),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::tempdir;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WATCHED: &str = "bc1qwatched";
    const THRESHOLD: i64 = 1641;

    fn txid(n: u8) -> String {
        format!("{:02x}", n).repeat(32)
    }

    async fn setup() -> (tempfile::TempDir, Ingestor, MockServer, ExplorerClient) {
        let temp_dir = tempdir().unwrap();
        let pool = init_db(temp_dir.path().join("ledger.db")).unwrap();
        let ingestor = Ingestor::new(pool, WATCHED.to_string(), THRESHOLD);
        let server = MockServer::start().await;
        let client = ExplorerClient::new(Url::parse(&server.uri()).unwrap(), Duration::from_secs(5)).unwrap();
        (temp_dir, ingestor, server, client)
    }

    fn listing_entry(txid: &str, amount: u64, sender: Option<&str>) -> serde_json::Value {
        let vin = match sender {
            Some(addr) => json!([{"prevout": {"scriptpubkey_address": addr}}]),
            None => json!([{"prevout": null}]),
        };
        json!({
            "txid": txid,
            "vout": [{"scriptpubkey_address": WATCHED, "value": amount}],
            "vin": vin,
        })
    }

    #[tokio::test]
    async fn below_threshold_is_not_required() {
        let (_dir, ingestor, _server, client) = setup().await;

        let outcome = ingestor
            .ingest(listing_entry(&txid(1), 1640, Some("bc1qsender")), &client)
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Recorded(MintStatus::NotRequired));

        let conn = ingestor.db_pool.get().unwrap();
        let record = db::get_transaction(&conn, &txid(1)).unwrap().unwrap();
        assert_eq!(record.amount_sats, 1640);
        assert_eq!(record.status, MintStatus::NotRequired);
        assert!(db::list_pending(&conn).unwrap().is_empty());
    }

    #[tokio::test]
    async fn exactly_threshold_is_pending() {
        let (_dir, ingestor, _server, client) = setup().await;

        let outcome = ingestor
            .ingest(listing_entry(&txid(1), 1641, Some("bc1qsender")), &client)
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Recorded(MintStatus::Pending));
    }

    #[tokio::test]
    async fn multiple_outputs_to_watched_address_are_summed() {
        let (_dir, ingestor, _server, client) = setup().await;

        let entry = json!({
            "txid": txid(1),
            "vout": [
                {"scriptpubkey_address": WATCHED, "value": 1000},
                {"scriptpubkey_address": "bc1qchange", "value": 50_000},
                {"scriptpubkey_address": WATCHED, "value": 1000},
            ],
            "vin": [{"prevout": {"scriptpubkey_address": "bc1qsender"}}],
        });
        let outcome = ingestor.ingest(entry, &client).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Recorded(MintStatus::Pending));

        let conn = ingestor.db_pool.get().unwrap();
        let record = db::get_transaction(&conn, &txid(1)).unwrap().unwrap();
        assert_eq!(record.amount_sats, 2000);
    }

    #[tokio::test]
    async fn transaction_not_paying_us_is_skipped() {
        let (_dir, ingestor, _server, client) = setup().await;

        let entry = json!({
            "txid": txid(1),
            "vout": [{"scriptpubkey_address": "bc1qsomeoneelse", "value": 9000}],
        });
        let outcome = ingestor.ingest(entry, &client).await.unwrap();
        assert_eq!(outcome, IngestOutcome::NotForUs);

        let conn = ingestor.db_pool.get().unwrap();
        assert_eq!(db::count_transactions(&conn).unwrap().total, 0);
    }

    #[tokio::test]
    async fn eligible_without_sender_falls_back_to_detail_endpoint() {
        let (_dir, ingestor, server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path(format!("/tx/{}", txid(1))))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "txid": txid(1),
                "vout": [{"scriptpubkey_address": WATCHED, "value": 2000}],
                "vin": [{"prevout": {"scriptpubkey_address": "bc1qsender"}}],
                "status": {"block_height": 840123},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = ingestor
            .ingest(listing_entry(&txid(1), 2000, None), &client)
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Recorded(MintStatus::Pending));

        let conn = ingestor.db_pool.get().unwrap();
        let record = db::get_transaction(&conn, &txid(1)).unwrap().unwrap();
        assert_eq!(record.sender_address.as_deref(), Some("bc1qsender"));
        assert_eq!(record.block_height, Some(840123));
    }

    #[tokio::test]
    async fn detail_failure_records_not_required_even_above_threshold() {
        let (_dir, ingestor, server, client) = setup().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let outcome = ingestor
            .ingest(listing_entry(&txid(1), 5000, None), &client)
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Recorded(MintStatus::NotRequired));

        let conn = ingestor.db_pool.get().unwrap();
        let record = db::get_transaction(&conn, &txid(1)).unwrap().unwrap();
        assert!(record.sender_address.is_none());
        assert!(record.invariants_hold(THRESHOLD));
    }

    #[tokio::test]
    async fn replay_is_idempotent() {
        let (_dir, ingestor, _server, client) = setup().await;

        let entry = listing_entry(&txid(1), 2000, Some("bc1qsender"));
        assert_eq!(
            ingestor.ingest(entry.clone(), &client).await.unwrap(),
            IngestOutcome::Recorded(MintStatus::Pending)
        );
        for _ in 0..3 {
            assert_eq!(
                ingestor.ingest(entry.clone(), &client).await.unwrap(),
                IngestOutcome::AlreadyKnown
            );
        }

        let conn = ingestor.db_pool.get().unwrap();
        assert_eq!(db::count_transactions(&conn).unwrap().total, 1);
    }

    #[tokio::test]
    async fn malformed_entries_are_skipped() {
        let (_dir, ingestor, _server, client) = setup().await;

        // Not an object at all.
        assert_eq!(
            ingestor.ingest(json!("garbage"), &client).await.unwrap(),
            IngestOutcome::Malformed
        );
        // Missing vout.
        assert_eq!(
            ingestor.ingest(json!({"txid": txid(1)}), &client).await.unwrap(),
            IngestOutcome::Malformed
        );
        // txid is not 64 hex chars.
        assert_eq!(
            ingestor
                .ingest(json!({"txid": "abc", "vout": []}), &client)
                .await
                .unwrap(),
            IngestOutcome::Malformed
        );

        let conn = ingestor.db_pool.get().unwrap();
        assert_eq!(db::count_transactions(&conn).unwrap().total, 0);
    }

    #[tokio::test]
    async fn mempool_entry_is_eligible_without_confirmation() {
        let (_dir, ingestor, _server, client) = setup().await;

        // No status at all: unconfirmed, but still mintable.
        let outcome = ingestor
            .ingest(listing_entry(&txid(1), 2000, Some("bc1qsender")), &client)
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Recorded(MintStatus::Pending));

        let conn = ingestor.db_pool.get().unwrap();
        let record = db::get_transaction(&conn, &txid(1)).unwrap().unwrap();
        assert_eq!(record.block_height, None);
    }
}
