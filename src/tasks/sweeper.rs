use std::time::Duration;

use chrono::Utc;
use log::{error, info};
use tokio::{sync::broadcast, task::JoinHandle, time::interval};

use crate::db::{self, SqlitePool};

const SWEEP_INTERVAL_SECS: u64 = 60 * 60;

/// Deletes settled ledger records older than the retention horizon.
///
/// Pending records are exempt without exception: a mint that never happens
/// must stay visible forever. Disabled unless `retention_days` is configured.
pub struct RetentionSweeper {
    db_pool: SqlitePool,
    retention_days: u64,
}

impl RetentionSweeper {
    pub fn new(db_pool: SqlitePool, retention_days: u64) -> Self {
        Self {
            db_pool,
            retention_days,
        }
    }

    pub fn sweep(&self) -> Result<usize, anyhow::Error> {
        let cutoff_ms = Utc::now().timestamp_millis() - (self.retention_days as i64) * 24 * 60 * 60 * 1000;
        let conn = self.db_pool.get()?;
        let deleted = db::delete_settled_older_than(&conn, cutoff_ms)?;
        Ok(deleted)
    }

    pub fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(retention_days = self.retention_days; "Retention sweeper task started.");
            let mut interval = interval(Duration::from_secs(SWEEP_INTERVAL_SECS));

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match self.sweep() {
                            Ok(0) => {},
                            Ok(deleted) => {
                                info!(target: "audit", deleted = deleted as u64; "Retention sweep removed settled records");
                            },
                            Err(e) => {
                                error!(error:% = e; "Retention sweep failed");
                            },
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Retention sweeper received shutdown signal. Exiting gracefully.");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewTransaction, init_db, insert_transaction};
    use crate::models::MintStatus;
    use tempfile::tempdir;

    #[test]
    fn sweep_removes_only_old_settled_records() {
        let temp_dir = tempdir().unwrap();
        let pool = init_db(temp_dir.path().join("ledger.db")).unwrap();
        let conn = pool.get().unwrap();

        for (n, amount_sats, sender, status) in [
            (1u8, 100, None, MintStatus::NotRequired),
            (2, 2000, Some("bc1qa".to_string()), MintStatus::Pending),
        ] {
            insert_transaction(
                &conn,
                &NewTransaction {
                    txid: format!("{:02x}", n).repeat(32),
                    amount_sats,
                    block_height: None,
                    sender_address: sender,
                    status,
                },
            )
            .unwrap();
        }
        // Age both records past the horizon.
        conn.execute("UPDATE transactions SET first_seen_ms = 0", []).unwrap();

        let sweeper = RetentionSweeper::new(pool.clone(), 30);
        let deleted = sweeper.sweep().unwrap();
        assert_eq!(deleted, 1);

        let counts = db::count_transactions(&conn).unwrap();
        assert_eq!(counts.total, 1);
        assert_eq!(counts.pending, 1);
    }
}
