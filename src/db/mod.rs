//! Minting ledger persistence on SQLite.
//!
//! The ledger is the single authoritative store of the system: one
//! `transactions` table mapping a chain txid to its minting outcome, with a
//! secondary index on `status`. All other components (the poller, the HTTP
//! API, the worker across the wire) read and write through the operations in
//! [`ledger`].
//!
//! Migrations live in the `migrations/` directory and are applied on
//! initialization. Connections come from an `r2d2` pool; writers use
//! `BEGIN IMMEDIATE` transactions so confirms serialize against each other.

use std::path::Path;

use include_dir::{Dir, include_dir};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite_migration::Migrations;

mod error;
pub use error::{LedgerError, LedgerResult};

mod ledger;
pub use ledger::{
    ConfirmOutcome, InsertOutcome, LedgerCounts, NewTransaction, confirm_mint, count_transactions,
    delete_settled_older_than, get_transaction, insert_transaction, list_completed, list_pending,
};

pub type SqlitePool = r2d2::Pool<SqliteConnectionManager>;

static MIGRATIONS_DIR: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/migrations");

/// Opens (creating if necessary) the ledger database and applies migrations.
///
/// Fatal at startup if the file cannot be created or a migration fails; the
/// monitor cannot run without its ledger.
pub fn init_db<P: AsRef<Path>>(db_path: P) -> LedgerResult<SqlitePool> {
    let path = db_path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")
    });
    let pool = r2d2::Pool::builder().max_size(5).build(manager)?;

    let migrations = Migrations::from_directory(&MIGRATIONS_DIR)?;
    let mut conn = pool.get()?;
    migrations.to_latest(&mut conn)?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn init_db_creates_schema() {
        let temp_dir = tempdir().unwrap();
        let pool = init_db(temp_dir.path().join("nested/dir/ledger.db")).unwrap();
        let conn = pool.get().unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'transactions'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);

        let index: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'idx_transactions_status'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(index, 1);
    }
}
