use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database connection error: {0}")]
    Connection(#[from] r2d2::Error),

    #[error("Database execution error: {0}")]
    Rusqlite(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

// Convenience alias
pub type LedgerResult<T> = Result<T, LedgerError>;
