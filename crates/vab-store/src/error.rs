use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Creating the database directory failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("migration error: {0}")]
    Migration(String),

    /// The schema is behind the binary; the migration runner has not been run.
    #[error("{0} pending migration(s); run vab-migrate first")]
    PendingMigrations(u32),

    /// Another thread panicked while holding the connection.
    #[error("database connection lock poisoned")]
    Poisoned,
}

impl From<StoreError> for vab_core::Error {
    fn from(e: StoreError) -> Self {
        vab_core::Error::Persistence(e.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
