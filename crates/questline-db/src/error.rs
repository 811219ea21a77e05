//! Persistence errors.
//!
//! Local and remote stores share [`DbError`]. The session decides which of
//! these are fatal: a failed remote call is logged and absorbed, a failed
//! local write is logged, and only explicit sync surfaces either.

/// Errors from the local or remote progress store.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A query against the remote database failed.
    #[error("remote database error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Applying the remote schema failed.
    #[error("remote schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A local progress file could not be read or written.
    #[error("local store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value is not the JSON we expect.
    #[error("progress JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Nothing is stored under this local key.
    #[error("no local value at {0}")]
    KeyNotFound(String),

    /// The store was configured with an unusable value.
    #[error("store configuration error: {0}")]
    Config(String),

    /// The remote store refused or could not serve the request.
    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(String),
}
