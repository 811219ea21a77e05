//! Error types for the Questline binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup and shutdown.

/// Top-level error for the Questline binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: questline_core::config::ConfigError,
    },

    /// Local or remote storage could not be opened.
    #[error("storage error: {source}")]
    Storage {
        /// The underlying storage error.
        #[from]
        source: questline_db::DbError,
    },

    /// The session could not be activated.
    #[error("session error: {source}")]
    Session {
        /// The underlying session error.
        #[from]
        source: questline_sync::SessionError,
    },

    /// The progress API server failed.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: questline_server::ServerError,
    },

    /// The stored account id could not be read or written.
    #[error("account id error: {message}")]
    Account {
        /// Description of the failure.
        message: String,
    },
}
