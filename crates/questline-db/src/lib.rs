//! Persistence for Questline progress: a device-local store and the remote
//! progress store backends.
//!
//! # Architecture
//!
//! ```text
//! Engine command
//!     |
//!     +-- every mutation, synchronously --> LocalStore (files under data_dir)
//!     |
//!     +-- trailing debounce ------------> RemoteBackend
//!         |-- Disabled
//!         |-- Memory         (in-process, tests and demos)
//!         +-- Postgres       (ProgressStore over PostgresPool)
//! ```
//!
//! # Modules
//!
//! - [`local_store`] -- File-backed per-user key/value store
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`progress_store`] -- `user_progress` table queries
//! - [`remote`] -- Remote backend selection and the in-memory backend
//! - [`error`] -- Shared error types

pub mod error;
pub mod local_store;
pub mod postgres;
pub mod progress_store;
pub mod remote;

// Re-export primary types for convenience.
pub use error::DbError;
pub use local_store::{LocalKey, LocalStore};
pub use postgres::{PostgresConfig, PostgresPool};
pub use progress_store::ProgressStore;
pub use remote::{MemoryRemote, RemoteBackend};
