//! Remote progress store backends.
//!
//! The session talks to whichever backend the binary selected through
//! [`RemoteBackend`], dispatching by enum rather than trait object so the
//! async methods stay plain `async fn`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use questline_types::{ProgressDocument, UserId};
use tokio::sync::RwLock;

use crate::error::DbError;
use crate::postgres::PostgresPool;

/// The configured remote progress store.
#[derive(Debug, Clone)]
pub enum RemoteBackend {
    /// No remote store; the local copy is all there is.
    Disabled,
    /// An in-process store, for tests and offline demos.
    Memory(MemoryRemote),
    /// `PostgreSQL` `user_progress` table.
    Postgres(PostgresPool),
}

impl RemoteBackend {
    /// Whether a remote store is configured.
    pub const fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Short name for logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Memory(_) => "memory",
            Self::Postgres(_) => "postgres",
        }
    }

    /// Fetch the stored document for `user` as raw JSON.
    ///
    /// A disabled backend has nothing stored.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend cannot be reached.
    pub async fn get_progress(&self, user: UserId) -> Result<Option<serde_json::Value>, DbError> {
        match self {
            Self::Disabled => Ok(None),
            Self::Memory(memory) => memory.get(user).await,
            Self::Postgres(pool) => pool.progress().get_progress(user).await,
        }
    }

    /// Insert or replace the document for `user`.
    ///
    /// A disabled backend accepts and drops the write.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if serialization fails or the backend rejects the
    /// write.
    pub async fn upsert_progress(
        &self,
        user: UserId,
        document: &ProgressDocument,
    ) -> Result<(), DbError> {
        match self {
            Self::Disabled => Ok(()),
            Self::Memory(memory) => memory.upsert(user, serde_json::to_value(document)?).await,
            Self::Postgres(pool) => {
                let json = serde_json::to_value(document)?;
                pool.progress().upsert_progress(user, &json).await
            }
        }
    }
}

/// An in-process remote store with failure injection.
///
/// Clones share state, so a test can keep one handle while the session
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    inner: Arc<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    documents: RwLock<HashMap<UserId, serde_json::Value>>,
    failing: AtomicBool,
    writes: AtomicU64,
}

impl MemoryRemote {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::Release);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.inner.writes.load(Ordering::Acquire)
    }

    /// Seed a raw document without counting it as a write.
    pub async fn seed(&self, user: UserId, document: serde_json::Value) {
        self.inner.documents.write().await.insert(user, document);
    }

    /// The raw document stored for `user`.
    pub async fn document(&self, user: UserId) -> Option<serde_json::Value> {
        self.inner.documents.read().await.get(&user).cloned()
    }

    async fn get(&self, user: UserId) -> Result<Option<serde_json::Value>, DbError> {
        self.check()?;
        Ok(self.document(user).await)
    }

    async fn upsert(&self, user: UserId, document: serde_json::Value) -> Result<(), DbError> {
        self.check()?;
        self.inner.documents.write().await.insert(user, document);
        self.inner.writes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn check(&self) -> Result<(), DbError> {
        if self.inner.failing.load(Ordering::Acquire) {
            return Err(DbError::RemoteUnavailable(
                "memory remote set to fail".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_backend_is_empty_and_accepts_writes() {
        let backend = RemoteBackend::Disabled;
        let user = UserId::new();
        assert!(!backend.is_enabled());
        assert!(backend.get_progress(user).await.unwrap().is_none());
        backend
            .upsert_progress(user, &ProgressDocument::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn memory_backend_round_trips_and_counts_writes() {
        let memory = MemoryRemote::new();
        let backend = RemoteBackend::Memory(memory.clone());
        let user = UserId::new();
        let document = ProgressDocument {
            score: 7,
            ..ProgressDocument::default()
        };
        backend.upsert_progress(user, &document).await.unwrap();
        let raw = backend.get_progress(user).await.unwrap().unwrap();
        assert_eq!(raw["score"], 7);
        assert_eq!(memory.write_count(), 1);
        assert_eq!(backend.kind(), "memory");
    }

    #[tokio::test]
    async fn failing_memory_backend_rejects_calls() {
        let memory = MemoryRemote::new();
        let backend = RemoteBackend::Memory(memory.clone());
        let user = UserId::new();
        memory.set_failing(true);
        assert!(backend.get_progress(user).await.is_err());
        assert!(
            backend
                .upsert_progress(user, &ProgressDocument::default())
                .await
                .is_err()
        );
        assert_eq!(memory.write_count(), 0);
    }
}
