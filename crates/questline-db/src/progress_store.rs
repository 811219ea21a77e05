//! Remote progress documents in the `user_progress` table.
//!
//! One row per learner. Writes are whole-document upserts; the store never
//! merges, so the last writer wins at the row level.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use questline_types::UserId;

use crate::error::DbError;

/// Operations on the `user_progress` table.
pub struct ProgressStore<'a> {
    pool: &'a PgPool,
}

impl<'a> ProgressStore<'a> {
    /// Create a new progress store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fetch the stored document for `user`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn get_progress(&self, user: UserId) -> Result<Option<serde_json::Value>, DbError> {
        let document = sqlx::query_scalar::<_, serde_json::Value>(
            r"SELECT document FROM user_progress WHERE user_id = $1",
        )
        .bind(user.into_inner())
        .fetch_optional(self.pool)
        .await?;

        tracing::debug!(user_id = %user, found = document.is_some(), "Fetched remote progress");
        Ok(document)
    }

    /// Insert or replace the document for `user`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the upsert fails.
    pub async fn upsert_progress(
        &self,
        user: UserId,
        document: &serde_json::Value,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO user_progress (user_id, document, updated_at)
              VALUES ($1, $2, now())
              ON CONFLICT (user_id) DO UPDATE SET
                document = EXCLUDED.document,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(user.into_inner())
        .bind(document)
        .execute(self.pool)
        .await?;

        tracing::debug!(user_id = %user, "Upserted remote progress");
        Ok(())
    }

    /// When the document for `user` was last written.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn updated_at(&self, user: UserId) -> Result<Option<DateTime<Utc>>, DbError> {
        let updated = sqlx::query_scalar::<_, DateTime<Utc>>(
            r"SELECT updated_at FROM user_progress WHERE user_id = $1",
        )
        .bind(user.into_inner())
        .fetch_optional(self.pool)
        .await?;
        Ok(updated)
    }

    /// Remove the document for `user`. Returns whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the delete fails.
    pub async fn delete_progress(&self, user: UserId) -> Result<bool, DbError> {
        let result = sqlx::query(r"DELETE FROM user_progress WHERE user_id = $1")
            .bind(user.into_inner())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
