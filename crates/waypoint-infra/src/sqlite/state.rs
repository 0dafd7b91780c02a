//! SQLite state store implementation.
//!
//! Implements `StateStore` from `waypoint-core` over the `application_state`
//! table. Every write is a single upsert statement on the writer pool, so
//! `increment` and the initialize-once numeric write are atomic. A row whose
//! `expire_at` is at or before "now" is treated as absent: reads skip it and
//! writes start it over.

use chrono::{DateTime, Utc};
use sqlx::Row;

use waypoint_core::storage::StateStore;
use waypoint_types::error::RepositoryError;
use waypoint_types::state::{StateRecord, now_millis};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `StateStore`.
#[derive(Clone)]
pub struct SqliteStateStore {
    pool: DatabasePool,
}

impl SqliteStateStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Delete every row expired at `now_ms`. Returns the number removed.
    pub async fn purge_expired(&self, now_ms: i64) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM application_state WHERE expire_at IS NOT NULL AND expire_at <= ?1",
        )
        .bind(now_ms)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let purged = result.rows_affected();
        tracing::debug!(purged, "purged expired state");
        Ok(purged)
    }
}

// ---------------------------------------------------------------------------
// Private row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct StateRow {
    id: String,
    string_value: Option<String>,
    numeric_value: Option<f64>,
    expire_at: Option<i64>,
    updated_at: String,
}

impl StateRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            string_value: row.try_get("string_value")?,
            numeric_value: row.try_get("numeric_value")?,
            expire_at: row.try_get("expire_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_record(self) -> Result<StateRecord, RepositoryError> {
        Ok(StateRecord {
            key: self.id,
            string_value: self.string_value,
            numeric_value: self.numeric_value,
            expire_at: self.expire_at,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn query_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// StateStore implementation
// ---------------------------------------------------------------------------

impl StateStore for SqliteStateStore {
    async fn get(&self, key: &str) -> Result<Option<StateRecord>, RepositoryError> {
        let row = sqlx::query(
            r#"SELECT id, string_value, numeric_value, expire_at, updated_at
               FROM application_state
               WHERE id = ?1 AND (expire_at IS NULL OR expire_at > ?2)"#,
        )
        .bind(key)
        .bind(now_millis())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_error)?;

        match row {
            Some(row) => {
                let row = StateRow::from_row(&row).map_err(query_error)?;
                Ok(Some(row.into_record()?))
            }
            None => Ok(None),
        }
    }

    async fn put_string(
        &self,
        key: &str,
        value: &str,
        expire_at: Option<i64>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO application_state (id, string_value, numeric_value, expire_at, created_at, updated_at)
               VALUES (?1, ?2, NULL, ?3, ?4, ?4)
               ON CONFLICT (id) DO UPDATE SET
                   string_value = excluded.string_value,
                   numeric_value = CASE
                       WHEN application_state.expire_at IS NOT NULL AND application_state.expire_at <= ?5 THEN NULL
                       ELSE application_state.numeric_value
                   END,
                   expire_at = excluded.expire_at,
                   updated_at = excluded.updated_at"#,
        )
        .bind(key)
        .bind(value)
        .bind(expire_at)
        .bind(now_rfc3339())
        .bind(now_millis())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn put_number(
        &self,
        key: &str,
        value: f64,
        expire_at: Option<i64>,
        overwrite: bool,
    ) -> Result<bool, RepositoryError> {
        // Without overwrite the update only applies to rows holding no live number.
        let guard = if overwrite {
            ""
        } else {
            r#"WHERE application_state.numeric_value IS NULL
                  OR (application_state.expire_at IS NOT NULL AND application_state.expire_at <= ?5)"#
        };
        let sql = format!(
            r#"INSERT INTO application_state (id, string_value, numeric_value, expire_at, created_at, updated_at)
               VALUES (?1, NULL, ?2, ?3, ?4, ?4)
               ON CONFLICT (id) DO UPDATE SET
                   numeric_value = excluded.numeric_value,
                   string_value = CASE
                       WHEN application_state.expire_at IS NOT NULL AND application_state.expire_at <= ?5 THEN NULL
                       ELSE application_state.string_value
                   END,
                   expire_at = excluded.expire_at,
                   updated_at = excluded.updated_at
               {guard}"#
        );

        let result = sqlx::query(&sql)
            .bind(key)
            .bind(value)
            .bind(expire_at)
            .bind(now_rfc3339())
            .bind(now_millis())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment(&self, key: &str, by: f64) -> Result<f64, RepositoryError> {
        let row = sqlx::query(
            r#"INSERT INTO application_state (id, string_value, numeric_value, expire_at, created_at, updated_at)
               VALUES (?1, NULL, ?2, NULL, ?3, ?3)
               ON CONFLICT (id) DO UPDATE SET
                   numeric_value = CASE
                       WHEN application_state.expire_at IS NOT NULL AND application_state.expire_at <= ?4
                           THEN excluded.numeric_value
                       ELSE COALESCE(application_state.numeric_value, 0) + excluded.numeric_value
                   END,
                   string_value = CASE
                       WHEN application_state.expire_at IS NOT NULL AND application_state.expire_at <= ?4 THEN NULL
                       ELSE application_state.string_value
                   END,
                   expire_at = CASE
                       WHEN application_state.expire_at IS NOT NULL AND application_state.expire_at <= ?4 THEN NULL
                       ELSE application_state.expire_at
                   END,
                   updated_at = excluded.updated_at
               RETURNING numeric_value"#,
        )
        .bind(key)
        .bind(by)
        .bind(now_rfc3339())
        .bind(now_millis())
        .fetch_one(&self.pool.writer)
        .await
        .map_err(query_error)?;

        row.try_get::<f64, _>("numeric_value").map_err(query_error)
    }

    async fn set_expiry(&self, key: &str, expire_at: i64) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"UPDATE application_state
               SET expire_at = ?2, updated_at = ?3
               WHERE id = ?1 AND (expire_at IS NULL OR expire_at > ?4)"#,
        )
        .bind(key)
        .bind(expire_at)
        .bind(now_rfc3339())
        .bind(now_millis())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    async fn store() -> SqliteStateStore {
        SqliteStateStore::new(test_pool().await)
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = store().await;
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_string_roundtrip() {
        let store = store().await;
        store.put_string("app:u:linkedListId", "a2", None).await.unwrap();

        let record = store.get("app:u:linkedListId").await.unwrap().unwrap();
        assert_eq!(record.key, "app:u:linkedListId");
        assert_eq!(record.string_value.as_deref(), Some("a2"));
        assert!(record.numeric_value.is_none());
        assert!(record.expire_at.is_none());
    }

    #[tokio::test]
    async fn test_put_string_overwrites_and_keeps_number() {
        let store = store().await;
        store.put_number("k", 4.0, None, true).await.unwrap();
        store.put_string("k", "first", None).await.unwrap();
        store.put_string("k", "second", None).await.unwrap();

        let record = store.get("k").await.unwrap().unwrap();
        assert_eq!(record.string_value.as_deref(), Some("second"));
        assert_eq!(record.numeric_value, Some(4.0));
    }

    #[tokio::test]
    async fn test_put_number_initialize_once() {
        let store = store().await;
        assert!(store.put_number("n", 1.0, None, false).await.unwrap());
        assert!(!store.put_number("n", 2.0, None, false).await.unwrap());
        assert_eq!(store.get("n").await.unwrap().unwrap().numeric_value, Some(1.0));

        assert!(store.put_number("n", 3.0, None, true).await.unwrap());
        assert_eq!(store.get("n").await.unwrap().unwrap().numeric_value, Some(3.0));
    }

    #[tokio::test]
    async fn test_put_number_initializes_over_expired_value() {
        let store = store().await;
        store.put_number("n", 9.0, Some(1), true).await.unwrap();
        assert!(store.put_number("n", 1.0, None, false).await.unwrap());
        assert_eq!(store.get("n").await.unwrap().unwrap().numeric_value, Some(1.0));
    }

    #[tokio::test]
    async fn test_increment_from_absent_and_existing() {
        let store = store().await;
        assert_eq!(store.increment("c", 1.0).await.unwrap(), 1.0);
        assert_eq!(store.increment("c", 1.0).await.unwrap(), 2.0);
        assert_eq!(store.increment("c", -0.5).await.unwrap(), 1.5);
    }

    #[tokio::test]
    async fn test_increment_over_string_record() {
        let store = store().await;
        store.put_string("c", "label", None).await.unwrap();
        assert_eq!(store.increment("c", 3.0).await.unwrap(), 3.0);

        let record = store.get("c").await.unwrap().unwrap();
        assert_eq!(record.string_value.as_deref(), Some("label"));
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_atomic() {
        let store = store().await;
        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.increment("hits", 1.0).await.unwrap()
            }));
        }
        let mut seen = Vec::new();
        for handle in handles {
            seen.push(handle.await.unwrap());
        }
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(seen, (1..=20).map(f64::from).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_expired_rows_read_absent_and_restart() {
        let store = store().await;
        store.put_string("s", "old", Some(1)).await.unwrap();
        store.put_number("s", 5.0, Some(1), true).await.unwrap();
        assert!(store.get("s").await.unwrap().is_none());

        assert_eq!(store.increment("s", 1.0).await.unwrap(), 1.0);
        let record = store.get("s").await.unwrap().unwrap();
        assert!(record.string_value.is_none());
        assert!(record.expire_at.is_none());
    }

    #[tokio::test]
    async fn test_set_expiry() {
        let store = store().await;
        store.put_string("k", "v", None).await.unwrap();

        let later = now_millis() + 60_000;
        store.set_expiry("k", later).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().unwrap().expire_at, Some(later));

        store.set_expiry("k", now_millis() - 1).await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());

        // No-op on a missing key.
        store.set_expiry("missing", later).await.unwrap();
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = store().await;
        store.put_string("keep", "v", None).await.unwrap();
        store.put_string("drop1", "v", Some(1)).await.unwrap();
        store.put_number("drop2", 1.0, Some(2), true).await.unwrap();

        assert_eq!(store.purge_expired(now_millis()).await.unwrap(), 2);
        assert_eq!(store.purge_expired(now_millis()).await.unwrap(), 0);
        assert!(store.get("keep").await.unwrap().is_some());
    }
}
