use crate::error::{RelationalStoreError, Result};
use crate::table::Table;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::future::Future;
use std::path::Path;

/// Contract every persistence backend (SQLite today, something else later)
/// implements: opaque get/put/delete by key within one of the fixed
/// `Table`s, plus an escape hatch for multi-write transactions.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    async fn get(&self, table: Table, key: &str) -> Result<Option<Value>>;
    async fn put(&self, table: Table, key: &str, value: Value) -> Result<()>;
    async fn delete(&self, table: Table, key: &str) -> Result<()>;
}

/// SQLite-backed `RelationalStore`. WAL mode and pool sizing follow the same
/// defaults as other sqlx-backed storage in this codebase.
#[derive(Clone)]
pub struct SqliteRelationalStore {
    pool: SqlitePool,
}

impl SqliteRelationalStore {
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let connection_string = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .idle_timeout(Some(std::time::Duration::from_secs(300)))
            .connect(&connection_string)
            .await?;

        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
        sqlx::query("PRAGMA synchronous = NORMAL").execute(&pool).await?;
        sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory store for tests; each call gets its own isolated database.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Runs `f` inside a single sqlite transaction, committing if it returns
    /// `Ok` and rolling back otherwise.
    pub async fn transaction<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(RelationalTransaction<'_>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let tx = self.pool.begin().await?;
        let handle = RelationalTransaction { tx };
        match f(handle).await {
            Ok(value) => Ok(value),
            Err(err) => Err(err),
        }
    }

    /// Deletes `cached_results` rows whose `expiry` is at or before `now`
    /// (unix seconds). Returns the number of rows removed.
    pub async fn evict_expired_cache_entries(&self, now: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cached_results WHERE expiry <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn blob_column(table: Table) -> &'static str {
    match table {
        Table::Projects => "config_blob",
        Table::IndexingState => "per_file_map",
        Table::UserContext => "blob",
        Table::Templates => "blob",
        Table::CachedResults => "payload",
    }
}

#[async_trait]
impl RelationalStore for SqliteRelationalStore {
    async fn get(&self, table: Table, key: &str) -> Result<Option<Value>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?",
            table.name(),
            table.key_column()
        );
        let row = sqlx::query(&sql).bind(key).fetch_optional(&self.pool).await?;
        let Some(row) = row else {
            return Ok(None);
        };
        row_to_value(table, &row)
    }

    async fn put(&self, table: Table, key: &str, value: Value) -> Result<()> {
        let blob = serde_json::to_string(&value)?;
        match table {
            Table::Projects | Table::UserContext | Table::Templates => {
                let sql = format!(
                    "INSERT INTO {table} ({key_col}, {blob_col}) VALUES (?, ?) \
                     ON CONFLICT({key_col}) DO UPDATE SET {blob_col} = excluded.{blob_col}",
                    table = table.name(),
                    key_col = table.key_column(),
                    blob_col = blob_column(table),
                );
                sqlx::query(&sql).bind(key).bind(blob).execute(&self.pool).await?;
            }
            Table::IndexingState => {
                let status = value
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or("uninitialized")
                    .to_string();
                let last_full_scan_ts = value.get("last_full_scan_ts").and_then(Value::as_i64);
                sqlx::query(
                    "INSERT INTO indexing_state (project_id, per_file_map, status, last_full_scan_ts) \
                     VALUES (?, ?, ?, ?) \
                     ON CONFLICT(project_id) DO UPDATE SET \
                         per_file_map = excluded.per_file_map, \
                         status = excluded.status, \
                         last_full_scan_ts = excluded.last_full_scan_ts",
                )
                .bind(key)
                .bind(blob)
                .bind(status)
                .bind(last_full_scan_ts)
                .execute(&self.pool)
                .await?;
            }
            Table::CachedResults => {
                let expiry = value.get("expiry").and_then(Value::as_i64).unwrap_or(0);
                sqlx::query(
                    "INSERT INTO cached_results (fingerprint, payload, expiry) VALUES (?, ?, ?) \
                     ON CONFLICT(fingerprint) DO UPDATE SET \
                         payload = excluded.payload, expiry = excluded.expiry",
                )
                .bind(key)
                .bind(blob)
                .bind(expiry)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, table: Table, key: &str) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            table.name(),
            table.key_column()
        );
        sqlx::query(&sql).bind(key).execute(&self.pool).await?;
        Ok(())
    }
}

fn row_to_value(table: Table, row: &sqlx::sqlite::SqliteRow) -> Result<Option<Value>> {
    let blob: String = row
        .try_get(blob_column(table))
        .map_err(RelationalStoreError::Database)?;
    let mut value: Value = serde_json::from_str(&blob)?;

    if let (Table::IndexingState, Value::Object(map)) = (table, &mut value) {
        let status: String = row.try_get("status").map_err(RelationalStoreError::Database)?;
        let last_full_scan_ts: Option<i64> = row
            .try_get("last_full_scan_ts")
            .map_err(RelationalStoreError::Database)?;
        map.insert("status".to_string(), Value::String(status));
        map.insert(
            "last_full_scan_ts".to_string(),
            last_full_scan_ts.map(Value::from).unwrap_or(Value::Null),
        );
    }
    if let (Table::CachedResults, Value::Object(map)) = (table, &mut value) {
        let expiry: i64 = row.try_get("expiry").map_err(RelationalStoreError::Database)?;
        map.insert("expiry".to_string(), Value::from(expiry));
    }

    Ok(Some(value))
}

/// A single sqlite transaction, exposing the same get/put/delete shape as
/// `RelationalStore` so callers can batch multiple writes atomically.
pub struct RelationalTransaction<'a> {
    tx: sqlx::Transaction<'a, sqlx::Sqlite>,
}

impl<'a> RelationalTransaction<'a> {
    pub async fn put(&mut self, table: Table, key: &str, value: Value) -> Result<()> {
        let blob = serde_json::to_string(&value)?;
        match table {
            Table::Projects | Table::UserContext | Table::Templates => {
                let sql = format!(
                    "INSERT INTO {table} ({key_col}, {blob_col}) VALUES (?, ?) \
                     ON CONFLICT({key_col}) DO UPDATE SET {blob_col} = excluded.{blob_col}",
                    table = table.name(),
                    key_col = table.key_column(),
                    blob_col = blob_column(table),
                );
                sqlx::query(&sql).bind(key).bind(blob).execute(&mut *self.tx).await?;
            }
            Table::IndexingState => {
                let status = value
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or("uninitialized")
                    .to_string();
                let last_full_scan_ts = value.get("last_full_scan_ts").and_then(Value::as_i64);
                sqlx::query(
                    "INSERT INTO indexing_state (project_id, per_file_map, status, last_full_scan_ts) \
                     VALUES (?, ?, ?, ?) \
                     ON CONFLICT(project_id) DO UPDATE SET \
                         per_file_map = excluded.per_file_map, \
                         status = excluded.status, \
                         last_full_scan_ts = excluded.last_full_scan_ts",
                )
                .bind(key)
                .bind(blob)
                .bind(status)
                .bind(last_full_scan_ts)
                .execute(&mut *self.tx)
                .await?;
            }
            Table::CachedResults => {
                let expiry = value.get("expiry").and_then(Value::as_i64).unwrap_or(0);
                sqlx::query(
                    "INSERT INTO cached_results (fingerprint, payload, expiry) VALUES (?, ?, ?) \
                     ON CONFLICT(fingerprint) DO UPDATE SET \
                         payload = excluded.payload, expiry = excluded.expiry",
                )
                .bind(key)
                .bind(blob)
                .bind(expiry)
                .execute(&mut *self.tx)
                .await?;
            }
        }
        Ok(())
    }

    pub async fn delete(&mut self, table: Table, key: &str) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            table.name(),
            table.key_column()
        );
        sqlx::query(&sql).bind(key).execute(&mut *self.tx).await?;
        Ok(())
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_then_get_round_trips_project_config() {
        let store = SqliteRelationalStore::open_in_memory().await.unwrap();
        let config = json!({"name": "demo", "root_path": "/repo/demo"});
        store.put(Table::Projects, "proj-a", config.clone()).await.unwrap();
        let fetched = store.get(Table::Projects, "proj-a").await.unwrap();
        assert_eq!(fetched, Some(config));
    }

    #[tokio::test]
    async fn get_missing_key_returns_none() {
        let store = SqliteRelationalStore::open_in_memory().await.unwrap();
        let fetched = store.get(Table::Projects, "nope").await.unwrap();
        assert_eq!(fetched, None);
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let store = SqliteRelationalStore::open_in_memory().await.unwrap();
        store
            .put(Table::Templates, "t1", json!({"query_builder": "foo"}))
            .await
            .unwrap();
        store.delete(Table::Templates, "t1").await.unwrap();
        assert_eq!(store.get(Table::Templates, "t1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn indexing_state_put_populates_status_column() {
        let store = SqliteRelationalStore::open_in_memory().await.unwrap();
        store
            .put(
                Table::IndexingState,
                "proj-a",
                json!({"status": "ready", "last_full_scan_ts": 1000, "files": {}}),
            )
            .await
            .unwrap();

        let row = sqlx::query("SELECT status, last_full_scan_ts FROM indexing_state WHERE project_id = ?")
            .bind("proj-a")
            .fetch_one(store.pool())
            .await
            .unwrap();
        let status: String = row.try_get("status").unwrap();
        let ts: i64 = row.try_get("last_full_scan_ts").unwrap();
        assert_eq!(status, "ready");
        assert_eq!(ts, 1000);
    }

    #[tokio::test]
    async fn expired_cache_entries_are_evicted() {
        let store = SqliteRelationalStore::open_in_memory().await.unwrap();
        store
            .put(Table::CachedResults, "fp-1", json!({"expiry": 10, "results": []}))
            .await
            .unwrap();
        store
            .put(Table::CachedResults, "fp-2", json!({"expiry": 1000, "results": []}))
            .await
            .unwrap();

        let evicted = store.evict_expired_cache_entries(500).await.unwrap();
        assert_eq!(evicted, 1);
        assert_eq!(store.get(Table::CachedResults, "fp-1").await.unwrap(), None);
        assert!(store.get(Table::CachedResults, "fp-2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_error() {
        let store = SqliteRelationalStore::open_in_memory().await.unwrap();
        let result: Result<()> = store
            .transaction(|mut tx| async move {
                tx.put(Table::Templates, "t1", json!({"query_builder": "foo"})).await?;
                Err(RelationalStoreError::NotFound("simulated failure".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(store.get(Table::Templates, "t1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn transaction_commits_all_writes_together() {
        let store = SqliteRelationalStore::open_in_memory().await.unwrap();
        store
            .transaction(|mut tx| async move {
                tx.put(Table::Templates, "t1", json!({"query_builder": "foo"})).await?;
                tx.put(Table::Templates, "t2", json!({"query_builder": "bar"})).await?;
                tx.commit().await
            })
            .await
            .unwrap();
        assert!(store.get(Table::Templates, "t1").await.unwrap().is_some());
        assert!(store.get(Table::Templates, "t2").await.unwrap().is_some());
    }
}
