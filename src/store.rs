//! Engram store on SQLite
//!
//! One primary table plus three secondary indices (concept, day, type).
//! Every `store` writes all four inside a single transaction.

use crate::error::{CognitionError, Result};
use crate::types::{Engram, EngramType, FALLBACK_STRENGTH};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

const ENGRAM_COLUMNS: &str = "e.id, e.content, e.schema_words, e.strength, e.engram_type, e.timestamp";

/// Engram store over a SQLite pool
#[derive(Clone)]
pub struct EngramStore {
    pool: SqlitePool,
}

impl std::fmt::Debug for EngramStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngramStore")
            .field("pool", &"<SqlitePool>")
            .finish()
    }
}

/// Store-level counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub by_type: Vec<(EngramType, usize)>,
}

impl EngramStore {
    /// Open (or create) the database file and apply migrations
    pub async fn open(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("Opened engram store at {}", path.display());
        Ok(Arc::new(Self { pool }))
    }

    /// Create an in-memory store
    pub async fn connect_in_memory() -> Result<Arc<Self>> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .create_if_missing(true);

        // A single connection, or each new one would see its own empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Arc::new(Self { pool }))
    }

    /// Get a reference to the SQLite pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Write the engram and all of its index entries atomically.
    /// Returns false, writing nothing, if the id is already stored.
    pub async fn store(&self, engram: &Engram) -> Result<bool> {
        let schema_json = serde_json::to_string(&engram.schema)?;
        let engram_type = engram.engram_type.to_string();

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO engrams (id, content, schema_words, strength, engram_type, timestamp)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&engram.id)
        .bind(&engram.content)
        .bind(&schema_json)
        .bind(engram.strength)
        .bind(&engram_type)
        .bind(engram.timestamp)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if !inserted {
            tx.rollback().await?;
            tracing::debug!("Engram {} already stored", engram.id);
            return Ok(false);
        }

        let words: BTreeSet<&str> = engram.concepts().collect();
        for word in words {
            sqlx::query("INSERT OR IGNORE INTO concept_index (word, engram_id) VALUES (?, ?)")
                .bind(word)
                .bind(&engram.id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("INSERT OR IGNORE INTO day_index (day, engram_id) VALUES (?, ?)")
            .bind(engram.day_bucket())
            .bind(&engram.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT OR IGNORE INTO type_index (engram_type, engram_id) VALUES (?, ?)")
            .bind(&engram_type)
            .bind(&engram.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Load an engram by id
    pub async fn get(&self, id: &str) -> Result<Option<Engram>> {
        let query = format!("SELECT {ENGRAM_COLUMNS} FROM engrams e WHERE e.id = ?");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row_to_engram(&row)?)),
            None => {
                tracing::debug!("Engram {} not found", id);
                Ok(None)
            }
        }
    }

    /// All engrams indexed under `word`, newest first
    pub async fn get_by_word(&self, word: &str) -> Result<Vec<Engram>> {
        let query = format!(
            "SELECT {ENGRAM_COLUMNS} FROM engrams e \
             JOIN concept_index c ON c.engram_id = e.id \
             WHERE c.word = ? ORDER BY e.timestamp DESC"
        );
        let rows = sqlx::query(&query)
            .bind(word)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_engram).collect()
    }

    /// Engrams of one type, optionally restricted to those whose schema
    /// contains `word`. Rows without a type index entry are matched on
    /// their own column, NULL counting as ATOMIC.
    pub async fn get_by_type(
        &self,
        engram_type: EngramType,
        word: Option<&str>,
    ) -> Result<Vec<Engram>> {
        let query = format!(
            "SELECT {ENGRAM_COLUMNS} FROM engrams e \
             LEFT JOIN type_index t ON t.engram_id = e.id \
             WHERE t.engram_type = ?1 \
                OR (t.engram_id IS NULL AND UPPER(COALESCE(e.engram_type, 'ATOMIC')) = ?1) \
             ORDER BY e.timestamp DESC"
        );
        let rows = sqlx::query(&query)
            .bind(engram_type.to_string())
            .fetch_all(&self.pool)
            .await?;

        let engrams = rows
            .iter()
            .map(row_to_engram)
            .collect::<Result<Vec<_>>>()?;
        Ok(match word {
            Some(word) => engrams.into_iter().filter(|e| e.mentions(word)).collect(),
            None => engrams,
        })
    }

    /// Engrams whose timestamp falls on `day` (UTC)
    pub async fn get_by_day(&self, day: NaiveDate) -> Result<Vec<Engram>> {
        let query = format!(
            "SELECT {ENGRAM_COLUMNS} FROM engrams e \
             JOIN day_index d ON d.engram_id = e.id \
             WHERE d.day = ? ORDER BY e.timestamp ASC"
        );
        let rows = sqlx::query(&query)
            .bind(day.format("%Y-%m-%d").to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_engram).collect()
    }

    pub async fn statistics(&self) -> Result<StoreStats> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS n FROM engrams")
            .fetch_one(&self.pool)
            .await?
            .try_get("n")?;

        let rows = sqlx::query(
            r#"
            SELECT COALESCE(engram_type, 'ATOMIC') AS t, COUNT(*) AS n
            FROM engrams
            GROUP BY COALESCE(engram_type, 'ATOMIC')
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_type: Vec<(EngramType, usize)> = Vec::new();
        for row in &rows {
            let t: String = row.try_get("t")?;
            let n: i64 = row.try_get("n")?;
            let t = EngramType::parse(&t);
            match by_type.iter_mut().find(|(k, _)| *k == t) {
                Some((_, count)) => *count += n as usize,
                None => by_type.push((t, n as usize)),
            }
        }

        Ok(StoreStats {
            total: total as usize,
            by_type,
        })
    }

    pub async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Helper: Convert database row to Engram
fn row_to_engram(row: &sqlx::sqlite::SqliteRow) -> Result<Engram> {
    let schema_json: String = row.try_get("schema_words")?;
    let schema: Vec<String> = serde_json::from_str(&schema_json).map_err(|e| {
        CognitionError::Serialization(format!("Corrupt schema for engram: {e}"))
    })?;

    // Older rows may lack a type or strength
    let engram_type = row
        .try_get::<Option<String>, _>("engram_type")?
        .map(|t| EngramType::parse(&t))
        .unwrap_or_default();
    let strength = row
        .try_get::<Option<f32>, _>("strength")?
        .unwrap_or(FALLBACK_STRENGTH);
    let timestamp: DateTime<Utc> = row.try_get("timestamp")?;

    Ok(Engram {
        id: row.try_get("id")?,
        content: row.try_get("content")?,
        schema,
        strength,
        engram_type,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn engram(content: &str, schema: &[&str], t: EngramType) -> Engram {
        Engram::new(content, schema.iter().copied(), t)
    }

    #[tokio::test]
    async fn test_store_and_get() {
        let store = EngramStore::connect_in_memory().await.unwrap();
        let e = engram("rust ownership", &["rust", "ownership"], EngramType::Atomic);

        assert!(store.store(&e).await.unwrap());
        let loaded = store.get(&e.id).await.unwrap().unwrap();
        assert_eq!(loaded, e);

        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_is_idempotent_per_id() {
        let store = EngramStore::connect_in_memory().await.unwrap();
        let e = engram("once", &["a"], EngramType::Atomic);

        assert!(store.store(&e).await.unwrap());
        assert!(!store.store(&e).await.unwrap());
        assert_eq!(store.statistics().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_every_schema_word_is_indexed() {
        let store = EngramStore::connect_in_memory().await.unwrap();
        let e = engram("c", &["a", "b", "a"], EngramType::Link);
        store.store(&e).await.unwrap();

        for word in ["a", "b"] {
            let hits = store.get_by_word(word).await.unwrap();
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].id, e.id);
        }
        assert!(store.get_by_word("c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_by_type_with_concept_filter() {
        let store = EngramStore::connect_in_memory().await.unwrap();
        let p1 = engram("p1", &["x", "y"], EngramType::Pattern);
        let p2 = engram("p2", &["z"], EngramType::Pattern);
        let a = engram("a", &["x"], EngramType::Atomic);
        for e in [&p1, &p2, &a] {
            store.store(e).await.unwrap();
        }

        assert_eq!(store.get_by_type(EngramType::Pattern, None).await.unwrap().len(), 2);
        let filtered = store
            .get_by_type(EngramType::Pattern, Some("x"))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, p1.id);
    }

    #[tokio::test]
    async fn test_get_by_day() {
        let store = EngramStore::connect_in_memory().await.unwrap();
        let day = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let today = engram("t", &["a"], EngramType::Atomic).with_timestamp(day);
        let other = engram("o", &["a"], EngramType::Atomic).with_timestamp(day + Duration::days(1));
        store.store(&today).await.unwrap();
        store.store(&other).await.unwrap();

        let hits = store.get_by_day(day.date_naive()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, today.id);
    }

    #[tokio::test]
    async fn test_failed_index_write_leaves_nothing_behind() {
        let store = EngramStore::connect_in_memory().await.unwrap();
        sqlx::query("DROP TABLE type_index")
            .execute(store.pool())
            .await
            .unwrap();

        let e = engram("doomed", &["a", "b"], EngramType::Atomic);
        assert!(store.store(&e).await.is_err());

        assert!(store.get(&e.id).await.unwrap().is_none());
        assert!(store.get_by_word("a").await.unwrap().is_empty());
        let days: i64 = sqlx::query("SELECT COUNT(*) AS n FROM day_index")
            .fetch_one(store.pool())
            .await
            .unwrap()
            .try_get("n")
            .unwrap();
        assert_eq!(days, 0);
    }

    #[tokio::test]
    async fn test_legacy_row_defaults() {
        let store = EngramStore::connect_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO engrams (id, content, schema_words, strength, engram_type, timestamp) \
             VALUES ('old', 'legacy', '[\"w\"]', NULL, NULL, ?)",
        )
        .bind(Utc::now())
        .execute(store.pool())
        .await
        .unwrap();
        sqlx::query("INSERT INTO concept_index (word, engram_id) VALUES ('w', 'old')")
            .execute(store.pool())
            .await
            .unwrap();

        let hits = store.get_by_word("w").await.unwrap();
        assert_eq!(hits[0].engram_type, EngramType::Atomic);
        assert_eq!(hits[0].strength, FALLBACK_STRENGTH);

        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.by_type, vec![(EngramType::Atomic, 1)]);

        let atomics = store.get_by_type(EngramType::Atomic, None).await.unwrap();
        assert_eq!(atomics.len(), 1);
        assert_eq!(atomics[0].id, "old");
        let filtered = store
            .get_by_type(EngramType::Atomic, Some("w"))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert!(store
            .get_by_type(EngramType::Link, None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_on_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engrams.db");
        let e = engram("persisted", &["disk"], EngramType::Atomic);

        let store = EngramStore::open(&path).await.unwrap();
        store.store(&e).await.unwrap();
        store.close().await.unwrap();

        let reopened = EngramStore::open(&path).await.unwrap();
        assert_eq!(reopened.get_by_word("disk").await.unwrap().len(), 1);
    }
}
