use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

use super::lock::CacheLock;
use super::types::DatabaseError;

pub struct StoreConfig {
    pub synchronous: String,
    pub journal_mode: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            synchronous: "NORMAL".into(),
            journal_mode: "WAL".into(),
        }
    }
}

/// Embedded relational store of feeds/items (spec §4.2). One writer, many
/// readers; all writes serialize through sqlx's pool against a single-writer
/// SQLite file.
#[derive(Clone)]
pub struct Store {
    pub(crate) pool: SqlitePool,
    pub(crate) lock: std::sync::Arc<Option<CacheLock>>,
}

impl Store {
    /// Opens the cache file, runs schema migrations, acquires the
    /// process-wide lock (skipped for `:memory:`), and sets pragmas from
    /// `cfg`.
    pub async fn open(path: &str, cfg: &StoreConfig) -> Result<Self, DatabaseError> {
        let lock = if path == ":memory:" {
            None
        } else {
            Some(CacheLock::acquire(Path::new(path))?)
        };

        let url = format!("sqlite:{path}?mode=rwc");
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000")
            .pragma("synchronous", cfg.synchronous.clone())
            .pragma("journal_mode", cfg.journal_mode.clone());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let store = Store {
            pool,
            lock: std::sync::Arc::new(lock),
        };
        store.migrate().await.map_err(|e| {
            let s = e.to_string().to_lowercase();
            if s.contains("database is locked") || s.contains("sqlite_busy") {
                DatabaseError::InstanceLocked
            } else {
                DatabaseError::Migration(e.to_string())
            }
        })?;
        Ok(store)
    }

    /// Current schema version, written to `PRAGMA user_version` once all
    /// migrations in `migrate` have run.
    const SCHEMA_VERSION: i64 = 2;

    async fn migrate(&self) -> Result<()> {
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&self.pool)
            .await?;

        let (current_version,): (i64,) = sqlx::query_as("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rss_feed (
                rssurl TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                link TEXT NOT NULL DEFAULT '',
                pub_date INTEGER NOT NULL DEFAULT 0,
                lastmodified INTEGER,
                is_rtl INTEGER NOT NULL DEFAULT 0,
                etag TEXT,
                consecutive_failures INTEGER NOT NULL DEFAULT 0
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rss_item (
                guid TEXT PRIMARY KEY,
                title TEXT NOT NULL DEFAULT '',
                author TEXT,
                url TEXT,
                feedurl TEXT NOT NULL REFERENCES rss_feed(rssurl) ON DELETE CASCADE,
                pubDate INTEGER NOT NULL DEFAULT 0,
                content TEXT,
                unread INTEGER NOT NULL DEFAULT 1,
                enclosure_url TEXT,
                enclosure_type TEXT,
                enqueued INTEGER NOT NULL DEFAULT 0,
                flags TEXT NOT NULL DEFAULT '',
                base TEXT,
                content_mime_type TEXT,
                enclosure_description TEXT,
                enclosure_description_mime_type TEXT,
                deleted INTEGER NOT NULL DEFAULT 0
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_rss_item_feedurl ON rss_item(feedurl)")
            .execute(&mut *tx)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_rss_item_pubdate ON rss_item(pubDate)")
            .execute(&mut *tx)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_rss_item_deleted ON rss_item(deleted)")
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_rss_item_feedurl_pubdate ON rss_item(feedurl, pubDate)",
        )
        .execute(&mut *tx)
        .await?;

        // Version 2 added `consecutive_failures` to rss_feed (circuit breaker
        // bookkeeping); a fresh database already has the column from the
        // CREATE TABLE above, so this only matters for a cache file carried
        // over from version 1. Ignore the error when the column exists.
        if current_version < 2 {
            sqlx::query("ALTER TABLE rss_feed ADD COLUMN consecutive_failures INTEGER NOT NULL DEFAULT 0")
                .execute(&mut *tx)
                .await
                .ok();
        }

        tx.commit().await?;

        if current_version < Self::SCHEMA_VERSION {
            sqlx::query(&format!("PRAGMA user_version = {}", Self::SCHEMA_VERSION))
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_runs_migrations() {
        let store = Store::open(":memory:", &StoreConfig::default()).await.unwrap();
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rss_feed")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(row.0, 0);
    }
}
