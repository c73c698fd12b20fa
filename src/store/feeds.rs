use anyhow::Result;

use crate::model::{DlStatus, Feed, Item};

use super::schema::Store;
use super::types::{FeedRow, ItemRow};

impl Store {
    /// For each URL in `urls`, loads (or creates, if absent) the feed row
    /// and its items: the N newest (by pubDate desc, guid desc tiebreak) if
    /// `max_items > 0`, else all non-deleted items.
    pub async fn load_feeds(&self, urls: &[String], max_items: i64) -> Result<Vec<Feed>> {
        let mut feeds = Vec::with_capacity(urls.len());
        for (i, url) in urls.iter().enumerate() {
            let row: Option<FeedRow> = sqlx::query_as(
                "SELECT rssurl, title, description, link, pub_date, is_rtl, etag, lastmodified, consecutive_failures
                 FROM rss_feed WHERE rssurl = ?",
            )
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

            let mut feed = match row {
                Some(r) => Feed::from_stored_metadata(
                    r.rssurl,
                    r.title,
                    r.description,
                    r.link,
                    r.pub_date,
                    r.is_rtl,
                    r.etag,
                    r.lastmodified,
                    r.consecutive_failures,
                ),
                None => {
                    sqlx::query("INSERT INTO rss_feed (rssurl, url) VALUES (?, ?)")
                        .bind(url)
                        .bind(url)
                        .execute(&self.pool)
                        .await?;
                    Feed::new(url.clone())
                }
            };
            feed.index = i;
            feed.status = DlStatus::ToBeDownloaded;

            let item_rows = self.load_items_for_feed(url, max_items).await?;
            for row in item_rows {
                feed.add_item(item_row_to_item(row));
            }
            feeds.push(feed);
        }
        Ok(feeds)
    }

    async fn load_items_for_feed(&self, feedurl: &str, max_items: i64) -> Result<Vec<ItemRow>> {
        let rows: Vec<ItemRow> = if max_items > 0 {
            sqlx::query_as(
                "SELECT guid, title, author, url, feedurl, pubDate AS pub_date, content, unread,
                        enclosure_url, enclosure_type, enqueued, flags, base,
                        content_mime_type, enclosure_description, enclosure_description_mime_type, deleted
                 FROM rss_item WHERE feedurl = ? AND deleted = 0
                 ORDER BY pubDate DESC, guid DESC LIMIT ?",
            )
            .bind(feedurl)
            .bind(max_items)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as(
                "SELECT guid, title, author, url, feedurl, pubDate AS pub_date, content, unread,
                        enclosure_url, enclosure_type, enqueued, flags, base,
                        content_mime_type, enclosure_description, enclosure_description_mime_type, deleted
                 FROM rss_item WHERE feedurl = ? AND deleted = 0
                 ORDER BY pubDate DESC, guid DESC",
            )
            .bind(feedurl)
            .fetch_all(&self.pool)
            .await?
        };
        Ok(rows)
    }

    /// Sets or clears a feed's conditional-GET metadata after a fetch.
    pub async fn set_feed_conditional_get(
        &self,
        rssurl: &str,
        etag: Option<&str>,
        lastmodified: Option<i64>,
    ) -> Result<()> {
        sqlx::query("UPDATE rss_feed SET etag = ?, lastmodified = ? WHERE rssurl = ?")
            .bind(etag)
            .bind(lastmodified)
            .bind(rssurl)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub const CIRCUIT_BREAKER_THRESHOLD: i64 = 5;

    pub async fn increment_feed_failures(&self, rssurl: &str) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "UPDATE rss_feed SET consecutive_failures = consecutive_failures + 1
             WHERE rssurl = ? RETURNING consecutive_failures",
        )
        .bind(rssurl)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    pub async fn reset_feed_failures(&self, rssurl: &str) -> Result<()> {
        sqlx::query("UPDATE rss_feed SET consecutive_failures = 0 WHERE rssurl = ?")
            .bind(rssurl)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Deletes items and feeds whose URL is not in `active_feed_urls`.
    pub async fn cleanup_cache(&self, active_feed_urls: &[String]) -> Result<()> {
        if active_feed_urls.is_empty() {
            sqlx::query("DELETE FROM rss_item").execute(&self.pool).await?;
            sqlx::query("DELETE FROM rss_feed").execute(&self.pool).await?;
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;

        let mut builder: sqlx::QueryBuilder<sqlx::Sqlite> =
            sqlx::QueryBuilder::new("DELETE FROM rss_item WHERE feedurl NOT IN (");
        let mut sep = builder.separated(", ");
        for u in active_feed_urls {
            sep.push_bind(u);
        }
        sep.push_unseparated(")");
        builder.build().execute(&mut *tx).await?;

        let mut builder: sqlx::QueryBuilder<sqlx::Sqlite> =
            sqlx::QueryBuilder::new("DELETE FROM rss_feed WHERE rssurl NOT IN (");
        let mut sep = builder.separated(", ");
        for u in active_feed_urls {
            sep.push_bind(u);
        }
        sep.push_unseparated(")");
        builder.build().execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn vacuum(&self) -> Result<()> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }
}

pub(crate) fn item_row_to_item(row: ItemRow) -> Item {
    Item {
        guid: row.guid,
        title: row.title,
        link: row.url,
        author: row.author,
        description: row.content.clone(),
        description_loaded: true,
        content_mime_type: row.content_mime_type,
        enclosure_url: row.enclosure_url,
        enclosure_type: row.enclosure_type,
        enclosure_description: row.enclosure_description,
        enclosure_description_mime_type: row.enclosure_description_mime_type,
        pub_date: row.pub_date,
        flags: row.flags.clone(),
        oldflags: row.flags,
        feed_url: row.feedurl,
        base: row.base,
        unread: row.unread,
        enqueued: row.enqueued,
        deleted: row.deleted,
        override_unread: false,
        index: 0,
        feedptr: std::sync::Weak::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;

    #[tokio::test]
    async fn load_feeds_creates_missing_rows() {
        let store = Store::open(":memory:", &StoreConfig::default()).await.unwrap();
        let urls = vec!["https://a/feed".to_string()];
        let feeds = store.load_feeds(&urls, 0).await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].rssurl, "https://a/feed");
        assert_eq!(feeds[0].items().len(), 0);
    }

    #[tokio::test]
    async fn cleanup_cache_drops_inactive_feeds_and_items() {
        let store = Store::open(":memory:", &StoreConfig::default()).await.unwrap();
        store.load_feeds(&["https://a/feed".to_string(), "https://b/feed".to_string()], 0)
            .await
            .unwrap();
        store.cleanup_cache(&["https://a/feed".to_string()]).await.unwrap();
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rss_feed")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(row.0, 1);
    }
}
