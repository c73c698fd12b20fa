use anyhow::Result;

use crate::model::canonicalize_flags;

use super::schema::Store;
use super::types::IncomingItem;

impl Store {
    /// Atomically (per-feed transaction) merges freshly-fetched items into
    /// the store: existing guids get their mutable fields refreshed without
    /// clobbering `unread`, `flags`, `deleted`, `enqueued`; new guids are
    /// inserted with `unread = true`, `flags = ""`. Returns the count of
    /// guids that were genuinely new (inserted, not updated), for the
    /// caller's new-unread accounting.
    pub async fn external_merge(&self, feedurl: &str, incoming: &[IncomingItem]) -> Result<usize> {
        if incoming.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0usize;

        for item in incoming {
            let existing: Option<(i64,)> =
                sqlx::query_as("SELECT 1 FROM rss_item WHERE guid = ?")
                    .bind(&item.guid)
                    .fetch_optional(&mut *tx)
                    .await?;

            if existing.is_some() {
                sqlx::query(
                    "UPDATE rss_item SET title = ?, author = ?, url = ?, pubDate = ?, content = ?,
                     content_mime_type = ?, enclosure_url = ?, enclosure_type = ?,
                     enclosure_description = ?, enclosure_description_mime_type = ?, base = ?
                     WHERE guid = ?",
                )
                .bind(&item.title)
                .bind(&item.author)
                .bind(&item.url)
                .bind(item.pub_date)
                .bind(&item.content)
                .bind(&item.content_mime_type)
                .bind(&item.enclosure_url)
                .bind(&item.enclosure_type)
                .bind(&item.enclosure_description)
                .bind(&item.enclosure_description_mime_type)
                .bind(&item.base)
                .bind(&item.guid)
                .execute(&mut *tx)
                .await?;
            } else {
                sqlx::query(
                    "INSERT INTO rss_item
                     (guid, title, author, url, feedurl, pubDate, content, unread, enclosure_url,
                      enclosure_type, enqueued, flags, base, content_mime_type,
                      enclosure_description, enclosure_description_mime_type, deleted)
                     VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?, 0, '', ?, ?, ?, ?, 0)",
                )
                .bind(&item.guid)
                .bind(&item.title)
                .bind(&item.author)
                .bind(&item.url)
                .bind(feedurl)
                .bind(item.pub_date)
                .bind(&item.content)
                .bind(&item.enclosure_url)
                .bind(&item.enclosure_type)
                .bind(&item.base)
                .bind(&item.content_mime_type)
                .bind(&item.enclosure_description)
                .bind(&item.enclosure_description_mime_type)
                .execute(&mut *tx)
                .await?;
                inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn mark_item_read(&self, guid: &str, read: bool) -> Result<()> {
        sqlx::query("UPDATE rss_item SET unread = ? WHERE guid = ?")
            .bind(!read)
            .bind(guid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_items_read_by_guid(&self, guids: &[String]) -> Result<()> {
        if guids.is_empty() {
            return Ok(());
        }
        let mut builder: sqlx::QueryBuilder<sqlx::Sqlite> =
            sqlx::QueryBuilder::new("UPDATE rss_item SET unread = 0 WHERE guid IN (");
        let mut sep = builder.separated(", ");
        for g in guids {
            sep.push_bind(g);
        }
        sep.push_unseparated(")");
        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    pub async fn mark_all_read(&self, feedurl: &str) -> Result<()> {
        sqlx::query("UPDATE rss_item SET unread = 0 WHERE feedurl = ?")
            .bind(feedurl)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Canonicalizes `raw` (see `model::canonicalize_flags`), stores it as
    /// the item's flags, and moves the previous value into `oldflags`-style
    /// bookkeeping by returning both to the caller for hook dispatch.
    pub async fn update_flags(&self, guid: &str, raw: &str) -> Result<(String, String)> {
        let row: (String,) = sqlx::query_as("SELECT flags FROM rss_item WHERE guid = ?")
            .bind(guid)
            .fetch_one(&self.pool)
            .await?;
        let old = row.0;
        let new = canonicalize_flags(raw);
        sqlx::query("UPDATE rss_item SET flags = ? WHERE guid = ?")
            .bind(&new)
            .bind(guid)
            .execute(&self.pool)
            .await?;
        Ok((old, new))
    }

    pub async fn mark_item_deleted(&self, guid: &str, deleted: bool) -> Result<()> {
        sqlx::query("UPDATE rss_item SET deleted = ? WHERE guid = ?")
            .bind(deleted)
            .bind(guid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_rssitem_unread_and_enqueued(
        &self,
        guid: &str,
        unread: bool,
        enqueued: bool,
    ) -> Result<()> {
        sqlx::query("UPDATE rss_item SET unread = ?, enqueued = ? WHERE guid = ?")
            .bind(unread)
            .bind(enqueued)
            .bind(guid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Lazily loads the (potentially large) description blob for an item
    /// that was loaded without it.
    pub async fn fetch_description(&self, guid: &str) -> Result<Option<String>> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT content FROM rss_item WHERE guid = ?")
                .bind(guid)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.and_then(|r| r.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;

    fn sample(guid: &str, title: &str) -> IncomingItem {
        IncomingItem {
            guid: guid.to_string(),
            title: title.to_string(),
            author: None,
            url: None,
            pub_date: 0,
            content: None,
            content_mime_type: None,
            enclosure_url: None,
            enclosure_type: None,
            enclosure_description: None,
            enclosure_description_mime_type: None,
            base: None,
        }
    }

    #[tokio::test]
    async fn merge_preserves_read_state_and_flags() {
        let store = Store::open(":memory:", &StoreConfig::default()).await.unwrap();
        store
            .load_feeds(&["https://a/feed".to_string()], 0)
            .await
            .unwrap();
        store.external_merge("https://a/feed", &[sample("g1", "orig")]).await.unwrap();
        store.mark_item_read("g1", true).await.unwrap();
        store.update_flags("g1", "zaA").await.unwrap();

        store.external_merge("https://a/feed", &[sample("g1", "X")]).await.unwrap();

        let row: (String, bool, String) =
            sqlx::query_as("SELECT title, unread, flags FROM rss_item WHERE guid = 'g1'")
                .fetch_one(&store.pool)
                .await
                .unwrap();
        assert_eq!(row.0, "X");
        assert!(!row.1);
        assert_eq!(row.2, "Aaz");
    }

    #[tokio::test]
    async fn new_guid_inserts_as_unread_with_no_flags() {
        let store = Store::open(":memory:", &StoreConfig::default()).await.unwrap();
        store.load_feeds(&["https://a/feed".to_string()], 0).await.unwrap();
        store.external_merge("https://a/feed", &[sample("g2", "new")]).await.unwrap();
        let row: (bool, String) =
            sqlx::query_as("SELECT unread, flags FROM rss_item WHERE guid = 'g2'")
                .fetch_one(&store.pool)
                .await
                .unwrap();
        assert!(row.0);
        assert_eq!(row.1, "");
    }
}
