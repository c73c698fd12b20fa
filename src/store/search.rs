//! Substring search over stored titles/descriptions. No fulltext indexing.

use anyhow::Result;

use crate::model::Item;

use super::feeds::item_row_to_item;
use super::schema::Store;
use super::types::ItemRow;

/// Maximum accepted query length; oversized queries are rejected rather
/// than silently truncated.
pub const MAX_SEARCH_QUERY_LENGTH: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search query exceeds {MAX_SEARCH_QUERY_LENGTH} characters")]
    QueryTooLong,
}

impl Store {
    /// Case-insensitive substring search over title and description,
    /// optionally constrained to one feed, newest-first.
    pub async fn search(&self, query: &str, feedurl: Option<&str>) -> Result<Vec<Item>> {
        if query.chars().count() > MAX_SEARCH_QUERY_LENGTH {
            return Err(SearchError::QueryTooLong.into());
        }
        let pattern = format!("%{}%", escape_like(query));

        let rows: Vec<ItemRow> = if let Some(feedurl) = feedurl {
            sqlx::query_as(
                "SELECT guid, title, author, url, feedurl, pubDate AS pub_date, content, unread,
                        enclosure_url, enclosure_type, enqueued, flags, base,
                        content_mime_type, enclosure_description, enclosure_description_mime_type, deleted
                 FROM rss_item
                 WHERE deleted = 0 AND feedurl = ?
                   AND (title LIKE ? ESCAPE '\\' OR content LIKE ? ESCAPE '\\')
                 ORDER BY pubDate DESC",
            )
            .bind(feedurl)
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as(
                "SELECT guid, title, author, url, feedurl, pubDate AS pub_date, content, unread,
                        enclosure_url, enclosure_type, enqueued, flags, base,
                        content_mime_type, enclosure_description, enclosure_description_mime_type, deleted
                 FROM rss_item
                 WHERE deleted = 0
                   AND (title LIKE ? ESCAPE '\\' OR content LIKE ? ESCAPE '\\')
                 ORDER BY pubDate DESC",
            )
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(&self.pool)
            .await?
        };

        Ok(rows.into_iter().map(item_row_to_item).collect())
    }
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::IncomingItem;
    use crate::store::StoreConfig;

    #[tokio::test]
    async fn finds_case_insensitive_substring_in_title() {
        let store = Store::open(":memory:", &StoreConfig::default()).await.unwrap();
        store.load_feeds(&["https://a/feed".to_string()], 0).await.unwrap();
        store
            .external_merge(
                "https://a/feed",
                &[IncomingItem {
                    guid: "g1".into(),
                    title: "Rust Is Great".into(),
                    author: None,
                    url: None,
                    pub_date: 1,
                    content: None,
                    content_mime_type: None,
                    enclosure_url: None,
                    enclosure_type: None,
                    enclosure_description: None,
                    enclosure_description_mime_type: None,
                    base: None,
                }],
            )
            .await
            .unwrap();

        let results = store.search("rust", None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].guid, "g1");
    }

    #[tokio::test]
    async fn oversized_query_is_rejected() {
        let store = Store::open(":memory:", &StoreConfig::default()).await.unwrap();
        let long = "a".repeat(MAX_SEARCH_QUERY_LENGTH + 1);
        assert!(store.search(&long, None).await.is_err());
    }
}
