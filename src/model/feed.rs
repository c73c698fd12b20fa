use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::matcher::Attributed;

use super::item::{DlStatus, Item, SharedItem};

pub const QUERY_FEED_PREFIX: &str = "query:";

/// A normalized feed. Identity is `rssurl`.
#[derive(Debug)]
pub struct Feed {
    pub rssurl: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub pub_date: i64,
    /// Ordered user-assigned tags; first non-internal tag is the display tag.
    pub tags: Vec<String>,
    /// Position in the user's configured URL list.
    pub index: usize,
    pub status: DlStatus,
    pub is_rtl: bool,
    pub etag: Option<String>,
    pub lastmodified: Option<i64>,
    pub consecutive_failures: i64,
    items: Vec<SharedItem>,
    by_guid: HashMap<String, SharedItem>,
}

impl Feed {
    pub fn new(rssurl: String) -> Self {
        Feed {
            rssurl,
            title: String::new(),
            description: String::new(),
            link: String::new(),
            pub_date: 0,
            tags: Vec::new(),
            index: 0,
            status: DlStatus::ToBeDownloaded,
            is_rtl: false,
            etag: None,
            lastmodified: None,
            consecutive_failures: 0,
            items: Vec::new(),
            by_guid: HashMap::new(),
        }
    }

    /// Rehydrates a feed's persisted metadata (everything but its items),
    /// used by the store when loading a previously-seen feed row.
    #[allow(clippy::too_many_arguments)]
    pub fn from_stored_metadata(
        rssurl: String,
        title: String,
        description: String,
        link: String,
        pub_date: i64,
        is_rtl: bool,
        etag: Option<String>,
        lastmodified: Option<i64>,
        consecutive_failures: i64,
    ) -> Self {
        let mut feed = Feed::new(rssurl);
        feed.title = title;
        feed.description = description;
        feed.link = link;
        feed.pub_date = pub_date;
        feed.is_rtl = is_rtl;
        feed.etag = etag;
        feed.lastmodified = lastmodified;
        feed.consecutive_failures = consecutive_failures;
        feed
    }

    pub fn is_query_feed(&self) -> bool {
        self.rssurl.starts_with(QUERY_FEED_PREFIX)
    }

    /// First tag beginning with `~`, sans the sigil; replaces the display title.
    pub fn display_title(&self) -> &str {
        for t in &self.tags {
            if let Some(stripped) = t.strip_prefix('~') {
                return stripped;
            }
        }
        &self.title
    }

    pub fn is_hidden(&self) -> bool {
        self.tags.iter().any(|t| t.starts_with('!'))
    }

    pub fn items(&self) -> &[SharedItem] {
        &self.items
    }

    pub fn item_by_guid(&self, guid: &str) -> Option<SharedItem> {
        self.by_guid.get(guid).cloned()
    }

    /// Inserts an owned item, indexing it by guid. Invariant (e): items are
    /// always indexable by guid.
    pub fn add_item(&mut self, item: Item) -> SharedItem {
        let guid = item.guid.clone();
        let shared = Arc::new(Mutex::new(item));
        self.items.push(shared.clone());
        self.by_guid.insert(guid, shared.clone());
        shared
    }

    pub fn wire_feedptr(self_arc: &Arc<Mutex<Feed>>, item: &SharedItem) {
        item.lock().unwrap().feedptr = Arc::downgrade(self_arc);
    }

    pub fn unread_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.lock().unwrap().unread)
            .count()
    }

    pub fn mark_all_items_read(&self) {
        for item in &self.items {
            item.lock().unwrap().unread = false;
        }
    }

    /// Drops items marked `deleted` from the in-memory list and guid index.
    pub fn purge_deleted_items(&mut self) {
        self.items.retain(|i| {
            let locked = i.lock().unwrap();
            if locked.deleted {
                drop(locked);
                false
            } else {
                true
            }
        });
        self.by_guid.retain(|_, v| !v.lock().unwrap().deleted);
    }

    /// Frees large description bodies in memory (lazy-refetched via the store).
    pub fn unload(&self) {
        for item in &self.items {
            let mut locked = item.lock().unwrap();
            locked.description = None;
            locked.description_loaded = false;
        }
    }

    pub fn replace_items(&mut self, items: Vec<SharedItem>) {
        self.by_guid.clear();
        for it in &items {
            let guid = it.lock().unwrap().guid.clone();
            self.by_guid.insert(guid, it.clone());
        }
        self.items = items;
    }
}

impl Attributed for Feed {
    fn attribute_value(&self, name: &str) -> Option<String> {
        match name {
            "title" => Some(self.title.clone()),
            "rssurl" | "feedurl" => Some(self.rssurl.clone()),
            "link" => Some(self.link.clone()),
            "tags" => Some(self.tags.join(" ")),
            "unread_count" => Some(self.unread_count().to_string()),
            "latest_article_age" => {
                let now = chrono::Utc::now().timestamp();
                let newest = self
                    .items
                    .iter()
                    .map(|i| i.lock().unwrap().pub_date)
                    .max()
                    .unwrap_or(0);
                Some((((now - newest).max(0)) / 86_400).to_string())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_feed_detection() {
        let f = Feed::new("query:Recent:unread = \"yes\"".into());
        assert!(f.is_query_feed());
        let f2 = Feed::new("https://example.com/feed.xml".into());
        assert!(!f2.is_query_feed());
    }

    #[test]
    fn display_title_uses_tilde_tag() {
        let mut f = Feed::new("u".into());
        f.title = "Raw Title".into();
        f.tags.push("~Pretty".into());
        assert_eq!(f.display_title(), "Pretty");
    }

    #[test]
    fn hidden_tag_detection() {
        let mut f = Feed::new("u".into());
        f.tags.push("!hidden".into());
        assert!(f.is_hidden());
    }

    #[test]
    fn guid_index_stays_consistent() {
        let mut f = Feed::new("u".into());
        f.add_item(Item::new("g1".into(), "u".into()));
        assert!(f.item_by_guid("g1").is_some());
        assert!(f.item_by_guid("missing").is_none());
    }

    #[test]
    fn purge_deleted_drops_from_both_list_and_index() {
        let mut f = Feed::new("u".into());
        f.add_item(Item::new("g1".into(), "u".into()));
        f.items[0].lock().unwrap().deleted = true;
        f.purge_deleted_items();
        assert_eq!(f.items().len(), 0);
        assert!(f.item_by_guid("g1").is_none());
    }
}
