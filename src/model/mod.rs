//! In-memory feed/item model: lifecycle, ordering, tag/flag/unread invariants.

mod feed;
mod item;
mod sort;

pub use feed::{Feed, QUERY_FEED_PREFIX};
pub use item::{canonicalize_flags, DlStatus, Item, SharedItem};
pub use sort::{sort_items, SortDirection, SortMethod, SortStrategy};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub type SharedFeed = Arc<Mutex<Feed>>;

/// Holds all feeds (real and query) for the running process.
pub struct FeedModel {
    feeds: Vec<SharedFeed>,
    by_url: HashMap<String, SharedFeed>,
    sort: SortStrategy,
}

impl FeedModel {
    pub fn new(sort: SortStrategy) -> Self {
        FeedModel {
            feeds: Vec::new(),
            by_url: HashMap::new(),
            sort,
        }
    }

    pub fn feeds(&self) -> &[SharedFeed] {
        &self.feeds
    }

    pub fn feed_at(&self, i: usize) -> Option<&SharedFeed> {
        self.feeds.get(i)
    }

    pub fn feed_by_url(&self, url: &str) -> Option<SharedFeed> {
        self.by_url.get(url).cloned()
    }

    pub fn add_feed(&mut self, mut feed: Feed) -> SharedFeed {
        feed.index = self.feeds.len();
        let url = feed.rssurl.clone();
        let shared = Arc::new(Mutex::new(feed));
        self.feeds.push(shared.clone());
        self.by_url.insert(url, shared.clone());
        shared
    }

    pub fn replace_feed(&mut self, url: &str, new_feed: Feed) {
        if let Some(existing) = self.by_url.get(url) {
            *existing.lock().unwrap() = new_feed;
        }
    }

    pub fn unread_count_total(&self) -> usize {
        self.feeds
            .iter()
            .map(|f| f.lock().unwrap().unread_count())
            .sum()
    }

    pub fn set_sort(&mut self, sort: SortStrategy) {
        self.sort = sort;
        self.resort_all();
    }

    pub fn resort_all(&self) {
        for f in &self.feeds {
            let mut f = f.lock().unwrap();
            let mut items: Vec<_> = f.items().to_vec();
            sort_items(&mut items, self.sort);
            f.replace_items(items);
        }
    }

    pub fn sort(&self) -> SortStrategy {
        self.sort
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_feed_assigns_increasing_index() {
        let mut model = FeedModel::new(SortStrategy::new(SortMethod::Date, SortDirection::Desc));
        model.add_feed(Feed::new("a".into()));
        model.add_feed(Feed::new("b".into()));
        assert_eq!(model.feed_by_url("a").unwrap().lock().unwrap().index, 0);
        assert_eq!(model.feed_by_url("b").unwrap().lock().unwrap().index, 1);
    }

    #[test]
    fn unread_count_total_sums_across_feeds() {
        let mut model = FeedModel::new(SortStrategy::new(SortMethod::Date, SortDirection::Desc));
        let f1 = model.add_feed(Feed::new("a".into()));
        f1.lock().unwrap().add_item(Item::new("g1".into(), "a".into()));
        let f2 = model.add_feed(Feed::new("b".into()));
        f2.lock().unwrap().add_item(Item::new("g2".into(), "b".into()));
        f2.lock().unwrap().items()[0].lock().unwrap().unread = false;
        assert_eq!(model.unread_count_total(), 1);
    }
}
