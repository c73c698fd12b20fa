use std::sync::{Arc, Mutex, Weak};

use crate::matcher::Attributed;

use super::feed::Feed;

/// Download status of an enclosure, mirrored on the owning item's feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlStatus {
    Success,
    ToBeDownloaded,
    DuringDownload,
    DlError,
}

/// One article within a feed. Identity is `guid`.
#[derive(Debug, Clone)]
pub struct Item {
    pub guid: String,
    pub title: String,
    pub link: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub description_loaded: bool,
    pub content_mime_type: Option<String>,
    pub enclosure_url: Option<String>,
    pub enclosure_type: Option<String>,
    pub enclosure_description: Option<String>,
    pub enclosure_description_mime_type: Option<String>,
    pub pub_date: i64,
    /// Sorted, unique, ASCII-alphabetic flag sequence.
    pub flags: String,
    /// Most recently persisted flag set, for hook deltas.
    pub oldflags: String,
    pub feed_url: String,
    pub base: Option<String>,
    pub unread: bool,
    pub enqueued: bool,
    pub deleted: bool,
    /// Forces visibility of an already-read item matched by a search.
    pub override_unread: bool,
    pub index: usize,
    pub feedptr: Weak<Mutex<Feed>>,
}

impl Item {
    pub fn new(guid: String, feed_url: String) -> Self {
        Item {
            guid,
            title: String::new(),
            link: None,
            author: None,
            description: None,
            description_loaded: true,
            content_mime_type: None,
            enclosure_url: None,
            enclosure_type: None,
            enclosure_description: None,
            enclosure_description_mime_type: None,
            pub_date: 0,
            flags: String::new(),
            oldflags: String::new(),
            feed_url,
            base: None,
            unread: true,
            enqueued: false,
            deleted: false,
            override_unread: false,
            index: 0,
            feedptr: Weak::new(),
        }
    }

    /// Sets `flags` to the canonical form of `raw`: ASCII-alphabetic only,
    /// deduplicated preserving first-seen order, then ascending-sorted.
    /// Records the previous value into `oldflags` for hook deltas.
    pub fn set_flags(&mut self, raw: &str) {
        self.oldflags = self.flags.clone();
        self.flags = canonicalize_flags(raw);
    }

    /// Synthesizes a deterministic guid when the upstream feed omits one:
    /// `link + pub_date`, else `link`, else `title`.
    pub fn synthesize_guid(link: Option<&str>, pub_date_raw: Option<&str>, title: &str) -> String {
        match (link, pub_date_raw) {
            (Some(l), Some(d)) => format!("{l}{d}"),
            (Some(l), None) => l.to_string(),
            (None, _) => title.to_string(),
        }
    }

    pub fn age_days(&self, now: i64) -> i64 {
        ((now - self.pub_date).max(0)) / 86_400
    }
}

/// Deduplicate preserving first-seen order, keep ASCII-alphabetic chars only,
/// then sort ascending.
pub fn canonicalize_flags(raw: &str) -> String {
    let mut seen = std::collections::HashSet::new();
    let mut out: Vec<char> = Vec::new();
    for c in raw.chars() {
        if c.is_ascii_alphabetic() && seen.insert(c) {
            out.push(c);
        }
    }
    out.sort_unstable();
    out.into_iter().collect()
}

impl Attributed for Item {
    fn attribute_value(&self, name: &str) -> Option<String> {
        match name {
            "title" => Some(self.title.clone()),
            "link" => self.link.clone(),
            "author" => self.author.clone(),
            "guid" => Some(self.guid.clone()),
            "feedurl" => Some(self.feed_url.clone()),
            "flags" => Some(self.flags.clone()),
            "unread" => Some(if self.unread { "yes" } else { "no" }.into()),
            "deleted" => Some(if self.deleted { "yes" } else { "no" }.into()),
            "enqueued" => Some(if self.enqueued { "yes" } else { "no" }.into()),
            "age" => {
                let now = chrono::Utc::now().timestamp();
                Some(self.age_days(now).to_string())
            }
            "enclosure_url" => self.enclosure_url.clone(),
            "enclosure_type" => self.enclosure_type.clone(),
            _ => None,
        }
    }
}

pub type SharedItem = Arc<Mutex<Item>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guid_fallback_chain() {
        assert_eq!(
            Item::synthesize_guid(Some("https://ex/post"), Some("2023-07-31"), "t"),
            "https://ex/post2023-07-31"
        );
        assert_eq!(
            Item::synthesize_guid(Some("https://ex/post"), None, "t"),
            "https://ex/post"
        );
        assert_eq!(Item::synthesize_guid(None, None, "the title"), "the title");
    }

    #[test]
    fn flags_canonicalize() {
        assert_eq!(canonicalize_flags("zaZa1!b"), "Zabz");
    }
}
