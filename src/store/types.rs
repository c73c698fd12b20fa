use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("another instance of feedspar appears to be running against this cache file")]
    InstanceLocked,

    #[error("database migration failed: {0}")]
    Migration(String),

    #[error("database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let s = err.to_string().to_lowercase();
        if s.contains("database is locked")
            || s.contains("database table is locked")
            || s.contains("sqlite_busy")
            || s.contains("sqlite_locked")
            || s.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// Row shape used when loading feeds plus a lazily-populated item set.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedRow {
    pub rssurl: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub pub_date: i64,
    pub is_rtl: bool,
    pub etag: Option<String>,
    pub lastmodified: Option<i64>,
    pub consecutive_failures: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ItemRow {
    pub guid: String,
    pub title: String,
    pub author: Option<String>,
    pub url: Option<String>,
    pub feedurl: String,
    pub pub_date: i64,
    pub content: Option<String>,
    pub unread: bool,
    pub enclosure_url: Option<String>,
    pub enclosure_type: Option<String>,
    pub enqueued: bool,
    pub flags: String,
    pub base: Option<String>,
    pub content_mime_type: Option<String>,
    pub enclosure_description: Option<String>,
    pub enclosure_description_mime_type: Option<String>,
    pub deleted: bool,
}

/// A freshly-parsed item as handed to the store by the Reloader, prior to
/// merge-on-update.
#[derive(Debug, Clone)]
pub struct IncomingItem {
    pub guid: String,
    pub title: String,
    pub author: Option<String>,
    pub url: Option<String>,
    pub pub_date: i64,
    pub content: Option<String>,
    pub content_mime_type: Option<String>,
    pub enclosure_url: Option<String>,
    pub enclosure_type: Option<String>,
    pub enclosure_description: Option<String>,
    pub enclosure_description_mime_type: Option<String>,
    pub base: Option<String>,
}
