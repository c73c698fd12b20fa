//! Builds and maintains the podcast download-queue file.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};

use crate::model::{Feed, Item};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueStatus {
    QueuedSuccessfully,
    UrlQueuedAlready,
    OutputFilenameUsedAlready,
    QueueFileOpenError,
}

#[derive(Debug, Clone)]
pub struct EnqueueResult {
    pub status: EnqueueStatus,
    pub extra_info: String,
}

pub struct QueueManager {
    queue_file: PathBuf,
    download_path: String,
    filename_format: String,
}

impl QueueManager {
    pub fn new(
        queue_file: impl Into<PathBuf>,
        download_path: impl Into<String>,
        filename_format: impl Into<String>,
    ) -> Self {
        QueueManager {
            queue_file: queue_file.into(),
            download_path: download_path.into(),
            filename_format: filename_format.into(),
        }
    }

    /// Adds a single item's enclosure to the queue file.
    pub fn enqueue_url(&self, item: &Item, feed: &Feed) -> EnqueueResult {
        let url = match &item.enclosure_url {
            Some(u) => u.clone(),
            None => {
                return EnqueueResult {
                    status: EnqueueStatus::QueueFileOpenError,
                    extra_info: "item has no enclosure".into(),
                }
            }
        };
        let filename = self.generate_enqueue_filename(item, feed);

        if let Ok(f) = std::fs::File::open(&self.queue_file) {
            for line in std::io::BufReader::new(f).lines().map_while(Result::ok) {
                if line.trim().is_empty() {
                    continue;
                }
                if let Some((existing_url, existing_name)) = parse_queue_line(&line) {
                    if existing_url == url {
                        return EnqueueResult {
                            status: EnqueueStatus::UrlQueuedAlready,
                            extra_info: url,
                        };
                    }
                    if existing_name == filename {
                        return EnqueueResult {
                            status: EnqueueStatus::OutputFilenameUsedAlready,
                            extra_info: filename,
                        };
                    }
                }
            }
        }

        let mut f = match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.queue_file)
        {
            Ok(f) => f,
            Err(_) => {
                return EnqueueResult {
                    status: EnqueueStatus::QueueFileOpenError,
                    extra_info: self.queue_file.display().to_string(),
                }
            }
        };

        if writeln!(f, "{} \"{}\"", url, filename).is_err() {
            return EnqueueResult {
                status: EnqueueStatus::QueueFileOpenError,
                extra_info: self.queue_file.display().to_string(),
            };
        }

        EnqueueResult {
            status: EnqueueStatus::QueuedSuccessfully,
            extra_info: String::new(),
        }
    }

    /// Enqueues every non-enqueued HTTP(S) enclosure in `feed`. A hard error
    /// (file-open / filename collision) short-circuits and is returned; a
    /// soft outcome (already queued) is skipped and iteration continues.
    pub fn autoenqueue(&self, feed: &Feed) -> EnqueueResult {
        for item in feed.items() {
            let locked = item.lock().unwrap();
            if locked.enqueued {
                continue;
            }
            let Some(url) = locked.enclosure_url.clone() else {
                continue;
            };
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                continue;
            }
            let result = self.enqueue_url(&locked, feed);
            match result.status {
                EnqueueStatus::QueuedSuccessfully | EnqueueStatus::UrlQueuedAlready => continue,
                EnqueueStatus::QueueFileOpenError | EnqueueStatus::OutputFilenameUsedAlready => {
                    return result
                }
            }
        }
        EnqueueResult {
            status: EnqueueStatus::QueuedSuccessfully,
            extra_info: String::new(),
        }
    }

    fn generate_enqueue_filename(&self, item: &Item, feed: &Feed) -> String {
        let url = item.enclosure_url.as_deref().unwrap_or("");
        let base = basename(url);
        let extension = base.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
        let hostname = hostname_from_url(url);
        let dt = Utc.timestamp_opt(item.pub_date, 0).single().unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap());

        let feed_title = if feed.rssurl != item.feed_url {
            item.feedptr
                .upgrade()
                .map(|f| f.lock().unwrap().title.clone())
                .unwrap_or_else(|| feed.title.clone())
        } else {
            feed.title.clone()
        };

        let mut dlpath = self.download_path.clone();
        if !dlpath.ends_with('/') {
            dlpath.push('/');
        }

        let mut out = String::new();
        let mut chars = self.filename_format.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '%' && c != '{' {
                out.push(c);
                continue;
            }
            // accept either `%x` or `{x}` placeholder syntax
            let (spec, consumed_brace) = if c == '{' {
                let s = chars.next();
                if chars.peek() == Some(&'}') {
                    chars.next();
                }
                (s, true)
            } else {
                (chars.next(), false)
            };
            let _ = consumed_brace;
            match spec {
                Some('n') => out.push_str(&feed.title.replace('/', "_")),
                Some('h') => out.push_str(&hostname),
                Some('u') => out.push_str(&base),
                Some('F') => out.push_str(&dt.format("%Y-%m-%d").to_string()),
                Some('m') => out.push_str(&dt.format("%m").to_string()),
                Some('b') => out.push_str(&dt.format("%b").to_string()),
                Some('d') => out.push_str(&dt.format("%d").to_string()),
                Some('H') => out.push_str(&dt.format("%H").to_string()),
                Some('M') => out.push_str(&dt.format("%M").to_string()),
                Some('S') => out.push_str(&dt.format("%S").to_string()),
                Some('y') => out.push_str(&dt.format("%y").to_string()),
                Some('Y') => out.push_str(&dt.format("%Y").to_string()),
                Some('t') => out.push_str(&item.title.replace('/', "_")),
                Some('e') => out.push_str(&extension.replace('/', "_")),
                Some('N') => out.push_str(&feed_title.replace('/', "_")),
                Some(other) => out.push(other),
                None => {}
            }
        }

        format!("{dlpath}{out}")
    }
}

fn basename(url: &str) -> String {
    let path = url.split('?').next().unwrap_or(url);
    Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn hostname_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

/// Parses `<url> "<path>"` lines, matching the reference's quoted-field
/// tokenizer closely enough for dedup comparisons.
fn parse_queue_line(line: &str) -> Option<(String, String)> {
    let mut parts = line.splitn(2, ' ');
    let url = parts.next()?.to_string();
    let rest = parts.next()?.trim();
    let name = rest.trim_matches('"').to_string();
    Some((url, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    struct TempPath(PathBuf);

    impl TempPath {
        fn new() -> Self {
            let n = COUNTER.fetch_add(1, Ordering::Relaxed);
            let mut path = std::env::temp_dir();
            path.push(format!("feedspar-queue-test-{}-{}", std::process::id(), n));
            let _ = std::fs::remove_file(&path);
            TempPath(path)
        }
    }

    impl Drop for TempPath {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn duplicate_url_is_not_appended_again() {
        let tmp = TempPath::new();
        std::fs::write(&tmp.0, "https://ex/p1.mp3 \"/d/p1.mp3\"\n").unwrap();
        let qm = QueueManager::new(&tmp.0, "/d", "{u}");
        let feed = Feed::new("https://ex/feed".into());
        let mut item = Item::new("g1".into(), "https://ex/feed".into());
        item.enclosure_url = Some("https://ex/p1.mp3".into());
        let result = qm.enqueue_url(&item, &feed);
        assert_eq!(result.status, EnqueueStatus::UrlQueuedAlready);
        let contents = std::fs::read_to_string(&tmp.0).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn missing_queue_file_is_created() {
        let tmp = TempPath::new();
        let qm = QueueManager::new(&tmp.0, "/d", "{u}");
        let feed = Feed::new("https://ex/feed".into());
        let mut item = Item::new("g1".into(), "https://ex/feed".into());
        item.enclosure_url = Some("https://ex/new.mp3".into());
        let result = qm.enqueue_url(&item, &feed);
        assert_eq!(result.status, EnqueueStatus::QueuedSuccessfully);
        assert!(tmp.0.exists());
    }
}
