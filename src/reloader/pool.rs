use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use crate::hooks::HookRunner;
use crate::ignores::Ignores;
use crate::model::{DlStatus, FeedModel};
use crate::store::{IncomingItem, Store};

use super::fetch::{FetchOutcome, Fetcher};

/// Status update emitted per feed during a reload cycle.
#[derive(Debug, Clone)]
pub enum ReloadStatus {
    Downloading { url: String },
    Success { url: String, new_items: usize },
    Error { url: String, message: String },
    CycleComplete { new_unread: usize },
}

/// Parallel fetcher: pool-based and range-based modes (spec §4.5).
pub struct Reloader {
    store: Store,
    fetcher: Arc<dyn Fetcher>,
    ignores: Arc<Ignores>,
    hooks: Arc<HookRunner>,
    reload_threads: usize,
    /// Gates simultaneous full-reload cycles: a second concurrent
    /// `reload_all` returns immediately instead of blocking.
    guard: AsyncMutex<()>,
    cancel: AtomicBool,
}

impl Reloader {
    pub fn new(
        store: Store,
        fetcher: Arc<dyn Fetcher>,
        ignores: Arc<Ignores>,
        hooks: Arc<HookRunner>,
        reload_threads: usize,
    ) -> Self {
        Reloader {
            store,
            fetcher,
            ignores,
            hooks,
            reload_threads: reload_threads.max(1),
            guard: AsyncMutex::new(()),
            cancel: AtomicBool::new(false),
        }
    }

    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Partitions the model's URL list into equal contiguous ranges and
    /// fetches `N = min(reload_threads, feed_count)` of them concurrently,
    /// mirroring the teacher's `stream::iter(...).buffer_unordered(n)`
    /// parallel fetcher generalized to a configurable worker count. A
    /// second concurrent invocation returns immediately without reloading.
    pub async fn reload_all(
        &self,
        model: &AsyncMutex<FeedModel>,
        unattended: bool,
        status_tx: mpsc::Sender<ReloadStatus>,
    ) {
        let guard = match self.guard.try_lock() {
            Ok(g) => g,
            Err(_) => return,
        };

        let total = model.lock().await.feeds().len();
        if total == 0 {
            let _ = status_tx.send(ReloadStatus::CycleComplete { new_unread: 0 }).await;
            return;
        }

        let n_workers = self.reload_threads.min(total).max(1);
        let chunk = total.div_ceil(n_workers);

        let mut ranges = Vec::new();
        let mut start = 0;
        while start < total {
            let end = (start + chunk).min(total);
            ranges.push((start, end));
            start = end;
        }

        let new_unread_total: usize = stream::iter(ranges)
            .map(|(start, end)| {
                let status_tx = status_tx.clone();
                async move {
                    if self.cancelled() {
                        return 0;
                    }
                    self.reload_range(model, start, end, total, unattended, &status_tx)
                        .await
                }
            })
            .buffer_unordered(n_workers)
            .collect::<Vec<usize>>()
            .await
            .into_iter()
            .sum();

        let _ = status_tx
            .send(ReloadStatus::CycleComplete {
                new_unread: new_unread_total,
            })
            .await;
        drop(guard);
    }

    /// Serial reload of the half-open range `[start, end)` of the model's
    /// URL list. Returns the count of newly-unread items seen, for the
    /// caller's notify-program decision.
    pub async fn reload_range(
        &self,
        model: &AsyncMutex<FeedModel>,
        start: usize,
        end: usize,
        _total: usize,
        unattended: bool,
        status_tx: &mpsc::Sender<ReloadStatus>,
    ) -> usize {
        let mut new_unread = 0usize;

        for i in start..end {
            if self.cancelled() {
                break;
            }

            let shared_feed = match model.lock().await.feed_at(i).cloned() {
                Some(f) => f,
                None => continue,
            };

            let (url, etag, lastmodified, skip_circuit_broken) = {
                let f = shared_feed.lock().unwrap();
                (
                    f.rssurl.clone(),
                    f.etag.clone(),
                    f.lastmodified,
                    f.consecutive_failures >= Store::CIRCUIT_BREAKER_THRESHOLD,
                )
            };

            if skip_circuit_broken {
                continue;
            }

            shared_feed.lock().unwrap().status = DlStatus::DuringDownload;
            let _ = status_tx
                .send(ReloadStatus::Downloading { url: url.clone() })
                .await;

            self.hooks.run_pre_reload(&url, unattended).await;

            match self.fetcher.fetch(&url, etag.as_deref(), lastmodified).await {
                Ok(FetchOutcome::NotModified) => {
                    shared_feed.lock().unwrap().status = DlStatus::Success;
                    let _ = self.store.reset_feed_failures(&url).await;
                }
                Ok(FetchOutcome::Fetched {
                    etag,
                    lastmodified,
                    items,
                }) => {
                    let kept: Vec<_> = items
                        .into_iter()
                        .filter(|item| !self.ignores.matches(&url, item))
                        .collect();

                    let incoming: Vec<IncomingItem> = kept
                        .iter()
                        .map(|item| IncomingItem {
                            guid: item.guid.clone(),
                            title: item.title.clone(),
                            author: item.author.clone(),
                            url: item.link.clone(),
                            pub_date: item.pub_date,
                            content: item.description.clone(),
                            content_mime_type: item.content_mime_type.clone(),
                            enclosure_url: item.enclosure_url.clone(),
                            enclosure_type: item.enclosure_type.clone(),
                            enclosure_description: item.enclosure_description.clone(),
                            enclosure_description_mime_type: item
                                .enclosure_description_mime_type
                                .clone(),
                            base: item.base.clone(),
                        })
                        .collect();

                    match self.store.external_merge(&url, &incoming).await {
                        Ok(newly_inserted) => {
                            let _ = self.store.set_feed_conditional_get(&url, etag.as_deref(), lastmodified).await;
                            let _ = self.store.reset_feed_failures(&url).await;

                            if self.ignores.resets_unread_on_update(&url) {
                                let guids: Vec<String> =
                                    incoming.iter().map(|i| i.guid.clone()).collect();
                                for g in &guids {
                                    let _ = self.store.update_rssitem_unread_and_enqueued(g, true, false).await;
                                }
                            }

                            new_unread += newly_inserted;
                            shared_feed.lock().unwrap().status = DlStatus::Success;
                            let _ = status_tx
                                .send(ReloadStatus::Success {
                                    url: url.clone(),
                                    new_items: newly_inserted,
                                })
                                .await;
                        }
                        Err(e) => {
                            shared_feed.lock().unwrap().status = DlStatus::DlError;
                            let _ = self.store.increment_feed_failures(&url).await;
                            let _ = status_tx
                                .send(ReloadStatus::Error {
                                    url: url.clone(),
                                    message: e.to_string(),
                                })
                                .await;
                        }
                    }
                }
                Err(e) => {
                    shared_feed.lock().unwrap().status = DlStatus::DlError;
                    let _ = self.store.increment_feed_failures(&url).await;
                    let _ = status_tx
                        .send(ReloadStatus::Error {
                            url: url.clone(),
                            message: e.to_string(),
                        })
                        .await;
                }
            }

            self.hooks.run_post_reload(&url, unattended).await;
        }

        new_unread
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookRunner;
    use crate::model::{Feed, SortDirection, SortMethod, SortStrategy};
    use crate::reloader::fetch::mock::MockFetcher;
    use crate::store::StoreConfig;

    async fn build_store() -> Store {
        Store::open(":memory:", &StoreConfig::default()).await.unwrap()
    }

    #[tokio::test]
    async fn second_concurrent_reload_all_is_a_no_op() {
        let store = build_store().await;
        store.load_feeds(&["https://a/feed".to_string()], 0).await.unwrap();

        let mut model = FeedModel::new(SortStrategy::new(SortMethod::Date, SortDirection::Desc));
        model.add_feed(Feed::new("https://a/feed".into()));
        let model = AsyncMutex::new(model);

        let fetcher = Arc::new(MockFetcher::new());
        let reloader = Reloader::new(
            store,
            fetcher,
            Arc::new(Ignores::new()),
            Arc::new(HookRunner::new(None, None, None)),
            1,
        );

        let (tx1, _rx1) = mpsc::channel(16);
        let held = reloader.guard.lock().await;
        let (tx2, mut rx2) = mpsc::channel(16);
        reloader.reload_all(&model, true, tx2).await;
        drop(held);
        drop(tx1);

        assert!(rx2.recv().await.is_none(), "no status emitted when guard held");
    }

    #[tokio::test]
    async fn reload_all_counts_only_genuinely_new_items() {
        let store = build_store().await;
        store
            .load_feeds(&["https://a/feed".to_string(), "https://b/feed".to_string()], 0)
            .await
            .unwrap();

        let mut model = FeedModel::new(SortStrategy::new(SortMethod::Date, SortDirection::Desc));
        model.add_feed(Feed::new("https://a/feed".into()));
        model.add_feed(Feed::new("https://b/feed".into()));
        let model = AsyncMutex::new(model);

        let fetcher = Arc::new(MockFetcher::new());
        fetcher.set(
            "https://a/feed",
            Ok(FetchOutcome::Fetched {
                etag: None,
                lastmodified: None,
                items: vec![crate::model::Item::new("g1".into(), "https://a/feed".into())],
            }),
        );
        fetcher.set(
            "https://b/feed",
            Ok(FetchOutcome::Fetched {
                etag: None,
                lastmodified: None,
                items: vec![crate::model::Item::new("g2".into(), "https://b/feed".into())],
            }),
        );

        let reloader = Reloader::new(
            store,
            fetcher,
            Arc::new(Ignores::new()),
            Arc::new(HookRunner::new(None, None, None)),
            2,
        );

        let (tx, mut rx) = mpsc::channel(16);
        reloader.reload_all(&model, true, tx).await;
        let mut first_cycle_new_unread = None;
        while let Some(status) = rx.recv().await {
            if let ReloadStatus::CycleComplete { new_unread } = status {
                first_cycle_new_unread = Some(new_unread);
            }
        }
        assert_eq!(first_cycle_new_unread, Some(2));

        // Second cycle: MockFetcher has nothing queued for either URL, so it
        // returns an empty fetched feed, and the two guids above are already
        // present, so nothing should count as new.
        let (tx, mut rx) = mpsc::channel(16);
        reloader.reload_all(&model, true, tx).await;
        let mut second_cycle_new_unread = None;
        while let Some(status) = rx.recv().await {
            if let ReloadStatus::CycleComplete { new_unread } = status {
                second_cycle_new_unread = Some(new_unread);
            }
        }
        assert_eq!(second_cycle_new_unread, Some(0));
    }

    #[tokio::test]
    async fn reload_range_applies_ignores() {
        let store = build_store().await;
        store.load_feeds(&["https://a/feed".to_string()], 0).await.unwrap();

        let mut model = FeedModel::new(SortStrategy::new(SortMethod::Date, SortDirection::Desc));
        model.add_feed(Feed::new("https://a/feed".into()));
        let model = AsyncMutex::new(model);

        let fetcher = Arc::new(MockFetcher::new());
        let mut item = crate::model::Item::new("g1".into(), "https://a/feed".into());
        item.author = Some("Spam".into());
        fetcher.set(
            "https://a/feed",
            Ok(FetchOutcome::Fetched {
                etag: None,
                lastmodified: None,
                items: vec![item],
            }),
        );

        let mut ignores = Ignores::new();
        ignores.add_ignore_rule("*", "author = \"Spam\"").unwrap();

        let reloader = Reloader::new(
            store.clone(),
            fetcher,
            Arc::new(ignores),
            Arc::new(HookRunner::new(None, None, None)),
            1,
        );

        let (tx, _rx) = mpsc::channel(16);
        reloader.reload_range(&model, 0, 1, 1, true, &tx).await;

        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rss_item")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(row.0, 0);
    }
}
