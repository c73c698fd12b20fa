use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::Item;

const MAX_RETRIES: u32 = 3;
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("http error: status {0}")]
    HttpStatus(u16),
    #[error("request timed out")]
    Timeout,
    #[error("parse error: {0}")]
    Parse(String),
    #[error("rate limited after {0} retries")]
    RateLimited(u32),
    #[error("response too large")]
    ResponseTooLarge,
}

/// What a conditional GET against a feed URL produced.
pub enum FetchOutcome {
    /// Server returned 304: nothing changed since the last fetch.
    NotModified,
    Fetched {
        etag: Option<String>,
        lastmodified: Option<i64>,
        items: Vec<Item>,
    },
}

/// The fetch collaborator contract: turns a URL plus conditional-GET
/// metadata into a parsed feed record. Production implementation wraps
/// `reqwest` + `feed-rs`; tests use an in-process mock.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        etag: Option<&str>,
        lastmodified: Option<i64>,
    ) -> Result<FetchOutcome, FetchError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        HttpFetcher { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        etag: Option<&str>,
        lastmodified: Option<i64>,
    ) -> Result<FetchOutcome, FetchError> {
        let mut attempt = 0;
        loop {
            let mut req = self.client.get(url);
            if let Some(etag) = etag {
                req = req.header("If-None-Match", etag);
            }
            if let Some(lm) = lastmodified {
                if let Some(dt) = chrono::DateTime::from_timestamp(lm, 0) {
                    req = req.header("If-Modified-Since", dt.to_rfc2822());
                }
            }

            let resp = req.send().await.map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Network(e)
                }
            })?;

            let status = resp.status();
            if status.as_u16() == 304 {
                return Ok(FetchOutcome::NotModified);
            }
            if status.as_u16() == 429 {
                attempt += 1;
                if attempt > MAX_RETRIES {
                    return Err(FetchError::RateLimited(attempt));
                }
                tokio::time::sleep(Duration::from_millis(500 * 2u64.pow(attempt))).await;
                continue;
            }
            if !status.is_success() {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }

            let new_etag = resp
                .headers()
                .get("etag")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let new_lastmodified = resp
                .headers()
                .get("last-modified")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| chrono::DateTime::parse_from_rfc2822(s).ok())
                .map(|dt| dt.timestamp());

            let bytes = read_limited_bytes(resp).await?;
            let items = crate::feed::parser::parse_feed(&bytes, url)
                .map_err(|e| FetchError::Parse(e.to_string()))?;

            return Ok(FetchOutcome::Fetched {
                etag: new_etag,
                lastmodified: new_lastmodified,
                items,
            });
        }
    }
}

async fn read_limited_bytes(resp: reqwest::Response) -> Result<Vec<u8>, FetchError> {
    use futures::StreamExt;

    if let Some(len) = resp.content_length() {
        if len as usize > MAX_FEED_SIZE {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut buf = Vec::new();
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if buf.len() + chunk.len() > MAX_FEED_SIZE {
            return Err(FetchError::ResponseTooLarge);
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}
