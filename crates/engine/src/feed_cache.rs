//! TTL-bounded, single-flight realtime feed fetcher.
//!
//! Grounded on the provider-holds-a-client-and-refetches-on-demand shape
//! of the teacher's collectors (`gtfs::collector::RealtimeCollector`),
//! simplified from an actor/channel collector into a plain async cache:
//! every request for a feed key either returns the last fetch (if still
//! within its TTL) or awaits one fresh fetch, and concurrent requests for
//! the same key share that one fetch rather than issuing their own.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use tokio::sync::Mutex;

use gtfs::realtime_feed;

use crate::error::FeedError;

const FETCH_TIMEOUT: Duration = Duration::from_secs(25);

struct Entry {
    bytes: Option<Bytes>,
    fetched_at: Option<Instant>,
}

pub struct FeedCache {
    client: reqwest::Client,
    entries: Mutex<HashMap<String, Arc<Mutex<Entry>>>>,
}

/// Strips any query string from `url` so ephemeral auth parameters don't
/// fragment the cache key, then pairs it with the feed's logical name
/// (e.g. a system name, or "alerts") per §4.2's `{logicalName,
/// sanitized-URL}` cache key.
fn cache_key(logical_name: &str, url: &str) -> String {
    let sanitized = url.split('?').next().unwrap_or(url);
    format!("{logical_name}:{sanitized}")
}

/// True if `content_type` looks like it was meant for a binary protobuf
/// body; upstream sometimes serves an HTML error page or a JSON error
/// body on failure instead of the expected feed.
fn looks_binary(content_type: Option<&str>) -> bool {
    match content_type {
        Some(value) => {
            let lower = value.to_ascii_lowercase();
            !(lower.contains("text/html") || lower.contains("application/json"))
        }
        None => true,
    }
}

impl FeedCache {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .expect("feed client builds with a plain timeout"),
            entries: Mutex::new(HashMap::new()),
        }
    }

    async fn entry_for(&self, key: &str) -> Arc<Mutex<Entry>> {
        let mut entries = self.entries.lock().await;
        entries
            .entry(key.to_owned())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Entry {
                    bytes: None,
                    fetched_at: None,
                }))
            })
            .clone()
    }

    /// Issues one network fetch and validates the response: a non-2xx
    /// status, an unexpected content type, and a zero-length body all
    /// resolve to an error without ever touching the cache entry.
    async fn fetch(&self, url: &str) -> Result<Bytes, FeedError> {
        tracing::debug!(url, "fetching realtime feed");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FeedError::Fetch {
                url: url.to_owned(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        if !looks_binary(content_type.as_deref()) {
            return Err(FeedError::UnexpectedContentType {
                url: url.to_owned(),
                content_type: content_type.unwrap_or_default(),
            });
        }

        let bytes = response.bytes().await.map_err(|source| FeedError::Fetch {
            url: url.to_owned(),
            source,
        })?;
        if bytes.is_empty() {
            return Err(FeedError::EmptyBody { url: url.to_owned() });
        }
        Ok(bytes)
    }

    /// Returns the bytes of `url` under the `{logical_name, url}` cache
    /// key, fetching only if the last fetch is older than `ttl` or has
    /// never happened. A cache hit that decodes to zero entities is
    /// treated as stale and triggers one uncached refetch.
    pub async fn get(&self, logical_name: &str, url: &str, ttl: Duration) -> Result<Bytes, FeedError> {
        let key = cache_key(logical_name, url);
        let entry_arc = self.entry_for(&key).await;
        let mut entry = entry_arc.lock().await;

        let is_fresh = entry
            .fetched_at
            .map(|fetched_at| fetched_at.elapsed() < ttl)
            .unwrap_or(false);
        if is_fresh {
            if let Some(bytes) = &entry.bytes {
                if realtime_feed::has_entities(bytes) {
                    return Ok(bytes.clone());
                }
                tracing::warn!(url, "cached feed decoded to zero entities, refetching uncached");
            }
        }

        let bytes = self.fetch(url).await?;
        entry.bytes = Some(bytes.clone());
        entry.fetched_at = Some(Instant::now());
        Ok(bytes)
    }
}

impl Default for FeedCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_strips_query_string() {
        assert_eq!(
            cache_key("SUBWAY", "https://example.com/feed?api_key=secret"),
            "SUBWAY:https://example.com/feed"
        );
    }

    #[test]
    fn looks_binary_rejects_html_and_json() {
        assert!(!looks_binary(Some("text/html; charset=utf-8")));
        assert!(!looks_binary(Some("application/json")));
        assert!(looks_binary(Some("application/x-protobuf")));
        assert!(looks_binary(None));
    }
}
