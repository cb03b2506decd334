//! Rendered page cache
//!
//! Holds the HTML of global feed pages for a short time. Keys vary by the
//! viewer's cookies so a logged-in viewer never receives a page rendered for
//! someone else:
//!
//! ```text
//! index_page:<sha256 of the Cookie header, or "anonymous">:<page>
//! ```
//!
//! Entries are never invalidated by writes. A deleted post can keep showing
//! until its page expires or `clear()` is called.

use crate::cache::{Cache, CacheLayer};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

/// Key prefix of cached global feed pages
pub const INDEX_PAGE_PREFIX: &str = "index_page";

/// Segment used when the request carries no cookies
const ANONYMOUS_SEGMENT: &str = "anonymous";

/// Page cache service
pub struct PageCache {
    cache: Arc<Cache>,
    ttl: Duration,
}

impl PageCache {
    /// Wrap a cache store. `ttl` is the lifetime of global feed pages.
    pub fn new(cache: Arc<Cache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Lifetime of global feed pages
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cache key for page `page` of the global feed as requested with `cookie_header`.
    pub fn index_key(cookie_header: Option<&str>, page: i64) -> String {
        format!("{}:{}:{}", INDEX_PAGE_PREFIX, viewer_segment(cookie_header), page)
    }

    /// Fetch a cached page. Store failures are logged and read as a miss.
    pub async fn get(&self, key: &str) -> Option<String> {
        match self.cache.get::<String>(key).await {
            Ok(Some(html)) => {
                tracing::debug!("Page cache hit: {}", key);
                Some(html)
            }
            Ok(None) => {
                tracing::debug!("Page cache miss: {}", key);
                None
            }
            Err(e) => {
                tracing::warn!("Page cache read failed for {}: {:#}", key, e);
                None
            }
        }
    }

    /// Store a rendered page for `ttl`. Store failures are logged and ignored.
    pub async fn put(&self, key: &str, html: &str, ttl: Duration) {
        if let Err(e) = self.cache.set(key, &html, ttl).await {
            tracing::warn!("Page cache write failed for {}: {:#}", key, e);
        }
    }

    /// Drop every cached feed page. Other keys in the store are kept.
    pub async fn clear(&self) -> anyhow::Result<()> {
        self.cache
            .delete_prefix(&format!("{}:", INDEX_PAGE_PREFIX))
            .await?;
        tracing::info!("Page cache cleared");
        Ok(())
    }
}

/// Hex SHA-256 of the Cookie header, or `anonymous` when there is none.
fn viewer_segment(cookie_header: Option<&str>) -> String {
    match cookie_header.map(str::trim) {
        Some(cookie) if !cookie.is_empty() => {
            let digest = Sha256::digest(cookie.as_bytes());
            let mut hex = String::with_capacity(digest.len() * 2);
            for byte in digest {
                let _ = write!(hex, "{:02x}", byte);
            }
            hex
        }
        _ => ANONYMOUS_SEGMENT.to_string(),
    }
}
