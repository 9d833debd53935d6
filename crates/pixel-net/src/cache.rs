//! Disk cache for request payloads.
//!
//! Every entry is a pair of files named after the request URL:
//!
//! ```text
//! <cache_dir>/
//!   <key>.cache               # payload bytes (text requests)
//!   <key>.cachestamp          # creation time, decimal unix seconds
//!   <key>.contentcache        # payload bytes (binary requests)
//!   <key>.contentcachestamp
//! ```
//!
//! `<key>` is the URL in URL-safe base64, or `h-<sha256>` for URLs too long
//! to fit in a file name. Expiry is checked lazily on read: a stale entry is
//! deleted and reported as a miss. Reads never fail; any I/O problem is a miss.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::fs;

use crate::error::NetResult;
use crate::types::{ContentKind, NetConfig, RequestConfig};

mod evict;
mod io;
mod keys;
mod policy;
mod put;
mod read;

/// Identifies one cache entry: the encoded URL plus the payload kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    stem: String,
    kind: ContentKind,
}

impl CacheKey {
    /// Derive the key for a URL.
    pub fn from_url(url: &str, kind: ContentKind) -> Self {
        Self {
            stem: keys::stem_for_url(url),
            kind,
        }
    }

    /// Derive the key for a request.
    pub fn for_request(config: &RequestConfig) -> Self {
        Self::from_url(&config.url, config.kind)
    }

    /// File stem shared by the payload and stamp files.
    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    /// The URL this key was derived from, when the encoding is reversible.
    ///
    /// Returns `None` for hashed keys (very long URLs).
    pub fn url(&self) -> Option<String> {
        keys::url_for_stem(&self.stem)
    }
}

/// On-disk locations of one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePaths {
    pub payload: PathBuf,
    pub stamp: PathBuf,
}

/// A fresh cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Entry key.
    pub key: CacheKey,

    /// Cached bytes.
    pub payload: Vec<u8>,

    /// Creation time (unix seconds).
    pub created_at: i64,
}

impl CacheEntry {
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created_at, 0)
    }
}

/// Payload cache keyed by request URL.
#[derive(Debug, Clone)]
pub struct CacheStore {
    cache_dir: PathBuf,
}

impl CacheStore {
    /// Create a store in the default location.
    ///
    /// Default: `<platform data dir>/pixel-net/cache`
    pub fn new() -> NetResult<Self> {
        let cache_dir = io::default_cache_dir_impl()?;
        Ok(Self { cache_dir })
    }

    /// Create a store with a custom directory.
    pub fn with_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Create the store described by a dispatcher config.
    pub fn from_config(config: &NetConfig) -> NetResult<Self> {
        match &config.cache_dir {
            Some(dir) => Ok(Self::with_dir(dir)),
            None => Self::new(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// File paths used for `key`.
    pub fn paths(&self, key: &CacheKey) -> CachePaths {
        keys::paths_impl(&self.cache_dir, key)
    }

    /// Read a fresh entry.
    ///
    /// Returns `None` on a miss. An entry older than `ttl`, or one whose
    /// stamp cannot be parsed, is deleted and also reported as a miss.
    pub async fn get(&self, key: &CacheKey, ttl: Duration) -> Option<CacheEntry> {
        read::get_impl(self, key, ttl).await
    }

    /// Store `payload` stamped with the current time, replacing any prior entry.
    pub async fn put(&self, key: &CacheKey, payload: &[u8]) -> NetResult<()> {
        put::put_impl(self, key, payload).await
    }

    /// Remove an entry. Missing files are not an error.
    pub async fn delete(&self, key: &CacheKey) -> NetResult<()> {
        evict::delete_impl(self, key).await
    }

    /// Check freshness without reading the payload or deleting anything.
    pub async fn is_cached(&self, key: &CacheKey, ttl: Duration) -> bool {
        match read::stamp_impl(self, key).await {
            Some(created_at) => {
                !policy::is_expired(created_at, policy::now_unix(), ttl.as_secs())
                    && fs::try_exists(self.paths(key).payload)
                        .await
                        .unwrap_or(false)
            }
            None => false,
        }
    }

    /// Remove every cache file from the directory.
    pub async fn clear(&self) -> NetResult<()> {
        evict::clear_impl(self).await
    }

    /// List stored entries with their creation times, fresh or not.
    pub async fn entries(&self) -> NetResult<Vec<(CacheKey, i64)>> {
        read::entries_impl(self).await
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self::with_dir(std::env::temp_dir().join("pixel-net-cache")))
    }
}
