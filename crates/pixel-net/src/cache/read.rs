//! Cache read path. Every failure here degrades to a miss.

use std::io::ErrorKind;
use std::time::Duration;

use tokio::fs;
use tracing::{debug, warn};

use crate::error::{NetError, NetResult};
use crate::types::ContentKind;

use super::{io, keys, policy, CacheEntry, CacheKey, CacheStore};

pub(crate) async fn get_impl(
    cache: &CacheStore,
    key: &CacheKey,
    ttl: Duration,
) -> Option<CacheEntry> {
    let paths = cache.paths(key);

    let stamp_text = match fs::read_to_string(&paths.stamp).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(key = key.stem(), "cache miss");
            return None;
        }
        Err(e) => {
            warn!(key = key.stem(), error = %e, "failed to read cache stamp, treating as miss");
            return None;
        }
    };

    let Some(created_at) = policy::parse_stamp(&stamp_text) else {
        warn!(key = key.stem(), "malformed cache stamp, dropping entry");
        discard(cache, key).await;
        return None;
    };

    let now = policy::now_unix();
    if policy::is_expired(created_at, now, ttl.as_secs()) {
        debug!(
            key = key.stem(),
            created_at,
            age_secs = now.abs_diff(created_at),
            ttl_secs = ttl.as_secs(),
            "cache entry expired"
        );
        discard(cache, key).await;
        return None;
    }

    let payload = match fs::read(&paths.payload).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(key = key.stem(), "cache stamp without payload, dropping entry");
            discard(cache, key).await;
            return None;
        }
        Err(e) => {
            warn!(key = key.stem(), error = %e, "failed to read cached payload, treating as miss");
            return None;
        }
    };

    debug!(key = key.stem(), bytes = payload.len(), "cache hit");
    Some(CacheEntry {
        key: key.clone(),
        payload,
        created_at,
    })
}

pub(crate) async fn stamp_impl(cache: &CacheStore, key: &CacheKey) -> Option<i64> {
    let text = fs::read_to_string(cache.paths(key).stamp).await.ok()?;
    policy::parse_stamp(&text)
}

pub(crate) async fn entries_impl(cache: &CacheStore) -> NetResult<Vec<(CacheKey, i64)>> {
    let mut result = Vec::new();

    if !fs::try_exists(&cache.cache_dir).await.unwrap_or(false) {
        return Ok(result);
    }

    let mut entries = fs::read_dir(&cache.cache_dir)
        .await
        .map_err(|e| NetError::Cache {
            message: format!("failed to read cache directory: {}", e),
        })?;

    while let Some(entry) = entries.next_entry().await.map_err(|e| NetError::Cache {
        message: format!("failed to read directory entry: {}", e),
    })? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some((stem, ext)) = name.rsplit_once('.') else {
            continue;
        };

        let kind = if ext == ContentKind::Text.stamp_ext() {
            ContentKind::Text
        } else if ext == ContentKind::Binary.stamp_ext() {
            ContentKind::Binary
        } else {
            continue;
        };

        let key = CacheKey {
            stem: stem.to_string(),
            kind,
        };
        let payload = keys::paths_impl(&cache.cache_dir, &key).payload;
        if !fs::try_exists(&payload).await.unwrap_or(false) {
            continue;
        }
        if let Some(created_at) = stamp_impl(cache, &key).await {
            result.push((key, created_at));
        }
    }

    result.sort();
    Ok(result)
}

/// Best-effort removal of a stale or broken entry.
async fn discard(cache: &CacheStore, key: &CacheKey) {
    let paths = cache.paths(key);
    for path in [&paths.stamp, &paths.payload] {
        if let Err(e) = io::remove_if_exists(path).await {
            warn!(path = %path.display(), error = %e, "failed to remove cache file");
        }
    }
}
