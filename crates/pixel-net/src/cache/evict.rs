//! Cache removal.

use tokio::fs;
use tracing::debug;

use crate::error::{NetError, NetResult};
use crate::types::ContentKind;

use super::{io, CacheKey, CacheStore};

pub(crate) async fn delete_impl(cache: &CacheStore, key: &CacheKey) -> NetResult<()> {
    let paths = cache.paths(key);

    for path in [&paths.stamp, &paths.payload] {
        io::remove_if_exists(path)
            .await
            .map_err(|e| NetError::Cache {
                message: format!("failed to delete {}: {}", path.display(), e),
            })?;
    }

    debug!(key = key.stem(), "deleted cache entry");
    Ok(())
}

pub(crate) async fn clear_impl(cache: &CacheStore) -> NetResult<()> {
    if !fs::try_exists(&cache.cache_dir).await.unwrap_or(false) {
        return Ok(());
    }

    let mut entries = fs::read_dir(&cache.cache_dir)
        .await
        .map_err(|e| NetError::Cache {
            message: format!("failed to read cache directory: {}", e),
        })?;

    let mut removed = 0usize;
    while let Some(entry) = entries.next_entry().await.map_err(|e| NetError::Cache {
        message: format!("failed to read directory entry: {}", e),
    })? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_cache_file(&name) {
            continue;
        }

        io::remove_if_exists(&entry.path())
            .await
            .map_err(|e| NetError::Cache {
                message: format!("failed to remove {}: {}", name, e),
            })?;
        removed += 1;
    }

    debug!(removed, "cleared payload cache");
    Ok(())
}

/// Files this cache owns. The directory may be shared with other data.
fn is_cache_file(name: &str) -> bool {
    // Leftover temp files look like `<stem>.<ext>.<pid>-<n>.tmp`.
    let name = name
        .strip_suffix(".tmp")
        .and_then(|rest| rest.rsplit_once('.').map(|(base, _)| base))
        .unwrap_or(name);
    let ext = match name.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => return false,
    };
    [ContentKind::Text, ContentKind::Binary]
        .iter()
        .any(|kind| ext == kind.payload_ext() || ext == kind.stamp_ext())
}
