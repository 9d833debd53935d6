//! Cache write path.

use tokio::fs;
use tracing::debug;

use crate::error::{NetError, NetResult};

use super::{io, policy, CacheKey, CacheStore};

pub(crate) async fn put_impl(cache: &CacheStore, key: &CacheKey, payload: &[u8]) -> NetResult<()> {
    fs::create_dir_all(&cache.cache_dir)
        .await
        .map_err(|e| NetError::Cache {
            message: format!("failed to create cache directory: {}", e),
        })?;

    let paths = cache.paths(key);
    let created_at = policy::now_unix();

    // Payload before stamp.
    io::write_atomic_impl(&paths.payload, payload).await?;
    io::write_atomic_impl(&paths.stamp, created_at.to_string().as_bytes()).await?;

    debug!(key = key.stem(), bytes = payload.len(), created_at, "cached payload");
    Ok(())
}
