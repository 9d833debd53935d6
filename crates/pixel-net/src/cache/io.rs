//! Filesystem helpers: default location, atomic writes, quiet removal.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs;

use crate::error::{NetError, NetResult};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub(crate) fn default_cache_dir_impl() -> NetResult<PathBuf> {
    let base = dirs::data_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| NetError::Cache {
            message: "could not determine cache directory".to_string(),
        })?;

    Ok(base.join("pixel-net").join("cache"))
}

/// Write `content` to a uniquely named sibling, then rename it over `path`.
///
/// Concurrent writers of the same entry each use their own temp file, so the
/// final file is always one complete write.
pub(crate) async fn write_atomic_impl(path: &Path, content: &[u8]) -> NetResult<()> {
    let temp_path = temp_path_for(path);

    if let Err(e) = fs::write(&temp_path, content).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(NetError::Cache {
            message: format!("failed to write temp file: {}", e),
        });
    }

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(NetError::Cache {
            message: format!("failed to rename temp file: {}", e),
        });
    }

    Ok(())
}

/// Remove a file, treating "already gone" as success.
pub(crate) async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}.{}-{}.tmp", name, std::process::id(), n))
}
