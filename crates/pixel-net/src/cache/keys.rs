//! Key and path derivation.

use std::path::Path;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use sha2::{Digest, Sha256};

use super::{CacheKey, CachePaths};

/// Longest base64 stem before falling back to a hash. Leaves room for the
/// longest suffix (`.contentcachestamp`) and a temp-file tail under the
/// common 255-byte file name limit.
const MAX_ENCODED_STEM: usize = 200;

/// Prefix of hashed stems. Cannot clash with a base64 stem: `h-` would
/// decode to a leading 0x87 byte, which never starts valid UTF-8.
const HASHED_PREFIX: &str = "h-";

pub(crate) fn stem_for_url(url: &str) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(url.as_bytes());
    if encoded.len() <= MAX_ENCODED_STEM {
        encoded
    } else {
        format!("{}{}", HASHED_PREFIX, hex::encode(Sha256::digest(url.as_bytes())))
    }
}

pub(crate) fn url_for_stem(stem: &str) -> Option<String> {
    if stem.starts_with(HASHED_PREFIX) {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(stem).ok()?;
    String::from_utf8(bytes).ok()
}

pub(crate) fn paths_impl(cache_dir: &Path, key: &CacheKey) -> CachePaths {
    CachePaths {
        payload: cache_dir.join(format!("{}.{}", key.stem, key.kind.payload_ext())),
        stamp: cache_dir.join(format!("{}.{}", key.stem, key.kind.stamp_ext())),
    }
}
