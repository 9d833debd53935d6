//! Request, payload and configuration types.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::error::{NetError, NetResult};

/// Default cache lifetime for a request (5 minutes).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl RequestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }
}

impl From<RequestMethod> for reqwest::Method {
    fn from(method: RequestMethod) -> Self {
        match method {
            RequestMethod::Get => reqwest::Method::GET,
            RequestMethod::Post => reqwest::Method::POST,
            RequestMethod::Put => reqwest::Method::PUT,
            RequestMethod::Delete => reqwest::Method::DELETE,
            RequestMethod::Head => reqwest::Method::HEAD,
        }
    }
}

/// What the payload is, which decides the cache file suffixes.
///
/// Text responses live in `.cache` / `.cachestamp`, binary content
/// (images, audio) in `.contentcache` / `.contentcachestamp`, so the two
/// never shadow each other for the same URL.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Text,
    Binary,
}

impl ContentKind {
    /// Extension of the payload file.
    pub fn payload_ext(&self) -> &'static str {
        match self {
            Self::Text => "cache",
            Self::Binary => "contentcache",
        }
    }

    /// Extension of the timestamp file.
    pub fn stamp_ext(&self) -> &'static str {
        match self {
            Self::Text => "cachestamp",
            Self::Binary => "contentcachestamp",
        }
    }
}

/// Description of a single request.
///
/// Immutable once the request has been handed to the dispatcher; the
/// dispatcher works on its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Target URL (http or https).
    pub url: String,

    /// HTTP method.
    #[serde(default)]
    pub method: RequestMethod,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Form fields, sent url-encoded as the request body.
    #[serde(default)]
    pub form: BTreeMap<String, String>,

    /// Whether to consult and fill the disk cache.
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,

    /// Seconds after which a cached payload is stale.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Payload kind.
    #[serde(default)]
    pub kind: ContentKind,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

impl RequestConfig {
    /// A cached GET for `url` with the default TTL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: RequestMethod::default(),
            headers: BTreeMap::new(),
            form: BTreeMap::new(),
            cache_enabled: default_cache_enabled(),
            cache_ttl_secs: default_cache_ttl(),
            kind: ContentKind::default(),
        }
    }

    /// Set the method.
    pub fn with_method(mut self, method: RequestMethod) -> Self {
        self.method = method;
        self
    }

    /// Add a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add a form field.
    pub fn with_form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.insert(name.into(), value.into());
        self
    }

    /// Enable or disable caching.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Set the cache TTL in seconds.
    pub fn with_cache_ttl(mut self, secs: u64) -> Self {
        self.cache_ttl_secs = secs;
        self
    }

    /// Set the payload kind.
    pub fn with_kind(mut self, kind: ContentKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Whether this request reads from and writes to the cache.
    ///
    /// Only GET responses are cached: the key is the URL alone, which says
    /// nothing about a request body.
    pub fn uses_cache(&self) -> bool {
        self.cache_enabled && self.method == RequestMethod::Get
    }
}

/// Where a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    Cache,
    Network,
}

/// Result of a successful request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Response body (or cached bytes).
    pub data: Vec<u8>,

    /// Cache hit or network response.
    pub source: PayloadSource,

    /// HTTP status; `None` for cache hits.
    pub status: Option<u16>,
}

impl Payload {
    pub(crate) fn from_cache(data: Vec<u8>) -> Self {
        Self {
            data,
            source: PayloadSource::Cache,
            status: None,
        }
    }

    pub(crate) fn from_network(status: u16, data: Vec<u8>) -> Self {
        Self {
            data,
            source: PayloadSource::Network,
            status: Some(status),
        }
    }

    /// Whether the payload was served from the disk cache.
    pub fn is_cached(&self) -> bool {
        self.source == PayloadSource::Cache
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    /// Body as text, failing on invalid UTF-8.
    pub fn into_text(self) -> NetResult<String> {
        String::from_utf8(self.data).map_err(|e| NetError::Decode {
            message: format!("payload is not valid UTF-8: {}", e),
        })
    }

    /// Body parsed as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> NetResult<T> {
        serde_json::from_slice(&self.data).map_err(|e| NetError::Decode {
            message: format!("payload is not valid JSON: {}", e),
        })
    }
}

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetConfig {
    /// Cache directory; `None` selects the platform data directory.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Pause between dispatches of a request queue, in milliseconds.
    #[serde(default = "default_queue_interval_ms")]
    pub queue_interval_ms: u64,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout() -> u64 {
    30
}

fn default_queue_interval_ms() -> u64 {
    1000
}

fn default_user_agent() -> String {
    concat!("pixel-net/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            timeout_secs: default_timeout(),
            queue_interval_ms: default_queue_interval_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl NetConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `PIXEL_NET_CACHE_DIR` | Cache directory |
    /// | `PIXEL_NET_TIMEOUT` | Request timeout in seconds |
    /// | `PIXEL_NET_QUEUE_INTERVAL_MS` | Queue dispatch interval |
    /// | `PIXEL_NET_USER_AGENT` | User-Agent header |
    pub fn from_env() -> Self {
        Self {
            cache_dir: std::env::var("PIXEL_NET_CACHE_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            timeout_secs: std::env::var("PIXEL_NET_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_timeout),
            queue_interval_ms: std::env::var("PIXEL_NET_QUEUE_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_queue_interval_ms),
            user_agent: std::env::var("PIXEL_NET_USER_AGENT")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(default_user_agent),
        }
    }

    /// Load settings from a JSON file.
    pub async fn load(path: impl AsRef<Path>) -> NetResult<Self> {
        let path = path.as_ref();

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| NetError::Config {
                message: format!("failed to read settings {}: {}", path.display(), e),
            })?;

        serde_json::from_str(&content).map_err(|e| NetError::Config {
            message: format!("failed to parse settings {}: {}", path.display(), e),
        })
    }

    /// Save settings as JSON.
    pub async fn save(&self, path: impl AsRef<Path>) -> NetResult<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self).map_err(|e| NetError::Config {
            message: format!("failed to serialize settings: {}", e),
        })?;

        fs::write(path, content)
            .await
            .map_err(|e| NetError::Config {
                message: format!("failed to write settings {}: {}", path.display(), e),
            })?;

        info!(path = %path.display(), "saved network settings");
        Ok(())
    }

    /// Set the cache directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the queue dispatch interval.
    pub fn with_queue_interval(mut self, interval: Duration) -> Self {
        self.queue_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn queue_interval(&self) -> Duration {
        Duration::from_millis(self.queue_interval_ms)
    }
}
