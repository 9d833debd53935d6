//! Request dispatcher: cache lookup, network fetch, cache fill.
//!
//! Public API: no status code knowledge. All HTTP/status mapping in http.rs.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheStore};
use crate::error::{NetError, NetResult};
use crate::queue::RequestQueue;
use crate::request::{DisposeGuard, NetRequest, RequestHandle, RequestState, Shared};
use crate::types::{NetConfig, Payload, PayloadSource, RequestConfig};

mod helpers;
mod http;

use http::HttpBackend;

/// Issues requests, answering from the disk cache when it can.
///
/// Cheap to clone; clones share the HTTP connection pool and cache directory.
#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    http: HttpBackend,
    cache: CacheStore,
}

impl RequestDispatcher {
    /// Create a dispatcher with the cache described by `config`.
    pub fn new(config: NetConfig) -> NetResult<Self> {
        let cache = CacheStore::from_config(&config)?;
        Self::with_cache(config, cache)
    }

    /// Create a dispatcher using an explicit cache store.
    pub fn with_cache(config: NetConfig, cache: CacheStore) -> NetResult<Self> {
        let user_agent = HeaderValue::from_str(&config.user_agent).map_err(|e| NetError::Config {
            message: format!("invalid user agent '{}': {}", config.user_agent, e),
        })?;
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, user_agent);

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(default_headers)
            .build()
            .map_err(|e| NetError::Config {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http: HttpBackend { client, config },
            cache,
        })
    }

    pub fn from_env() -> NetResult<Self> {
        Self::new(NetConfig::from_env())
    }

    pub fn config(&self) -> &NetConfig {
        &self.http.config
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Run a request to completion and return its payload.
    ///
    /// With caching enabled, a fresh cache entry answers without touching the
    /// network; a network success is written back to the cache. Cache write
    /// failures are logged and do not fail the request.
    pub async fn send(&self, request: &RequestConfig) -> NetResult<Payload> {
        let payload = self.resolve(request).await?;
        self.store(request, &payload).await;
        Ok(payload)
    }

    /// Dispatch a request on the tokio runtime and return its handle.
    ///
    /// Exactly one of `on_complete` / `on_error` is invoked, once, unless
    /// the request is cancelled before its result arrives, in which case
    /// neither is.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn fetch(&self, request: impl Into<NetRequest>) -> RequestHandle {
        let (id, config, callbacks, on_dispose) = request.into().into_parts();
        let shared = Arc::new(Shared::new(on_dispose));
        let dispatcher = self.clone();
        let task_shared = Arc::clone(&shared);

        debug!(request = %id, url = %config.url, method = config.method.as_str(), "dispatching request");

        let task = tokio::spawn(async move {
            let _dispose = DisposeGuard(Arc::clone(&task_shared));

            if !task_shared.transition(&[RequestState::Idle], RequestState::Fetching) {
                return;
            }

            let outcome = dispatcher.resolve(&config).await;

            let terminal = if outcome.is_ok() {
                RequestState::Completed
            } else {
                RequestState::Failed
            };
            if !task_shared.transition(&[RequestState::Fetching], terminal) {
                debug!(request = %id, "request cancelled, dropping result");
                return;
            }

            match outcome {
                Ok(payload) => {
                    dispatcher.store(&config, &payload).await;
                    callbacks.complete(payload);
                }
                Err(e) => {
                    debug!(request = %id, url = %config.url, error = %e, "request failed");
                    callbacks.fail(e);
                }
            }
        });

        RequestHandle::new(id, shared, task)
    }

    /// Start an empty request queue that dispatches through this dispatcher.
    pub fn queue(&self) -> RequestQueue {
        RequestQueue::new(self.clone())
    }

    /// Cache lookup, then network. Does not write the cache.
    async fn resolve(&self, request: &RequestConfig) -> NetResult<Payload> {
        if request.uses_cache() {
            let key = CacheKey::for_request(request);
            if let Some(entry) = self.cache.get(&key, request.cache_ttl()).await {
                debug!(url = %request.url, "served from cache");
                return Ok(Payload::from_cache(entry.payload));
            }
        }

        debug!(url = %request.url, method = request.method.as_str(), "fetching from network");
        let fetched = self.http.execute(request).await?;
        Ok(Payload::from_network(fetched.status, fetched.body))
    }

    /// Write a network payload back to the cache, if the request caches.
    async fn store(&self, request: &RequestConfig, payload: &Payload) {
        if payload.source != PayloadSource::Network || !request.uses_cache() {
            return;
        }

        let key = CacheKey::for_request(request);
        if let Err(e) = self.cache.put(&key, &payload.data).await {
            warn!(url = %request.url, error = %e, "failed to cache response");
        }
    }
}
