//! Cached HTTP requests for game clients.
//!
//! This crate provides:
//!
//! - A disk cache keyed by request URL, with lazy TTL expiry
//! - A request dispatcher that answers from the cache when it can
//! - Callback-style requests with cancellation, and a plain async API
//! - A request queue that sends a batch with a pause between requests
//!
//! # Quick Start
//!
//! ```no_run
//! use pixel_net::{NetConfig, RequestConfig, RequestDispatcher};
//!
//! # async fn example() -> pixel_net::NetResult<()> {
//! let dispatcher = RequestDispatcher::new(NetConfig::from_env())?;
//!
//! // Served from disk for the next 300 seconds.
//! let request = RequestConfig::new("https://cdn.example.com/levels.json").with_cache_ttl(300);
//! let payload = dispatcher.send(&request).await?;
//! println!("{} bytes (cached: {})", payload.len(), payload.is_cached());
//! # Ok(())
//! # }
//! ```
//!
//! # Callbacks
//!
//! ```no_run
//! use pixel_net::{NetRequest, RequestConfig, RequestDispatcher};
//!
//! # fn example(dispatcher: &RequestDispatcher) {
//! let handle = dispatcher.fetch(
//!     NetRequest::new(RequestConfig::new("https://cdn.example.com/a.png"))
//!         .on_complete(|payload| println!("got {} bytes", payload.len()))
//!         .on_error(|err| eprintln!("download failed: {}", err)),
//! );
//! handle.cancel();
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `PIXEL_NET_CACHE_DIR` | Cache directory (default: `<data dir>/pixel-net/cache`) |
//! | `PIXEL_NET_TIMEOUT` | Request timeout in seconds (default: 30) |
//! | `PIXEL_NET_QUEUE_INTERVAL_MS` | Pause between queued requests (default: 1000) |
//! | `PIXEL_NET_USER_AGENT` | User-Agent header (default: `pixel-net/<version>`) |

pub mod cache;
pub mod client;
pub mod error;
pub mod queue;
pub mod request;
pub mod types;

// Re-export main types
pub use cache::{CacheEntry, CacheKey, CachePaths, CacheStore};
pub use client::RequestDispatcher;
pub use error::{NetError, NetResult};
pub use queue::{QueueHandle, RequestQueue};
pub use request::{NetRequest, RequestHandle, RequestId, RequestState};
pub use types::{
    ContentKind, NetConfig, Payload, PayloadSource, RequestConfig, RequestMethod,
    DEFAULT_CACHE_TTL_SECS,
};
