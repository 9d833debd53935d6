//! Error types for the request layer.

/// Request and cache errors.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Transport failure (connect, timeout, body read).
    #[error("network error: {message}")]
    Network { message: String },

    /// Server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Cache read/write failure.
    #[error("cache error: {message}")]
    Cache { message: String },

    /// Request could not be built (bad URL, bad header).
    #[error("invalid request for {url}: {reason}")]
    InvalidRequest { url: String, reason: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Payload could not be decoded as requested.
    #[error("decode error: {message}")]
    Decode { message: String },
}

impl NetError {
    /// Whether the error came from the remote side or the transport,
    /// as opposed to a local problem with the request or the cache.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Status { .. })
    }

    /// HTTP status, if the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for NetError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: error_chain(&err),
        }
    }
}

/// `err` followed by each of its sources, joined with `: `.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Result type for request operations.
pub type NetResult<T> = Result<T, NetError>;
