//! Pure helpers: URL validation, header building, error excerpts (no I/O).

use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::error::{NetError, NetResult};

/// Longest response body quoted in an error message.
const MAX_ERROR_EXCERPT: usize = 200;

/// Parse `raw` and require an http(s) URL.
pub(crate) fn validate_url(raw: &str) -> NetResult<Url> {
    let url = Url::parse(raw).map_err(|e| NetError::InvalidRequest {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(NetError::InvalidRequest {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

/// Turn configured headers into a `HeaderMap`, rejecting invalid names/values.
pub(crate) fn build_headers(url: &str, headers: &BTreeMap<String, String>) -> NetResult<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| NetError::InvalidRequest {
                url: url.to_string(),
                reason: format!("invalid header name '{}': {}", name, e),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| NetError::InvalidRequest {
            url: url.to_string(),
            reason: format!("invalid value for header '{}': {}", name, e),
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// Url-encode form fields.
pub(crate) fn encode_form(form: &BTreeMap<String, String>) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(form)
        .finish()
}

/// Message for a non-success response: a body excerpt, or the reason phrase.
pub(crate) fn error_excerpt(body: &str, reason: Option<&str>) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        reason.unwrap_or("no response body").to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_EXCERPT).collect()
    }
}
