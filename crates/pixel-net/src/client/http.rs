//! HTTP layer: request building and status mapping.
//!
//! This is the only place that interprets status codes. No retries: a
//! failed request is reported once and left to the caller.

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use tracing::debug;

use crate::error::{error_chain, NetError, NetResult};
use crate::types::{NetConfig, RequestConfig};

use super::helpers::{build_headers, encode_form, error_excerpt, validate_url};

/// A successful response.
#[derive(Debug)]
pub(crate) struct Fetched {
    pub status: u16,
    pub body: Vec<u8>,
}

/// HTTP backend (holds the reqwest client and config).
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    pub(crate) client: reqwest::Client,
    pub(crate) config: NetConfig,
}

impl HttpBackend {
    /// Perform one request. Non-2xx statuses become `NetError::Status`.
    pub(crate) async fn execute(&self, request: &RequestConfig) -> NetResult<Fetched> {
        let url = validate_url(&request.url)?;
        let headers = build_headers(&request.url, &request.headers)?;

        let mut builder = self
            .client
            .request(request.method.into(), url)
            .headers(headers);

        if !request.form.is_empty() {
            builder = builder
                .header(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                )
                .body(encode_form(&request.form));
        }

        let response = builder.send().await?;
        let status = response.status();
        debug!(
            url = %request.url,
            method = request.method.as_str(),
            status = status.as_u16(),
            "response received"
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NetError::Status {
                status: status.as_u16(),
                message: error_excerpt(&body, status.canonical_reason()),
            });
        }

        let body = response.bytes().await.map_err(|e| NetError::Network {
            message: format!("failed to read response body: {}", error_chain(&e)),
        })?;

        Ok(Fetched {
            status: status.as_u16(),
            body: body.to_vec(),
        })
    }
}
