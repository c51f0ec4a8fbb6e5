//! chainsink-http: `reqwest`-backed [`BatchPoster`].
//!
//! One POST per batch, `Content-Type: application/json`. The response body is
//! always read to the end before the status is returned, so the pooled
//! connection is released whether the sink accepted the batch or not.
//!
//! There is no retry here and no timeout unless one is configured.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use chainsink_core::error::SinkError;
use chainsink_core::transport::BatchPoster;

/// Configuration for [`HttpPoster`].
#[derive(Debug, Clone)]
pub struct HttpPosterConfig {
    /// Per-request timeout. `None` waits as long as the sink takes.
    pub request_timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for HttpPosterConfig {
    fn default() -> Self {
        Self {
            request_timeout: None,
            user_agent: concat!("chainsink/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// HTTP transport for entry batches.
#[derive(Clone)]
pub struct HttpPoster {
    http: reqwest::Client,
}

impl HttpPoster {
    pub fn new(config: HttpPosterConfig) -> Result<Self, SinkError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| SinkError::ClientBuild {
            transport: "http",
            reason: e.to_string(),
        })?;
        Ok(Self { http })
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Result<Self, SinkError> {
        Self::new(HttpPosterConfig::default())
    }
}

#[async_trait]
impl BatchPoster for HttpPoster {
    async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<u16, SinkError> {
        let resp = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| SinkError::Send {
                target: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status().as_u16();

        // Drain the body regardless of status.
        match resp.bytes().await {
            Ok(drained) => debug!(url, status, response_bytes = drained.len(), "response drained"),
            Err(e) => debug!(url, status, error = %e, "response body read failed"),
        }

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainsink_core::error::ErrorKind;

    #[test]
    fn invalid_user_agent_fails_construction() {
        let config = HttpPosterConfig {
            user_agent: "chainsink\nbroken".into(),
            ..Default::default()
        };
        let err = HttpPoster::new(config).err().unwrap();
        assert!(matches!(err, SinkError::ClientBuild { transport: "http", .. }));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.target().is_none());
    }

    #[test]
    fn defaults_build() {
        assert!(HttpPoster::with_defaults().is_ok());
    }
}
