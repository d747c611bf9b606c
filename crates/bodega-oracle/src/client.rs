//! HTTP client for the Tag Oracle.

use std::time::Duration;

use async_trait::async_trait;

use crate::{OracleError, TagData, TagSource};

/// Configuration for the oracle HTTP client.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// URL of the tag snapshot document.
    pub url: String,
    /// Per-request timeout in seconds (default: 10). Bounds how long a
    /// stuck oracle can stall a retention sweep.
    pub timeout_secs: u64,
}

impl OracleConfig {
    /// Create a configuration with the default timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: 10,
        }
    }
}

/// Polling client for the external tag data source.
#[derive(Debug)]
pub struct TagOracle {
    client: reqwest::Client,
    url: String,
    timeout_secs: u64,
}

impl TagOracle {
    /// Build the client from configuration.
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OracleError::Unavailable {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TagSource for TagOracle {
    async fn fetch_tags(&self) -> Result<TagData, OracleError> {
        let resp = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout {
                    timeout_secs: self.timeout_secs,
                }
            } else {
                OracleError::Unavailable {
                    reason: format!("GET {}: {e}", self.url),
                }
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OracleError::Unavailable {
                reason: format!("GET {}: HTTP {status} {body}", self.url),
            });
        }

        resp.json::<TagData>()
            .await
            .map_err(|e| OracleError::Malformed {
                reason: e.to_string(),
            })
    }
}
