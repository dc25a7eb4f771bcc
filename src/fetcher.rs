//! Bounded-timeout fetch from the utilization authority

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::config::{ConfigError, SelectorConfig};

/// Path of the utilization endpoint, relative to the configured base URL
pub const UTILIZATION_PATH: &str = "/chutes/utilization";

/// Header carrying the credential
pub const API_KEY_HEADER: &str = "X-API-Key";

/// How a single utilization fetch can fail. All variants are non-fatal to
/// the process; the cache absorbs them and keeps serving the last known
/// snapshot.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("Missing or rejected credential")]
    Unauthorized,
    #[error("Utilization authority timed out")]
    Timeout,
    #[error("Utilization authority unreachable: {reason}")]
    Unreachable { reason: String },
    #[error("Utilization authority returned a non-JSON body: {reason}")]
    MalformedTransport { reason: String },
}

/// Source of raw utilization payloads. The cache depends on this seam, not
/// on the HTTP client, so tests can script outcomes.
#[async_trait]
pub trait UtilizationSource: Send + Sync {
    async fn fetch(&self) -> Result<Value, FetchError>;
}

/// HTTP implementation of [`UtilizationSource`].
///
/// One GET per call, authenticated via `X-API-Key`, bounded by the
/// client-level timeout. Never retries; retry policy belongs to the caller,
/// and the cache re-attempts on every expiry check anyway.
pub struct UtilizationFetcher {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl UtilizationFetcher {
    pub fn new(config: &SelectorConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(|e| ConfigError::ClientBuild {
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}{}",
                config.api_base.trim_end_matches('/'),
                UTILIZATION_PATH
            ),
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl UtilizationSource for UtilizationFetcher {
    async fn fetch(&self) -> Result<Value, FetchError> {
        // No credential: fail fast without hitting the network.
        if self.api_key.is_empty() {
            return Err(FetchError::Unauthorized);
        }

        debug!(endpoint = %self.endpoint, "fetching utilization");
        let response = self
            .client
            .get(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized);
        }
        if !status.is_success() {
            return Err(FetchError::Unreachable {
                reason: format!("authority returned {status}"),
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::MalformedTransport {
                    reason: e.to_string(),
                }
            }
        })
    }
}

fn classify_transport_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Unreachable {
            reason: err.to_string(),
        }
    }
}
