//! Selector façade composing cache and policy
//!
//! One algorithm behind two entry points: `choose` suspends the calling
//! task during a refresh, `choose_blocking` occupies the calling thread.
//! Data-quality problems (authority down, malformed payload, stale data)
//! never surface as errors; only an empty candidate list does.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::cache::{CacheReading, UtilizationCache};
use crate::config::{ConfigError, SelectorConfig};
use crate::fetcher::{UtilizationFetcher, UtilizationSource};
use crate::policy::{DeploymentCandidate, LeastUtilizedPolicy, SelectionDecision};

/// Runtime backing the blocking entry point
static TOKIO_RT: Lazy<Runtime> =
    Lazy::new(|| Runtime::new().expect("Failed to create global Tokio runtime"));

/// Caller contract violations. Degraded data conditions are not errors and
/// never appear here.
#[derive(Debug, thiserror::Error)]
pub enum SelectorError {
    #[error("Candidate list is empty")]
    EmptyCandidateList,
}

/// Utilization-aware deployment selector.
///
/// Owns the score cache; construct one per process (or per authority) and
/// share it behind an `Arc`. Both entry points are safe to call from many
/// concurrent request-handling contexts.
pub struct UtilizationSelector {
    cache: UtilizationCache,
    policy: LeastUtilizedPolicy,
}

impl UtilizationSelector {
    /// Build a selector talking to the configured utilization authority.
    /// Fails only on configuration problems; an unreachable authority is a
    /// runtime condition handled by degradation, not construction.
    pub fn new(config: SelectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let fetcher = UtilizationFetcher::new(&config)?;
        info!(
            api_base = %config.api_base,
            cache_ttl_secs = config.cache_ttl_secs,
            fetch_timeout_secs = config.fetch_timeout_secs,
            "utilization selector initialized"
        );
        Ok(Self::with_source(
            Arc::new(fetcher),
            Duration::from_secs(config.cache_ttl_secs),
        ))
    }

    /// Build a selector from defaults plus the `CHUTES_API_KEY` environment
    /// variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(SelectorConfig::from_env())
    }

    /// Build a selector over an arbitrary score source. This is the seam
    /// embedders and tests use to bypass the HTTP fetcher.
    pub fn with_source(source: Arc<dyn UtilizationSource>, ttl: Duration) -> Self {
        Self {
            cache: UtilizationCache::new(source, ttl),
            policy: LeastUtilizedPolicy::new(),
        }
    }

    /// Pick the least utilized candidate, refreshing the score cache if it
    /// has expired. Suspends the calling task during a refresh, bounded by
    /// the fetch timeout.
    pub async fn choose(
        &self,
        candidates: &[DeploymentCandidate],
    ) -> Result<SelectionDecision, SelectorError> {
        if candidates.is_empty() {
            return Err(SelectorError::EmptyCandidateList);
        }

        let CacheReading { snapshot, fresh } = self.cache.get_or_refresh().await;
        let decision = self.policy.select(candidates, snapshot.as_deref(), fresh);

        match &decision {
            SelectionDecision::Chosen {
                chute_id,
                utilization,
                degraded,
            } => {
                if *degraded {
                    warn!(
                        policy = self.policy.name(),
                        chute_id = %chute_id,
                        utilization,
                        "selected deployment from stale utilization data"
                    );
                } else {
                    info!(
                        policy = self.policy.name(),
                        chute_id = %chute_id,
                        utilization,
                        "routing to least utilized deployment"
                    );
                }
            }
            SelectionDecision::Deferred => {
                warn!("no utilization data available, deferring to host default");
            }
        }

        Ok(decision)
    }

    /// Thread-blocking variant of [`choose`](Self::choose). Same semantics
    /// and timeout; must not be called from an async context.
    pub fn choose_blocking(
        &self,
        candidates: &[DeploymentCandidate],
    ) -> Result<SelectionDecision, SelectorError> {
        TOKIO_RT.block_on(self.choose(candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::fetcher::FetchError;
    use serde_json::{Value, json};

    /// Source that always returns the same payload (or always fails).
    struct StaticSource(Result<Value, FetchError>);

    #[async_trait]
    impl UtilizationSource for StaticSource {
        async fn fetch(&self) -> Result<Value, FetchError> {
            self.0.clone()
        }
    }

    fn selector_with(payload: Result<Value, FetchError>) -> UtilizationSelector {
        UtilizationSelector::with_source(Arc::new(StaticSource(payload)), Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_empty_candidate_list_is_an_error() {
        let selector = selector_with(Ok(json!([{"chute_id": "a", "utilization": 0.1}])));
        assert!(matches!(
            selector.choose(&[]).await,
            Err(SelectorError::EmptyCandidateList)
        ));
    }

    #[tokio::test]
    async fn test_choose_routes_to_least_utilized() {
        let selector = selector_with(Ok(json!([
            {"chute_id": "a", "utilization": 0.7},
            {"chute_id": "b", "utilization": 0.1},
        ])));
        let candidates = vec![DeploymentCandidate::new("a"), DeploymentCandidate::new("b")];

        let decision = selector.choose(&candidates).await.unwrap();
        assert_eq!(decision.chute_id(), Some("b"));
    }

    #[tokio::test]
    async fn test_fetch_failure_defers_without_error() {
        let selector = selector_with(Err(FetchError::Unreachable {
            reason: "down".to_string(),
        }));
        let candidates = vec![DeploymentCandidate::new("a")];

        let decision = selector.choose(&candidates).await.unwrap();
        assert!(decision.is_deferred());
    }

    #[test]
    fn test_choose_blocking_matches_async_semantics() {
        let selector = selector_with(Ok(json!([
            {"chute_id": "a", "utilization": 0.7},
            {"chute_id": "b", "utilization": 0.1},
        ])));
        let candidates = vec![DeploymentCandidate::new("a"), DeploymentCandidate::new("b")];

        let decision = selector.choose_blocking(&candidates).unwrap();
        assert_eq!(decision.chute_id(), Some("b"));
    }
}
