//! Utilization-aware deployment selection for interchangeable model backends.
//!
//! Given a candidate list of deployments that can all serve a request, this
//! crate picks the least utilized one based on near-real-time data from the
//! Chutes utilization API. Utilization is cached with a TTL and refreshed
//! lazily by whichever caller first observes an expired entry; concurrent
//! refreshes are coalesced into a single fetch. When the authority is slow,
//! down, or returns something unrecognizable, selection degrades to the last
//! known snapshot (or defers to the host's default policy) instead of
//! failing the request.
//!
//! The host router owns an [`UtilizationSelector`] and calls
//! [`UtilizationSelector::choose`] (or `choose_blocking`) per request. The
//! reverse proxying of the request itself, authentication of the public API,
//! and the host's fallback on [`SelectionDecision::Deferred`] are all outside
//! this crate.

pub mod cache;
pub mod config;
pub mod fetcher;
pub mod logging;
pub mod parser;
pub mod policy;
pub mod selector;

pub use cache::{CacheReading, FetchOutcome, ScoreSnapshot, UtilizationCache};
pub use config::{ConfigError, SelectorConfig};
pub use fetcher::{FetchError, UtilizationFetcher, UtilizationSource};
pub use policy::{DEFAULT_SCORE, DeploymentCandidate, LeastUtilizedPolicy, SelectionDecision};
pub use selector::{SelectorError, UtilizationSelector};
