//! TTL-bounded cache of utilization snapshots
//!
//! One long-lived mutable entry, refreshed lazily by whichever caller first
//! observes it expired. Concurrent callers coalesce onto a single in-flight
//! fetch; fetch failures degrade to the previous snapshot instead of
//! erroring.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::fetcher::{FetchError, UtilizationSource};
use crate::parser;

/// An immutable, timestamped set of utilization scores. A refresh installs
/// a new snapshot; existing ones are never edited in place.
#[derive(Debug)]
pub struct ScoreSnapshot {
    scores: HashMap<String, f64>,
    captured_at: Instant,
}

impl ScoreSnapshot {
    pub fn new(scores: HashMap<String, f64>, captured_at: Instant) -> Self {
        Self {
            scores,
            captured_at,
        }
    }

    pub fn score(&self, chute_id: &str) -> Option<f64> {
        self.scores.get(chute_id).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.captured_at)
    }
}

/// Outcome of the most recent refresh attempt. Observability only; TTL
/// freshness derives from the snapshot's capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchOutcome {
    #[default]
    Never,
    Success,
    Failed,
    TimedOut,
    /// HTTP success whose payload yielded zero usable entries
    Empty,
}

#[derive(Debug, Default)]
struct CacheEntry {
    snapshot: Option<Arc<ScoreSnapshot>>,
    last_attempt: Option<Instant>,
    last_outcome: FetchOutcome,
    /// Bumped on every completed refresh attempt, success or not. Lets a
    /// coalesced waiter take the attempt's result instead of fetching again.
    generation: u64,
}

/// What a caller gets back from the cache. `fresh == false` with a present
/// snapshot means stale-but-usable data; `snapshot == None` means no data
/// was ever obtained.
#[derive(Debug, Clone)]
pub struct CacheReading {
    pub snapshot: Option<Arc<ScoreSnapshot>>,
    pub fresh: bool,
}

pub struct UtilizationCache {
    source: Arc<dyn UtilizationSource>,
    ttl: Duration,
    entry: RwLock<CacheEntry>,
    /// Single-flight guard: at most one refresh in flight per cache.
    refresh: Mutex<()>,
}

impl UtilizationCache {
    pub fn new(source: Arc<dyn UtilizationSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            entry: RwLock::new(CacheEntry::default()),
            refresh: Mutex::new(()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn last_outcome(&self) -> FetchOutcome {
        self.entry.read().await.last_outcome
    }

    pub async fn last_attempt(&self) -> Option<Instant> {
        self.entry.read().await.last_attempt
    }

    /// Return the current snapshot, refreshing it first if it is expired or
    /// absent. Fetch failures are absorbed: the previous snapshot is served
    /// stale, or `None` if no fetch ever succeeded.
    pub async fn get_or_refresh(&self) -> CacheReading {
        self.get_or_refresh_at(Instant::now()).await
    }

    /// Clock-explicit variant of [`get_or_refresh`](Self::get_or_refresh);
    /// unit tests drive TTL boundaries through it deterministically.
    pub async fn get_or_refresh_at(&self, now: Instant) -> CacheReading {
        let observed_generation = {
            let entry = self.entry.read().await;
            if let Some(reading) = Self::reading_if_fresh(&entry, now, self.ttl) {
                return reading;
            }
            entry.generation
        };

        let _flight = self.refresh.lock().await;

        // A coalesced waiter takes the result of whichever refresh completed
        // while it queued on the guard, and must not fetch again - even when
        // that refresh failed.
        {
            let entry = self.entry.read().await;
            if let Some(reading) = Self::reading_if_fresh(&entry, now, self.ttl) {
                return reading;
            }
            if entry.generation != observed_generation {
                return CacheReading {
                    snapshot: entry.snapshot.clone(),
                    fresh: false,
                };
            }
        }

        let (outcome, installed) = match self.source.fetch().await {
            Ok(raw) => {
                let parsed = parser::parse(&raw);
                if parsed.scores.is_empty() {
                    warn!(
                        shape = ?parsed.shape,
                        "utilization payload yielded no usable entries, keeping previous snapshot"
                    );
                    (FetchOutcome::Empty, None)
                } else {
                    let snapshot = Arc::new(ScoreSnapshot::new(parsed.scores, now));
                    debug!(
                        entries = snapshot.len(),
                        shape = ?parsed.shape,
                        "refreshed utilization snapshot"
                    );
                    (FetchOutcome::Success, Some(snapshot))
                }
            }
            Err(err) => {
                warn!(error = %err, "utilization fetch failed, keeping previous snapshot");
                let outcome = match err {
                    FetchError::Timeout => FetchOutcome::TimedOut,
                    _ => FetchOutcome::Failed,
                };
                (outcome, None)
            }
        };

        // Snapshot and timestamp are installed together under the write
        // lock; readers never observe a partial update.
        let mut entry = self.entry.write().await;
        entry.last_attempt = Some(now);
        entry.last_outcome = outcome;
        entry.generation += 1;
        match installed {
            Some(snapshot) => {
                entry.snapshot = Some(snapshot.clone());
                CacheReading {
                    snapshot: Some(snapshot),
                    fresh: true,
                }
            }
            // Failed refresh: keep serving the previous snapshot, marked
            // stale. Freshness is not advanced, so the next caller
            // re-attempts.
            None => CacheReading {
                snapshot: entry.snapshot.clone(),
                fresh: false,
            },
        }
    }

    fn reading_if_fresh(entry: &CacheEntry, now: Instant, ttl: Duration) -> Option<CacheReading> {
        let snapshot = entry.snapshot.as_ref()?;
        if snapshot.age(now) < ttl {
            Some(CacheReading {
                snapshot: Some(snapshot.clone()),
                fresh: true,
            })
        } else {
            None
        }
    }
}
