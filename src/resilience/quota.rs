//! Cached view of the remote character quota.

use crate::orchestrator::SynthesisMetrics;
use crate::transport::TransportError;
use crate::types::QuotaSnapshot;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Anything that can report the account's remaining characters.
#[async_trait]
pub trait QuotaSource: Send + Sync {
    async fn fetch_quota(&self) -> Result<QuotaSnapshot>;
}

/// Holds the last [`QuotaSnapshot`] and refreshes it when stale.
///
/// At most one refresh is in flight; concurrent readers that find the snapshot
/// stale wait for that refresh instead of issuing their own. A failed or
/// timed-out refresh keeps serving the last known snapshot.
pub struct QuotaTracker {
    source: Arc<dyn QuotaSource>,
    refresh_interval: Duration,
    current: RwLock<Option<QuotaSnapshot>>,
    refresh_lock: tokio::sync::Mutex<()>,
    fetch_timeout: Option<Duration>,
    metrics: Option<Arc<SynthesisMetrics>>,
}

impl QuotaTracker {
    pub fn new(source: Arc<dyn QuotaSource>, refresh_interval: Duration) -> Self {
        Self {
            source,
            refresh_interval,
            current: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
            fetch_timeout: None,
            metrics: None,
        }
    }

    /// Upper bound on a single refresh call.
    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<SynthesisMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Last known snapshot without any network activity.
    pub fn cached(&self) -> Option<QuotaSnapshot> {
        self.current.read().clone()
    }

    fn fresh(&self) -> Option<QuotaSnapshot> {
        self.current
            .read()
            .as_ref()
            .filter(|s| !s.is_stale(self.refresh_interval))
            .cloned()
    }

    /// Return a snapshot no older than the refresh interval, refreshing if needed.
    ///
    /// `None` only when no refresh has ever succeeded.
    pub async fn get_snapshot(&self, force_refresh: bool) -> Option<QuotaSnapshot> {
        if !force_refresh {
            if let Some(s) = self.fresh() {
                return Some(s);
            }
        }

        let requested_at = Instant::now();
        let _guard = self.refresh_lock.lock().await;

        // another caller may have refreshed while we waited
        if let Some(s) = self.current.read().as_ref() {
            if s.fetched_at >= requested_at || (!force_refresh && !s.is_stale(self.refresh_interval)) {
                return Some(s.clone());
            }
        }

        let fetched = match self.fetch_timeout {
            Some(t) => tokio::time::timeout(t, self.source.fetch_quota())
                .await
                .unwrap_or_else(|_| Err(Error::Transport(TransportError::Timeout(t)))),
            None => self.source.fetch_quota().await,
        };

        match fetched {
            Ok(snapshot) => {
                debug!(
                    characters_remaining = snapshot.characters_remaining,
                    character_limit = snapshot.character_limit,
                    percent_used = snapshot.percent_used,
                    "quota refreshed"
                );
                if let Some(m) = &self.metrics {
                    m.set_quota_percent_used(snapshot.percent_used);
                }
                *self.current.write() = Some(snapshot.clone());
                Some(snapshot)
            }
            Err(e) => {
                let last = self.cached();
                warn!(error = %e, have_last = last.is_some(), "quota refresh failed, using last known snapshot");
                last
            }
        }
    }

    /// Deduct characters consumed since the last refresh.
    pub fn record_usage(&self, characters: u64) {
        let mut current = self.current.write();
        if let Some(s) = current.as_mut() {
            s.consume(characters);
            if let Some(m) = &self.metrics {
                m.set_quota_percent_used(s.percent_used);
            }
        }
    }
}
