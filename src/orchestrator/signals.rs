//! Counters and gauges exposed by the orchestrator.

use crate::cache::CacheStats;
use crate::resilience::UsageSnapshot;
use crate::types::QuotaSnapshot;
use std::sync::atomic::{AtomicU64, Ordering};

/// Read-only view of the pipeline counters.
///
/// Facts only: callers build dashboards or alerting on top of these numbers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub rate_limit_rejections: u64,
    pub quota_rejections: u64,
    pub transport_attempts: u64,
    pub retries: u64,
    pub primary_successes: u64,
    pub fallback_invocations: u64,
    pub fallback_failures: u64,
    /// Last known quota usage, 0-100. `None` until a quota snapshot has been fetched.
    pub quota_percent_used: Option<f64>,
}

const NO_GAUGE: u64 = u64::MAX;

/// Lock-free counters shared by every component of one orchestrator.
pub struct SynthesisMetrics {
    rate_limit_rejections: AtomicU64,
    quota_rejections: AtomicU64,
    transport_attempts: AtomicU64,
    retries: AtomicU64,
    primary_successes: AtomicU64,
    fallback_invocations: AtomicU64,
    fallback_failures: AtomicU64,
    // f64 bits; NO_GAUGE when unset
    quota_percent_used: AtomicU64,
}

impl SynthesisMetrics {
    pub fn new() -> Self {
        Self {
            rate_limit_rejections: AtomicU64::new(0),
            quota_rejections: AtomicU64::new(0),
            transport_attempts: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            primary_successes: AtomicU64::new(0),
            fallback_invocations: AtomicU64::new(0),
            fallback_failures: AtomicU64::new(0),
            quota_percent_used: AtomicU64::new(NO_GAUGE),
        }
    }

    pub fn record_rate_limit_rejection(&self) {
        self.rate_limit_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_quota_rejection(&self) {
        self.quota_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_attempt(&self) {
        self.transport_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_primary_success(&self) {
        self.primary_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self, succeeded: bool) {
        self.fallback_invocations.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.fallback_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn set_quota_percent_used(&self, percent: f64) {
        if percent.is_finite() {
            self.quota_percent_used
                .store(percent.to_bits(), Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let gauge = self.quota_percent_used.load(Ordering::Relaxed);
        MetricsSnapshot {
            rate_limit_rejections: self.rate_limit_rejections.load(Ordering::Relaxed),
            quota_rejections: self.quota_rejections.load(Ordering::Relaxed),
            transport_attempts: self.transport_attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            primary_successes: self.primary_successes.load(Ordering::Relaxed),
            fallback_invocations: self.fallback_invocations.load(Ordering::Relaxed),
            fallback_failures: self.fallback_failures.load(Ordering::Relaxed),
            quota_percent_used: (gauge != NO_GAUGE).then(|| f64::from_bits(gauge)),
        }
    }
}

impl Default for SynthesisMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything observable about one orchestrator at a point in time.
#[derive(Debug, Clone)]
pub struct SignalsSnapshot {
    pub metrics: MetricsSnapshot,
    pub cache: CacheStats,
    pub cache_entries: usize,
    pub cache_bytes: usize,
    /// Ledger window for the orchestrator's own credential.
    pub usage: UsageSnapshot,
    pub quota: Option<QuotaSnapshot>,
}
