//! Per-credential sliding-window usage ledger.

use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub max_requests: u32,
    /// Optional cap on characters recorded within one window.
    pub max_characters: Option<u64>,
    pub window: Duration,
}

impl LedgerConfig {
    pub fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            max_characters: None,
            window: Duration::from_secs(60),
        }
    }

    pub fn with_max_characters(mut self, max: Option<u64>) -> Self {
        self.max_characters = max;
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::per_minute(60)
    }
}

/// Request slots reserved and characters recorded within the current window.
#[derive(Debug, Default)]
pub struct UsageWindow {
    requests: VecDeque<Instant>,
    characters: VecDeque<(Instant, u64)>,
    character_total: u64,
}

impl UsageWindow {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&t) = self.requests.front() {
            if now.duration_since(t) >= window {
                self.requests.pop_front();
            } else {
                break;
            }
        }
        while let Some(&(t, n)) = self.characters.front() {
            if now.duration_since(t) >= window {
                self.characters.pop_front();
                self.character_total -= n;
            } else {
                break;
            }
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    pub fn character_count(&self) -> u64 {
        self.character_total
    }
}

/// A request slot handed out by [`UsageLedger::try_acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a reservation must be released if the request is abandoned"]
pub struct Reservation {
    at: Instant,
}

impl Reservation {
    pub fn reserved_at(&self) -> Instant {
        self.at
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsageSnapshot {
    pub requests_in_window: u32,
    pub characters_in_window: u64,
    pub remaining_requests: u32,
    pub remaining_characters: Option<u64>,
    /// Time until the oldest reserved slot leaves the window, when full.
    pub retry_after: Option<Duration>,
}

/// Sliding-window admission control shared by every caller of one process.
///
/// [`try_acquire`](Self::try_acquire) checks and reserves a request slot in one
/// critical section. Characters count against the budget only once
/// [`record`](Self::record) is called after a successful provider call, so a
/// concurrent burst may overshoot the character cap by at most one request
/// each.
pub struct UsageLedger {
    config: LedgerConfig,
    windows: RwLock<HashMap<String, Arc<Mutex<UsageWindow>>>>,
}

impl UsageLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            windows: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn window(&self, credential: &str) -> Arc<Mutex<UsageWindow>> {
        if let Some(w) = self.windows.read().get(credential) {
            return w.clone();
        }
        self.windows
            .write()
            .entry(credential.to_string())
            .or_default()
            .clone()
    }

    /// Reserve a request slot, or `None` when the window is full.
    pub fn try_acquire(&self, credential: &str, characters: u64) -> Option<Reservation> {
        let window = self.window(credential);
        let mut w = window.lock();
        let now = Instant::now();
        w.prune(now, self.config.window);

        if w.requests.len() >= self.config.max_requests as usize {
            return None;
        }
        if let Some(max) = self.config.max_characters {
            if w.character_total + characters > max {
                return None;
            }
        }
        w.requests.push_back(now);
        Some(Reservation { at: now })
    }

    /// Count characters consumed by a successful call.
    pub fn record(&self, credential: &str, characters: u64) {
        let window = self.window(credential);
        let mut w = window.lock();
        let now = Instant::now();
        w.prune(now, self.config.window);
        w.characters.push_back((now, characters));
        w.character_total += characters;
    }

    /// Return the slot of a request that never left the process.
    ///
    /// Only the reserved entry is removed; slots taken by other callers since
    /// keep their place in the window.
    pub fn release(&self, credential: &str, reservation: Reservation) {
        let window = self.window(credential);
        let mut w = window.lock();
        if let Some(pos) = w.requests.iter().rposition(|t| *t == reservation.at) {
            w.requests.remove(pos);
        }
    }

    pub fn snapshot(&self, credential: &str) -> UsageSnapshot {
        let window = self.window(credential);
        let mut w = window.lock();
        let now = Instant::now();
        w.prune(now, self.config.window);

        let used = w.requests.len() as u32;
        let retry_after = if used >= self.config.max_requests {
            w.requests
                .front()
                .map(|t| self.config.window.saturating_sub(now.duration_since(*t)))
        } else {
            None
        };
        UsageSnapshot {
            requests_in_window: used,
            characters_in_window: w.character_total,
            remaining_requests: self.config.max_requests.saturating_sub(used),
            remaining_characters: self
                .config
                .max_characters
                .map(|m| m.saturating_sub(w.character_total)),
            retry_after,
        }
    }
}

/// Stable, non-reversible identifier for a credential.
pub fn credential_fingerprint(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}
