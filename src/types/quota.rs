use std::time::{Duration, Instant};

/// Remote character budget as of `fetched_at`.
///
/// Passed around by value; the tracker that produced it owns the refresh policy.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaSnapshot {
    pub characters_remaining: u64,
    pub character_limit: u64,
    pub percent_used: f64,
    pub fetched_at: Instant,
}

impl QuotaSnapshot {
    pub fn from_usage(characters_used: u64, character_limit: u64) -> Self {
        Self::from_usage_at(characters_used, character_limit, Instant::now())
    }

    pub fn from_usage_at(characters_used: u64, character_limit: u64, fetched_at: Instant) -> Self {
        let percent_used = if character_limit == 0 {
            100.0
        } else {
            (characters_used as f64 / character_limit as f64 * 100.0).min(100.0)
        };
        Self {
            characters_remaining: character_limit.saturating_sub(characters_used),
            character_limit,
            percent_used,
            fetched_at,
        }
    }

    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.fetched_at.elapsed() > max_age
    }

    pub fn allows(&self, characters: u64) -> bool {
        self.characters_remaining >= characters
    }

    /// Deduct locally consumed characters without refreshing.
    pub(crate) fn consume(&mut self, characters: u64) {
        self.characters_remaining = self.characters_remaining.saturating_sub(characters);
        if self.character_limit > 0 {
            let used = self.character_limit - self.characters_remaining;
            self.percent_used = used as f64 / self.character_limit as f64 * 100.0;
        }
    }
}
