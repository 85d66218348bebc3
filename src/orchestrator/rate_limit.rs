//! Connection attempt rate limiting.
//!
//! Attempts are timestamped in insertion order. Before every capacity check,
//! entries older than the trailing window are evicted from the front. The
//! gate is only enforced while the screen is off; screen-on attempts are
//! still recorded. Only the newest `max_attempts` entries can decide the
//! gate, so the queue never holds more than that.

use std::collections::VecDeque;

/// Attempts allowed within the window while the screen is off.
pub const MAX_CONNECTION_ATTEMPTS_RATE: usize = 6;

/// Trailing window for the attempt count.
pub const MAX_CONNECTION_ATTEMPTS_TIME_INTERVAL_MS: u64 = 4 * 60 * 1000;

/// Outcome of asking the rate limiter for permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a rate-limited attempt must not reach the radio"]
pub enum AttemptDecision {
    Allowed,
    RateLimited,
}

#[derive(Debug, Clone)]
pub struct ConnectionAttemptHistory {
    timestamps_ms: VecDeque<u64>,
    max_attempts: usize,
    window_ms: u64,
    rate_limited_total: u64,
}

impl Default for ConnectionAttemptHistory {
    fn default() -> Self {
        Self::new(
            MAX_CONNECTION_ATTEMPTS_RATE,
            MAX_CONNECTION_ATTEMPTS_TIME_INTERVAL_MS,
        )
    }
}

impl ConnectionAttemptHistory {
    pub fn new(max_attempts: usize, window_ms: u64) -> Self {
        Self {
            timestamps_ms: VecDeque::with_capacity(max_attempts + 1),
            max_attempts,
            window_ms,
            rate_limited_total: 0,
        }
    }

    fn evict_expired(&mut self, now_ms: u64) {
        while let Some(&oldest) = self.timestamps_ms.front() {
            if now_ms.saturating_sub(oldest) > self.window_ms {
                self.timestamps_ms.pop_front();
            } else {
                break;
            }
        }
    }

    /// Whether the window is full.
    pub fn should_skip(&mut self, now_ms: u64) -> bool {
        self.evict_expired(now_ms);
        self.timestamps_ms.len() >= self.max_attempts
    }

    pub fn note_attempt(&mut self, now_ms: u64) {
        self.evict_expired(now_ms);
        self.timestamps_ms.push_back(now_ms);
        while self.timestamps_ms.len() > self.max_attempts {
            self.timestamps_ms.pop_front();
        }
    }

    /// Gate an attempt. Allowed attempts are recorded.
    pub fn try_attempt(&mut self, now_ms: u64, screen_on: bool) -> AttemptDecision {
        if !screen_on && self.should_skip(now_ms) {
            self.rate_limited_total += 1;
            return AttemptDecision::RateLimited;
        }
        self.note_attempt(now_ms);
        AttemptDecision::Allowed
    }

    /// Forget all attempts (explicit user connection or forced scan).
    pub fn clear(&mut self) {
        self.timestamps_ms.clear();
    }

    pub fn len(&self) -> usize {
        self.timestamps_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps_ms.is_empty()
    }

    pub fn rate_limited_total(&self) -> u64 {
        self.rate_limited_total
    }
}
