//! Bounded retry counters for failed scan submissions and the
//! low-RSSI background-scan backoff.

/// Maximum consecutive resubmissions of a failed scan.
pub const MAX_SCAN_RESTART_ALLOWED: u32 = 5;

/// Delay before resubmitting a failed scan.
pub const RESTART_SCAN_DELAY_MS: u64 = 2000;

/// Result of recording a scan submission failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a retry decision that is ignored leaves the scan family idle"]
pub enum RetryDecision {
    /// Resubmit after the given delay.
    RetryAfter { delay_ms: u64 },
    /// Retries exhausted; the counter has been reset.
    GiveUp,
}

/// Counts consecutive failures of one scan family.
#[derive(Debug, Clone, Default)]
pub struct ScanRetryCounter {
    failures: u32,
}

impl ScanRetryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure. `allowed` gates retrying beyond the count (e.g.
    /// single scans only retry while the screen is on).
    pub fn on_failure(&mut self, allowed: bool) -> RetryDecision {
        let previous = self.failures;
        self.failures += 1;
        if previous < MAX_SCAN_RESTART_ALLOWED && allowed {
            RetryDecision::RetryAfter {
                delay_ms: RESTART_SCAN_DELAY_MS,
            }
        } else {
            self.failures = 0;
            RetryDecision::GiveUp
        }
    }

    /// A result was delivered.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

/// Exponential backoff for background scans that only found weak networks.
#[derive(Debug, Clone)]
pub struct LowRssiBackoff {
    start_ms: u64,
    max_ms: u64,
    /// 0 until first used.
    current_ms: u64,
}

impl LowRssiBackoff {
    pub fn new(start_ms: u64, max_ms: u64) -> Self {
        Self {
            start_ms,
            max_ms,
            current_ms: 0,
        }
    }

    /// Back to the start value (candidate found, or a non-background scan started).
    pub fn reset(&mut self) {
        self.current_ms = self.start_ms;
    }

    /// Delay to use now; doubles the next delay up to the cap.
    pub fn next_delay(&mut self) -> u64 {
        if self.current_ms == 0 {
            self.reset();
        }
        let delay = self.current_ms;
        self.current_ms = self.current_ms.saturating_mul(2).min(self.max_ms);
        delay
    }

    pub fn current_ms(&self) -> u64 {
        self.current_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_up_to_max_then_gives_up() {
        let mut counter = ScanRetryCounter::new();
        for _ in 0..MAX_SCAN_RESTART_ALLOWED {
            assert_eq!(
                counter.on_failure(true),
                RetryDecision::RetryAfter { delay_ms: 2000 }
            );
        }
        assert_eq!(counter.on_failure(true), RetryDecision::GiveUp);
        assert_eq!(counter.failures(), 0);
    }

    #[test]
    fn test_gated_failure_gives_up_immediately() {
        let mut counter = ScanRetryCounter::new();
        assert_eq!(counter.on_failure(false), RetryDecision::GiveUp);
        assert_eq!(counter.failures(), 0);
    }

    #[test]
    fn test_reset_on_success() {
        let mut counter = ScanRetryCounter::new();
        let _ = counter.on_failure(true);
        let _ = counter.on_failure(true);
        counter.reset();
        assert_eq!(counter.failures(), 0);
        for _ in 0..MAX_SCAN_RESTART_ALLOWED {
            assert_ne!(counter.on_failure(true), RetryDecision::GiveUp);
        }
    }

    #[test]
    fn test_low_rssi_backoff_doubles_and_caps() {
        let mut backoff = LowRssiBackoff::new(20_000, 80_000);
        assert_eq!(backoff.current_ms(), 0);
        assert_eq!(backoff.next_delay(), 20_000);
        assert_eq!(backoff.next_delay(), 40_000);
        assert_eq!(backoff.next_delay(), 80_000);
        assert_eq!(backoff.next_delay(), 80_000);
        backoff.reset();
        assert_eq!(backoff.next_delay(), 20_000);
    }
}
