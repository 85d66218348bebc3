//! Candidate stability filter for a fast-moving device.
//!
//! While moving quickly, a network that looks good in one scan may be gone in
//! the next. Candidates are only kept if they were also seen in the previous
//! non-partial scan with an RSSI within `rssi_delta`. Otherwise the engine
//! re-scans the same frequencies after `min_scan_delay_ms` to confirm.

use crate::types::{CandidateKey, ScanCandidate};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
struct CachedCandidates {
    time_ms: u64,
    /// `None` when the cached scan had no candidates.
    rssi: Option<HashMap<CandidateKey, i32>>,
    frequencies: BTreeSet<u32>,
}

impl CachedCandidates {
    fn new(time_ms: u64, candidates: Option<&[ScanCandidate]>) -> Self {
        match candidates {
            None => Self {
                time_ms,
                rssi: None,
                frequencies: BTreeSet::new(),
            },
            Some(list) => Self {
                time_ms,
                rssi: Some(
                    list.iter()
                        .map(|c| (c.key.clone(), c.rssi_dbm))
                        .collect(),
                ),
                frequencies: list.iter().map(|c| c.frequency_mhz).collect(),
            },
        }
    }
}

/// Result of the high-movement filter.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "a suppressed outcome may require scheduling a confirmation scan"]
pub enum HighMovementOutcome {
    /// Stable candidates to continue with.
    Stable(Vec<ScanCandidate>),
    /// Nothing to connect to this round.
    Suppressed {
        /// Confirmation scan delay, when one should be scheduled.
        rescan_after_ms: Option<u64>,
    },
}

#[derive(Debug, Clone)]
pub struct HighMovementFilter {
    min_scan_delay_ms: u64,
    rssi_delta: i32,
    cache: Option<CachedCandidates>,
}

impl HighMovementFilter {
    pub fn new(min_scan_delay_ms: u64, rssi_delta: i32) -> Self {
        Self {
            min_scan_delay_ms,
            rssi_delta,
            cache: None,
        }
    }

    /// Frequencies of the cached candidates, for the confirmation scan.
    pub fn cached_frequencies(&self) -> Vec<u32> {
        self.cache
            .as_ref()
            .map(|c| c.frequencies.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn cached_at_ms(&self) -> Option<u64> {
        self.cache.as_ref().map(|c| c.time_ms)
    }

    pub fn clear(&mut self) {
        self.cache = None;
    }

    pub fn filter(
        &mut self,
        candidates: Vec<ScanCandidate>,
        not_partial: bool,
        now_ms: u64,
    ) -> HighMovementOutcome {
        if candidates.is_empty() {
            if not_partial {
                self.cache = Some(CachedCandidates::new(now_ms, None));
            }
            return HighMovementOutcome::Suppressed {
                rescan_after_ms: None,
            };
        }

        if let Some(CachedCandidates {
            time_ms,
            rssi: Some(rssi),
            ..
        }) = &self.cache
        {
            if now_ms.saturating_sub(*time_ms) < self.min_scan_delay_ms {
                return HighMovementOutcome::Suppressed {
                    rescan_after_ms: None,
                };
            }
            let stable: Vec<ScanCandidate> = candidates
                .iter()
                .filter(|c| {
                    rssi.get(&c.key)
                        .map_or(false, |cached| (cached - c.rssi_dbm).abs() < self.rssi_delta)
                })
                .cloned()
                .collect();
            if !stable.is_empty() {
                if not_partial {
                    self.cache = Some(CachedCandidates::new(now_ms, Some(&candidates)));
                }
                return HighMovementOutcome::Stable(stable);
            }
        }

        if not_partial {
            self.cache = Some(CachedCandidates::new(now_ms, Some(&candidates)));
            log::info!(
                "Found {} candidates at high mobility state. Re-doing scan to confirm network quality.",
                candidates.len()
            );
            return HighMovementOutcome::Suppressed {
                rescan_after_ms: Some(self.min_scan_delay_ms),
            };
        }
        HighMovementOutcome::Suppressed {
            rescan_after_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bssid, SecurityType};

    fn candidate(n: u8, rssi: i32, freq: u32) -> ScanCandidate {
        ScanCandidate {
            key: CandidateKey {
                network_id: i32::from(n),
                ssid: format!("net{}", n),
                bssid: Bssid::new([0, 0, 0, 0, 0, n]),
                security: SecurityType::Psk,
            },
            rssi_dbm: rssi,
            frequency_mhz: freq,
            passpoint: false,
            oem_paid: false,
            oem_private: false,
            carrier_id: None,
        }
    }

    #[test]
    fn test_first_sighting_is_suppressed_and_rescans() {
        let mut filter = HighMovementFilter::new(30_000, 8);
        let out = filter.filter(vec![candidate(1, -60, 5180)], true, 0);
        assert_eq!(
            out,
            HighMovementOutcome::Suppressed {
                rescan_after_ms: Some(30_000)
            }
        );
        assert_eq!(filter.cached_frequencies(), vec![5180]);
    }

    #[test]
    fn test_fresh_cache_suppresses_regardless_of_content() {
        let mut filter = HighMovementFilter::new(30_000, 8);
        let _ = filter.filter(vec![candidate(1, -60, 5180)], true, 99_000);
        // Cache is 1s old at t=100s, below the 30s minimum.
        let out = filter.filter(vec![candidate(1, -60, 5180)], true, 100_000);
        assert_eq!(
            out,
            HighMovementOutcome::Suppressed {
                rescan_after_ms: None
            }
        );
    }

    #[test]
    fn test_stable_candidates_pass_after_delay() {
        let mut filter = HighMovementFilter::new(30_000, 8);
        let _ = filter.filter(
            vec![candidate(1, -60, 5180), candidate(2, -70, 2412)],
            true,
            0,
        );
        let out = filter.filter(
            vec![candidate(1, -65, 5180), candidate(2, -50, 2412)],
            false,
            31_000,
        );
        // Only candidate 1 moved by less than 8 dB.
        assert_eq!(out, HighMovementOutcome::Stable(vec![candidate(1, -65, 5180)]));
        // Partial scans do not refresh the cache.
        assert_eq!(filter.cached_at_ms(), Some(0));
    }

    #[test]
    fn test_delta_is_strict() {
        let mut filter = HighMovementFilter::new(1_000, 8);
        let _ = filter.filter(vec![candidate(1, -60, 5180)], true, 0);
        let out = filter.filter(vec![candidate(1, -68, 5180)], true, 2_000);
        assert_eq!(
            out,
            HighMovementOutcome::Suppressed {
                rescan_after_ms: Some(1_000)
            }
        );
    }

    #[test]
    fn test_unstable_partial_scan_does_not_reschedule() {
        let mut filter = HighMovementFilter::new(1_000, 8);
        let _ = filter.filter(vec![candidate(1, -60, 5180)], true, 0);
        let out = filter.filter(vec![candidate(2, -60, 2412)], false, 2_000);
        assert_eq!(
            out,
            HighMovementOutcome::Suppressed {
                rescan_after_ms: None
            }
        );
        assert_eq!(filter.cached_frequencies(), vec![5180]);
    }

    #[test]
    fn test_empty_full_scan_resets_cache() {
        let mut filter = HighMovementFilter::new(30_000, 8);
        let _ = filter.filter(vec![candidate(1, -60, 5180)], true, 0);
        let _ = filter.filter(Vec::new(), true, 1_000);
        assert_eq!(filter.cached_at_ms(), Some(1_000));
        assert!(filter.cached_frequencies().is_empty());
        // With no RSSI map the next sighting is treated as new.
        let out = filter.filter(vec![candidate(1, -60, 5180)], true, 2_000);
        assert_eq!(
            out,
            HighMovementOutcome::Suppressed {
                rescan_after_ms: Some(30_000)
            }
        );
    }
}
