//! Carrier "wait before joining" policy.
//!
//! Candidates of a configured set of carriers must be seen continuously for
//! the configured delay before they are offered for selection. Only
//! non-partial scans update the first-seen record, and each such update
//! replaces it wholesale: a key that drops out of a full view starts over.

use crate::types::{CandidateKey, CarrierId, ScanCandidate};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Result of one pass of the delayed-carrier filter.
#[derive(Debug, Clone, PartialEq)]
pub struct CarrierFilterOutcome {
    pub candidates: Vec<ScanCandidate>,
    /// Candidates of a delayed carrier were present; a re-check scan may be needed.
    pub has_delayed: bool,
}

#[derive(Debug, Clone)]
pub struct DelayedCarrierFilter {
    carrier_ids: HashSet<CarrierId>,
    delay_ms: u64,
    first_seen_ms: HashMap<CandidateKey, u64>,
    frequencies: BTreeSet<u32>,
}

impl DelayedCarrierFilter {
    pub fn new(carrier_ids: impl IntoIterator<Item = CarrierId>, delay_ms: u64) -> Self {
        Self {
            carrier_ids: carrier_ids.into_iter().collect(),
            delay_ms,
            first_seen_ms: HashMap::new(),
            frequencies: BTreeSet::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.carrier_ids.is_empty()
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    /// Frequencies the delayed candidates were last seen on.
    pub fn frequencies(&self) -> Vec<u32> {
        self.frequencies.iter().copied().collect()
    }

    pub fn tracked(&self) -> usize {
        self.first_seen_ms.len()
    }

    pub fn clear(&mut self) {
        self.first_seen_ms.clear();
        self.frequencies.clear();
    }

    fn is_delayed(&self, candidate: &ScanCandidate) -> bool {
        candidate
            .carrier_id
            .map_or(false, |id| self.carrier_ids.contains(&id))
    }

    pub fn filter(
        &mut self,
        candidates: Vec<ScanCandidate>,
        not_partial: bool,
        now_ms: u64,
    ) -> CarrierFilterOutcome {
        if !self.is_active() {
            return CarrierFilterOutcome {
                candidates,
                has_delayed: false,
            };
        }
        if candidates.is_empty() {
            if not_partial {
                self.first_seen_ms.clear();
            }
            return CarrierFilterOutcome {
                candidates,
                has_delayed: false,
            };
        }

        let (delayed, unaffected): (Vec<_>, Vec<_>) =
            candidates.into_iter().partition(|c| self.is_delayed(c));

        if not_partial {
            let mut updated = HashMap::with_capacity(delayed.len());
            let mut frequencies = BTreeSet::new();
            for candidate in &delayed {
                let first_seen = self
                    .first_seen_ms
                    .get(&candidate.key)
                    .copied()
                    .unwrap_or(now_ms);
                updated.insert(candidate.key.clone(), first_seen);
                frequencies.insert(candidate.frequency_mhz);
            }
            self.first_seen_ms = updated;
            self.frequencies = frequencies;
        }

        if delayed.is_empty() {
            return CarrierFilterOutcome {
                candidates: unaffected,
                has_delayed: false,
            };
        }

        let total_delayed = delayed.len();
        let mut eligible: Vec<ScanCandidate> = delayed
            .into_iter()
            .filter(|c| {
                let first_seen = self.first_seen_ms.get(&c.key).copied().unwrap_or(now_ms);
                now_ms.saturating_sub(first_seen) > self.delay_ms
            })
            .collect();
        log::info!(
            "{} of {} delayed carrier candidates are eligible for network selection",
            eligible.len(),
            total_delayed
        );
        eligible.extend(unaffected);
        CarrierFilterOutcome {
            candidates: eligible,
            has_delayed: true,
        }
    }
}
