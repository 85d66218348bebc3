//! Cache of the most recent filtered candidates, reused to retry quickly
//! after a connection failure instead of waiting for the next scan.

use crate::types::{Bssid, NetworkConfig, NetworkId, ScanCandidate};

/// Validity of the cached candidates, and how long a failed BSSID stays
/// blocked when a retry is issued.
pub const TEMP_BSSID_BLOCK_DURATION_MS: u64 = 10 * 1000;

/// What caused the retry filter to stop.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum RetryPrune {
    /// Nothing cached, or the cache is too old. The cache is now empty.
    Stale,
    /// Filtering removed nothing, so a retry would pick the same network.
    Unchanged,
    /// The cache now holds only viable candidates.
    Pruned(Vec<ScanCandidate>),
}

#[derive(Debug, Clone, Default)]
pub struct LatestCandidates {
    candidates: Vec<ScanCandidate>,
    stored_at_ms: u64,
}

impl LatestCandidates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&mut self, candidates: Vec<ScanCandidate>, now_ms: u64) {
        self.candidates = candidates;
        self.stored_at_ms = now_ms;
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
        self.stored_at_ms = 0;
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn stored_at_ms(&self) -> u64 {
        self.stored_at_ms
    }

    /// Drop candidates that should not be retried after `failed_bssid` of
    /// `failed` could not be joined.
    ///
    /// `lookup` returns the current config of a network id, if it still exists.
    pub fn prune_for_retry<F>(
        &mut self,
        failed_bssid: Bssid,
        failed: &NetworkConfig,
        ignore_same_network: bool,
        now_ms: u64,
        lookup: F,
    ) -> RetryPrune
    where
        F: Fn(NetworkId) -> Option<NetworkConfig>,
    {
        if self.candidates.is_empty()
            || now_ms.saturating_sub(self.stored_at_ms) > TEMP_BSSID_BLOCK_DURATION_MS
        {
            self.clear();
            return RetryPrune::Stale;
        }
        let before = self.candidates.len();
        self.candidates.retain(|c| {
            if ignore_same_network && c.key.matches_network(&failed.ssid, failed.security) {
                return false;
            }
            if c.bssid() == failed_bssid {
                return false;
            }
            lookup(c.network_id()).map_or(false, |config| config.is_autojoin_eligible())
        });
        if self.candidates.len() == before {
            return RetryPrune::Unchanged;
        }
        RetryPrune::Pruned(self.candidates.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CandidateKey, SecurityType};

    fn candidate(id: NetworkId, ssid: &str, n: u8) -> ScanCandidate {
        ScanCandidate {
            key: CandidateKey {
                network_id: id,
                ssid: ssid.to_string(),
                bssid: Bssid::new([0, 0, 0, 0, 0, n]),
                security: SecurityType::Eap,
            },
            rssi_dbm: -60,
            frequency_mhz: 5180,
            passpoint: false,
            oem_paid: false,
            oem_private: false,
            carrier_id: None,
        }
    }

    fn registry(id: NetworkId) -> Option<NetworkConfig> {
        let ssid = if id == 1 { "S" } else { "T" };
        Some(NetworkConfig::new(id, ssid, SecurityType::Eap))
    }

    fn cache() -> LatestCandidates {
        let mut cache = LatestCandidates::new();
        cache.store(
            vec![candidate(1, "S", 1), candidate(1, "S", 2), candidate(2, "T", 3)],
            1_000,
        );
        cache
    }

    #[test]
    fn test_auth_failure_excludes_whole_network() {
        let mut cache = cache();
        let failed = NetworkConfig::new(1, "S", SecurityType::Eap);
        let out = cache.prune_for_retry(Bssid::new([0, 0, 0, 0, 0, 1]), &failed, true, 2_000, registry);
        assert_eq!(out, RetryPrune::Pruned(vec![candidate(2, "T", 3)]));
    }

    #[test]
    fn test_other_failure_excludes_only_bssid() {
        let mut cache = cache();
        let failed = NetworkConfig::new(1, "S", SecurityType::Eap);
        let out = cache.prune_for_retry(Bssid::new([0, 0, 0, 0, 0, 1]), &failed, false, 2_000, registry);
        assert_eq!(
            out,
            RetryPrune::Pruned(vec![candidate(1, "S", 2), candidate(2, "T", 3)])
        );
    }

    #[test]
    fn test_stale_cache_is_cleared() {
        let mut cache = cache();
        let failed = NetworkConfig::new(1, "S", SecurityType::Eap);
        let out = cache.prune_for_retry(
            Bssid::new([0, 0, 0, 0, 0, 1]),
            &failed,
            false,
            1_000 + TEMP_BSSID_BLOCK_DURATION_MS + 1,
            registry,
        );
        assert_eq!(out, RetryPrune::Stale);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unrelated_bssid_is_unchanged() {
        let mut cache = cache();
        let failed = NetworkConfig::new(5, "U", SecurityType::Eap);
        let out = cache.prune_for_retry(Bssid::new([9; 6]), &failed, false, 2_000, registry);
        assert_eq!(out, RetryPrune::Unchanged);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_disabled_networks_are_dropped() {
        let mut cache = cache();
        let failed = NetworkConfig::new(5, "U", SecurityType::Eap);
        let out = cache.prune_for_retry(Bssid::new([9; 6]), &failed, false, 2_000, |id| {
            let mut config = registry(id)?;
            config.allow_autojoin = id != 2;
            Some(config)
        });
        assert_eq!(
            out,
            RetryPrune::Pruned(vec![candidate(1, "S", 1), candidate(1, "S", 2)])
        );
    }
}
