//! Secondary candidate selection rules for a second internet connection.

use crate::session::SessionSnapshot;
use crate::types::{Band, Bssid, NetworkConfig, ScanCandidate};
use std::collections::HashMap;

/// How far a secondary internet connection may stray from the primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryPolicy {
    /// Any access point, as long as it does not collide with the primary.
    MultiAp,
    /// Same network (SSID, id and security) on another band.
    SameNetworkOnly,
}

/// Which band combinations count as different bands for the two sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandPairing {
    /// Any two distinct bands.
    DistinctBands,
    /// The radio can run two 5 GHz links: low 5 GHz pairs with high 5 GHz,
    /// 2.4 GHz pairs with anything else, and nothing else pairs.
    Dual5Ghz,
}

const LOW_5GHZ_MHZ: std::ops::RangeInclusive<u32> = 5150..=5350;
const HIGH_5GHZ_MHZ: std::ops::RangeInclusive<u32> = 5470..=5895;

impl BandPairing {
    pub fn allows(self, primary_mhz: u32, secondary_mhz: u32) -> bool {
        let primary = Band::from_frequency(primary_mhz);
        let secondary = Band::from_frequency(secondary_mhz);
        match self {
            Self::DistinctBands => primary != secondary,
            Self::Dual5Ghz => {
                if primary == Some(Band::Ghz24) || secondary == Some(Band::Ghz24) {
                    return primary != secondary;
                }
                (LOW_5GHZ_MHZ.contains(&primary_mhz) && HIGH_5GHZ_MHZ.contains(&secondary_mhz))
                    || (HIGH_5GHZ_MHZ.contains(&primary_mhz)
                        && LOW_5GHZ_MHZ.contains(&secondary_mhz))
            }
        }
    }
}

/// Candidates eligible for the secondary session next to `primary`.
///
/// An MLO primary may span several bands, so only its affiliated link BSSIDs
/// are excluded. Otherwise `pairing` decides which bands may sit beside the
/// primary. When `specified` names a BSSID for some band, only
/// candidates matching such a pin are returned.
pub fn secondary_candidates(
    candidates: &[ScanCandidate],
    primary: &SessionSnapshot,
    policy: SecondaryPolicy,
    pairing: BandPairing,
    specified: &HashMap<Band, Bssid>,
) -> Vec<ScanCandidate> {
    let primary_freq = primary.frequency_mhz.unwrap_or(0);
    let is_affiliated = |c: &ScanCandidate| primary.affiliated_bssids.contains(&c.bssid());
    let eligible: Vec<ScanCandidate> = match policy {
        SecondaryPolicy::MultiAp if primary.mlo => candidates
            .iter()
            .filter(|c| !is_affiliated(c))
            .cloned()
            .collect(),
        SecondaryPolicy::MultiAp => candidates
            .iter()
            .filter(|c| pairing.allows(primary_freq, c.frequency_mhz))
            .cloned()
            .collect(),
        SecondaryPolicy::SameNetworkOnly => {
            let Some(network) = primary.connected.as_ref() else {
                return Vec::new();
            };
            candidates
                .iter()
                .filter(|c| {
                    pairing.allows(primary_freq, c.frequency_mhz)
                        && !is_affiliated(c)
                        && c.key.ssid == network.ssid
                        && c.network_id() == network.network_id
                        && c.key.security == network.security
                })
                .cloned()
                .collect()
        }
    };
    if specified.is_empty() {
        return eligible;
    }
    eligible
        .into_iter()
        .filter(|c| {
            Band::from_frequency(c.frequency_mhz)
                .and_then(|band| specified.get(&band))
                .map_or(false, |pinned| *pinned == c.bssid())
        })
        .collect()
}

/// Whether the secondary target is the primary's own network on another
/// band (a dual-band-simultaneous access point).
pub fn is_dbs_ap(primary: &NetworkConfig, secondary: &NetworkConfig) -> bool {
    primary.ssid == secondary.ssid && primary.network_id == secondary.network_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{RadioRole, SessionId};
    use crate::types::{CandidateKey, SecurityType};

    fn candidate(id: i32, ssid: &str, n: u8, freq: u32) -> ScanCandidate {
        ScanCandidate {
            key: CandidateKey {
                network_id: id,
                ssid: ssid.to_string(),
                bssid: Bssid::new([0, 0, 0, 0, 0, n]),
                security: SecurityType::Psk,
            },
            rssi_dbm: -50,
            frequency_mhz: freq,
            passpoint: false,
            oem_paid: false,
            oem_private: false,
            carrier_id: None,
        }
    }

    fn primary() -> SessionSnapshot {
        SessionSnapshot::connected_to(
            SessionId(1),
            RadioRole::Primary,
            NetworkConfig::new(1, "home", SecurityType::Psk),
            Bssid::new([0, 0, 0, 0, 0, 1]),
            2412,
        )
    }

    fn pool() -> Vec<ScanCandidate> {
        vec![
            candidate(1, "home", 1, 2412),
            candidate(1, "home", 2, 5180),
            candidate(2, "cafe", 3, 5500),
            candidate(2, "cafe", 4, 2437),
        ]
    }

    #[test]
    fn test_multi_ap_requires_other_band() {
        let out = secondary_candidates(&pool(), &primary(), SecondaryPolicy::MultiAp, BandPairing::DistinctBands, &HashMap::new());
        assert_eq!(out, vec![candidate(1, "home", 2, 5180), candidate(2, "cafe", 3, 5500)]);
    }

    #[test]
    fn test_mlo_excludes_only_affiliated() {
        let mut mlo = primary();
        mlo.mlo = true;
        mlo.affiliated_bssids = vec![Bssid::new([0, 0, 0, 0, 0, 1]), Bssid::new([0, 0, 0, 0, 0, 2])];
        let out = secondary_candidates(&pool(), &mlo, SecondaryPolicy::MultiAp, BandPairing::DistinctBands, &HashMap::new());
        assert_eq!(out, vec![candidate(2, "cafe", 3, 5500), candidate(2, "cafe", 4, 2437)]);
    }

    #[test]
    fn test_same_network_only() {
        let out = secondary_candidates(
            &pool(),
            &primary(),
            SecondaryPolicy::SameNetworkOnly,
            BandPairing::DistinctBands,
            &HashMap::new(),
        );
        assert_eq!(out, vec![candidate(1, "home", 2, 5180)]);
    }

    #[test]
    fn test_specified_bssid_per_band() {
        let mut specified = HashMap::new();
        specified.insert(Band::Ghz5, Bssid::new([0, 0, 0, 0, 0, 3]));
        let out = secondary_candidates(&pool(), &primary(), SecondaryPolicy::MultiAp, BandPairing::DistinctBands, &specified);
        assert_eq!(out, vec![candidate(2, "cafe", 3, 5500)]);
    }

    #[test]
    fn test_dual_5ghz_pairs_low_with_high() {
        let pairing = BandPairing::Dual5Ghz;
        assert!(pairing.allows(5180, 5745));
        assert!(pairing.allows(5500, 5320));
        assert!(!pairing.allows(5180, 5240));
        assert!(!pairing.allows(5745, 5825));
        assert!(pairing.allows(2412, 5180));
        assert!(pairing.allows(5745, 2437));
        assert!(!pairing.allows(2412, 2462));
        assert!(!pairing.allows(5180, 5955));

        assert!(!BandPairing::DistinctBands.allows(5180, 5745));
        assert!(BandPairing::DistinctBands.allows(5180, 5955));
    }

    #[test]
    fn test_dual_5ghz_secondary_beside_5ghz_primary() {
        let mut primary = primary();
        primary.frequency_mhz = Some(5180);
        let pool = vec![
            candidate(1, "home", 2, 5240),
            candidate(1, "home", 3, 5745),
            candidate(1, "home", 4, 2437),
        ];
        let dual = secondary_candidates(
            &pool,
            &primary,
            SecondaryPolicy::SameNetworkOnly,
            BandPairing::Dual5Ghz,
            &HashMap::new(),
        );
        assert_eq!(dual, vec![candidate(1, "home", 3, 5745), candidate(1, "home", 4, 2437)]);

        let single = secondary_candidates(
            &pool,
            &primary,
            SecondaryPolicy::SameNetworkOnly,
            BandPairing::DistinctBands,
            &HashMap::new(),
        );
        assert_eq!(single, vec![candidate(1, "home", 4, 2437)]);
    }

    #[test]
    fn test_dbs_ap() {
        let home = NetworkConfig::new(1, "home", SecurityType::Psk);
        let cafe = NetworkConfig::new(2, "cafe", SecurityType::Psk);
        assert!(is_dbs_ap(&home, &home.clone()));
        assert!(!is_dbs_ap(&home, &cafe));
    }
}
