//! Value types shared across the engine.
//!
//! Candidates are keyed by [`CandidateKey`], a plain value with structural
//! equality and hashing, so every cache in the engine is an ordinary
//! `HashMap<CandidateKey, _>` with explicit eviction.

use std::fmt;
use std::str::FromStr;

/// Persisted configuration id of a saved or suggested network.
pub type NetworkId = i32;

/// Placeholder for "no network".
pub const INVALID_NETWORK_ID: NetworkId = -1;

/// Carrier identifier attached to carrier-provisioned networks.
pub type CarrierId = i32;

/// MAC address of one access-point radio.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bssid([u8; 6]);

impl Bssid {
    /// Wildcard target letting firmware pick the access point.
    pub const ANY: Bssid = Bssid([0xff; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_any(&self) -> bool {
        *self == Self::ANY
    }
}

impl fmt::Display for Bssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            return f.write_str("any");
        }
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a, b, c, d, e, g
        )
    }
}

impl fmt::Debug for Bssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bssid({})", self)
    }
}

/// Error parsing a BSSID string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BssidParseError {
    /// Not six colon-separated groups.
    WrongLength(usize),
    /// A group is not a two-digit hex number.
    InvalidOctet(String),
}

impl fmt::Display for BssidParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongLength(n) => write!(f, "expected 6 octets, got {}", n),
            Self::InvalidOctet(s) => write!(f, "invalid octet '{}'", s),
        }
    }
}

impl std::error::Error for BssidParseError {}

impl FromStr for Bssid {
    type Err = BssidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("any") {
            return Ok(Self::ANY);
        }
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(BssidParseError::WrongLength(parts.len()));
        }
        let mut octets = [0u8; 6];
        for (slot, part) in octets.iter_mut().zip(parts) {
            if part.len() != 2 {
                return Err(BssidParseError::InvalidOctet(part.to_string()));
            }
            *slot = u8::from_str_radix(part, 16)
                .map_err(|_| BssidParseError::InvalidOctet(part.to_string()))?;
        }
        Ok(Self(octets))
    }
}

/// Security type of a network as matched against scan results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityType {
    Open,
    Owe,
    Wep,
    Psk,
    Sae,
    Eap,
    EapSuiteB192,
    Wapi,
}

/// Frequency band of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    Ghz24,
    Ghz5,
    Ghz6,
    Ghz60,
}

impl Band {
    pub fn from_frequency(mhz: u32) -> Option<Band> {
        match mhz {
            2400..=2500 => Some(Band::Ghz24),
            4900..=5900 => Some(Band::Ghz5),
            5925..=7125 => Some(Band::Ghz6),
            58_320..=70_200 => Some(Band::Ghz60),
            _ => None,
        }
    }
}

/// Identity of one (network, access point) pairing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateKey {
    pub network_id: NetworkId,
    pub ssid: String,
    pub bssid: Bssid,
    pub security: SecurityType,
}

impl CandidateKey {
    /// Same network in the scan-matching sense (SSID plus security type).
    pub fn matches_network(&self, ssid: &str, security: SecurityType) -> bool {
        self.ssid == ssid && self.security == security
    }
}

/// A connectable candidate produced by the candidate provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanCandidate {
    pub key: CandidateKey,
    pub rssi_dbm: i32,
    pub frequency_mhz: u32,
    pub passpoint: bool,
    pub oem_paid: bool,
    pub oem_private: bool,
    /// Carrier of the owning network, if carrier-provisioned.
    pub carrier_id: Option<CarrierId>,
}

impl ScanCandidate {
    pub fn network_id(&self) -> NetworkId {
        self.key.network_id
    }

    pub fn bssid(&self) -> Bssid {
        self.key.bssid
    }

    pub fn is_oem_restricted(&self) -> bool {
        self.oem_paid || self.oem_private
    }
}

/// One raw scan result as delivered by the scan issuer.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanDetail {
    pub ssid: String,
    pub bssid: Bssid,
    pub frequency_mhz: u32,
    pub rssi_dbm: i32,
    /// Background scan results may arrive without information elements.
    pub has_information_elements: bool,
    /// Number of radio chains the result was received on, when reported.
    pub radio_chains: Option<u8>,
}

/// MAC randomization setting of a saved network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacRandomization {
    /// Factory MAC. Two sessions can never both use it.
    None,
    Persistent,
    NonPersistent,
    Auto,
}

/// Persisted configuration of a network, as exposed by the network registry.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    pub network_id: NetworkId,
    pub ssid: String,
    pub security: SecurityType,
    /// Configured BSSID override; `Some(Bssid::ANY)` means no override.
    pub bssid_override: Option<Bssid>,
    pub carrier_id: Option<CarrierId>,
    pub passpoint: bool,
    pub ephemeral: bool,
    pub oem_paid: bool,
    pub oem_private: bool,
    /// Last connected by explicit user choice.
    pub user_selected: bool,
    pub mac_randomization: MacRandomization,
    pub static_ip: bool,
    pub allow_autojoin: bool,
    /// Network selection status is enabled (not temporarily or permanently disabled).
    pub selection_enabled: bool,
    pub temporarily_disabled_by_user: bool,
    /// Restricted by device admin policy; never auto-retried.
    pub admin_restricted: bool,
    /// Networks treated as interchangeable for roaming.
    pub linked_networks: Vec<NetworkId>,
}

impl NetworkConfig {
    /// Minimal enabled config, mostly useful as a base for struct update syntax.
    pub fn new(network_id: NetworkId, ssid: impl Into<String>, security: SecurityType) -> Self {
        Self {
            network_id,
            ssid: ssid.into(),
            security,
            bssid_override: None,
            carrier_id: None,
            passpoint: false,
            ephemeral: false,
            oem_paid: false,
            oem_private: false,
            user_selected: false,
            mac_randomization: MacRandomization::Persistent,
            static_ip: false,
            allow_autojoin: true,
            selection_enabled: true,
            temporarily_disabled_by_user: false,
            admin_restricted: false,
            linked_networks: Vec::new(),
        }
    }

    /// A concrete BSSID pinned by configuration, ignoring the wildcard.
    pub fn pinned_bssid(&self) -> Option<Bssid> {
        self.bssid_override.filter(|b| !b.is_any())
    }

    pub fn is_linked(&self, other: &NetworkConfig) -> bool {
        self.linked_networks.contains(&other.network_id)
    }

    /// Eligible for automatic (re)connection.
    pub fn is_autojoin_eligible(&self) -> bool {
        self.allow_autojoin && self.selection_enabled && !self.temporarily_disabled_by_user
    }
}

/// Best network chosen by the candidate provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedNetwork {
    pub config: NetworkConfig,
    /// BSSID of the chosen scan result. `None` marks a bad candidate.
    pub bssid: Option<Bssid>,
}

impl SelectedNetwork {
    pub fn network_id(&self) -> NetworkId {
        self.config.network_id
    }
}
