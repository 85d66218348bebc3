//! Radio sessions as seen by the engine.
//!
//! Sessions are owned by the radio role broker. The engine only ever holds
//! [`SessionSnapshot`]s, which may be stale by the time they are used, and
//! addresses sessions by [`SessionId`].

use crate::types::{Bssid, NetworkConfig, NetworkId};
use std::fmt;

/// Role a radio session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RadioRole {
    Primary,
    /// Dual-internet or restricted-network (oem paid/private) session.
    SecondaryLongLived,
    /// Make-before-break session that either becomes primary or is torn down.
    SecondaryTransient,
    ScanOnly,
}

impl fmt::Display for RadioRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Primary => "primary",
            Self::SecondaryLongLived => "secondary-long-lived",
            Self::SecondaryTransient => "secondary-transient",
            Self::ScanOnly => "scan-only",
        };
        f.write_str(name)
    }
}

/// Broker-assigned session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Attribution of a request to the app or system component that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkSource {
    pub uid: u32,
    pub package: String,
}

impl WorkSource {
    pub fn new(uid: u32, package: impl Into<String>) -> Self {
        Self {
            uid,
            package: package.into(),
        }
    }

    /// The engine itself.
    pub fn engine() -> Self {
        Self::new(1010, "wifi-connectivity-engine")
    }
}

/// Point-in-time view of one radio session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub role: RadioRole,
    pub connected: Option<NetworkConfig>,
    pub connected_bssid: Option<Bssid>,
    pub connecting: Option<NetworkConfig>,
    pub connecting_bssid: Option<Bssid>,
    /// Operating frequency of the current association.
    pub frequency_mhz: Option<u32>,
    /// Multi-link association.
    pub mlo: bool,
    /// BSSIDs of the other links of an MLO access point.
    pub affiliated_bssids: Vec<Bssid>,
    /// Latency-sensitive traffic is flowing; scans would be disruptive.
    pub active_stream: bool,
}

impl SessionSnapshot {
    pub fn new(id: SessionId, role: RadioRole) -> Self {
        Self {
            id,
            role,
            connected: None,
            connected_bssid: None,
            connecting: None,
            connecting_bssid: None,
            frequency_mhz: None,
            mlo: false,
            affiliated_bssids: Vec::new(),
            active_stream: false,
        }
    }

    /// Snapshot of a session associated with `network` on `bssid`.
    pub fn connected_to(
        id: SessionId,
        role: RadioRole,
        network: NetworkConfig,
        bssid: Bssid,
        frequency_mhz: u32,
    ) -> Self {
        Self {
            connected: Some(network),
            connected_bssid: Some(bssid),
            frequency_mhz: Some(frequency_mhz),
            ..Self::new(id, role)
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.is_some()
    }

    /// Connected network, else the one being connected to.
    pub fn current_network(&self) -> Option<&NetworkConfig> {
        self.connected.as_ref().or(self.connecting.as_ref())
    }

    pub fn current_bssid(&self) -> Option<Bssid> {
        self.connected_bssid.or(self.connecting_bssid)
    }

    /// Network being connected to, else the connected one.
    pub fn target_network(&self) -> Option<&NetworkConfig> {
        self.connecting.as_ref().or(self.connected.as_ref())
    }

    pub fn target_bssid(&self) -> Option<Bssid> {
        self.connecting_bssid.or(self.connected_bssid)
    }

    pub fn connected_network_id(&self) -> Option<NetworkId> {
        self.connected.as_ref().map(|c| c.network_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SecurityType;

    #[test]
    fn test_current_prefers_connected_target_prefers_connecting() {
        let home = NetworkConfig::new(1, "home", SecurityType::Psk);
        let cafe = NetworkConfig::new(2, "cafe", SecurityType::Open);
        let mut snap = SessionSnapshot::connected_to(
            SessionId(1),
            RadioRole::Primary,
            home.clone(),
            Bssid::new([1; 6]),
            2412,
        );
        snap.connecting = Some(cafe.clone());
        snap.connecting_bssid = Some(Bssid::new([2; 6]));

        assert_eq!(snap.current_network(), Some(&home));
        assert_eq!(snap.current_bssid(), Some(Bssid::new([1; 6])));
        assert_eq!(snap.target_network(), Some(&cafe));
        assert_eq!(snap.target_bssid(), Some(Bssid::new([2; 6])));
    }

    #[test]
    fn test_disconnected_snapshot() {
        let snap = SessionSnapshot::new(SessionId(7), RadioRole::ScanOnly);
        assert!(!snap.is_connected());
        assert_eq!(snap.current_network(), None);
        assert_eq!(snap.connected_network_id(), None);
        assert_eq!(snap.id.to_string(), "session#7");
        assert_eq!(snap.role.to_string(), "scan-only");
    }
}
