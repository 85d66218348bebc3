//! Connect-vs-roam classification for one session and one target.
//!
//! Linked networks (configs treated as interchangeable for roaming) are
//! honoured by both the "already on target" check and the roam check, and
//! both consult the same `linked_network_roaming` switch.

use crate::session::SessionSnapshot;
use crate::types::{Bssid, NetworkConfig, SelectedNetwork};

/// Device roaming capabilities relevant to the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoamingPolicy {
    /// Firmware roams between BSSIDs of a network on its own.
    pub firmware_roaming: bool,
    pub linked_network_roaming: bool,
    /// Always pin the selected BSSID, even with firmware roaming.
    pub selection_sets_target_bssid: bool,
}

/// What to trigger on the session.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectTrigger {
    ConnectWhenDisconnected {
        target: NetworkConfig,
        bssid: Bssid,
    },
    ConnectWhenConnected {
        current: NetworkConfig,
        target: NetworkConfig,
        bssid: Bssid,
    },
    /// BSSID change within the current (or a linked) network.
    RoamWhenConnected {
        current: NetworkConfig,
        target: NetworkConfig,
        bssid: Bssid,
    },
}

impl ConnectTrigger {
    pub fn target(&self) -> &NetworkConfig {
        match self {
            Self::ConnectWhenDisconnected { target, .. }
            | Self::ConnectWhenConnected { target, .. }
            | Self::RoamWhenConnected { target, .. } => target,
        }
    }

    pub fn bssid(&self) -> Bssid {
        match self {
            Self::ConnectWhenDisconnected { bssid, .. }
            | Self::ConnectWhenConnected { bssid, .. }
            | Self::RoamWhenConnected { bssid, .. } => *bssid,
        }
    }

    pub fn is_roam(&self) -> bool {
        matches!(self, Self::RoamWhenConnected { .. })
    }
}

/// Classification of a selected network against a session.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectDecision {
    /// The selection carries no scan result to connect to.
    BadCandidate,
    /// Already connected or connecting to it.
    AlreadyOnTarget,
    /// The chosen BSSID conflicts with the network's configured BSSID.
    BssidMismatch { configured: Bssid, selected: Bssid },
    Trigger(ConnectTrigger),
}

fn same_or_linked(current: &NetworkConfig, target: &NetworkConfig, policy: &RoamingPolicy) -> bool {
    current.network_id == target.network_id
        || (policy.linked_network_roaming && current.is_linked(target))
}

/// Whether `session` is already connected or connecting to `target`.
///
/// Without firmware roaming the BSSID must match too.
pub fn is_on_target(
    session: &SessionSnapshot,
    target: &SelectedNetwork,
    policy: &RoamingPolicy,
) -> bool {
    let on_network = session
        .target_network()
        .map_or(false, |net| same_or_linked(net, &target.config, policy));
    if policy.firmware_roaming {
        return on_network;
    }
    match target.bssid {
        Some(bssid) => on_network && session.target_bssid() == Some(bssid),
        None => on_network,
    }
}

pub fn classify(
    session: &SessionSnapshot,
    target: &SelectedNetwork,
    policy: &RoamingPolicy,
) -> ConnectDecision {
    let Some(selected_bssid) = target.bssid else {
        return ConnectDecision::BadCandidate;
    };
    if is_on_target(session, target, policy) {
        return ConnectDecision::AlreadyOnTarget;
    }
    if let Some(configured) = target.config.pinned_bssid() {
        if configured != selected_bssid {
            return ConnectDecision::BssidMismatch {
                configured,
                selected: selected_bssid,
            };
        }
    }

    let current = session.current_network();
    if let Some(current) = current {
        if same_or_linked(current, &target.config, policy) {
            return ConnectDecision::Trigger(ConnectTrigger::RoamWhenConnected {
                current: current.clone(),
                target: target.config.clone(),
                bssid: selected_bssid,
            });
        }
    }

    let bssid = if policy.firmware_roaming
        && !policy.selection_sets_target_bssid
        && target.config.pinned_bssid().is_none()
    {
        Bssid::ANY
    } else {
        selected_bssid
    };
    let trigger = match current {
        None => ConnectTrigger::ConnectWhenDisconnected {
            target: target.config.clone(),
            bssid,
        },
        Some(current) => ConnectTrigger::ConnectWhenConnected {
            current: current.clone(),
            target: target.config.clone(),
            bssid,
        },
    };
    ConnectDecision::Trigger(trigger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{RadioRole, SessionId};
    use crate::types::SecurityType;

    const B1: Bssid = Bssid::new([0, 0, 0, 0, 0, 1]);
    const B2: Bssid = Bssid::new([0, 0, 0, 0, 0, 2]);

    fn policy(firmware_roaming: bool) -> RoamingPolicy {
        RoamingPolicy {
            firmware_roaming,
            linked_network_roaming: true,
            selection_sets_target_bssid: false,
        }
    }

    fn net(id: i32) -> NetworkConfig {
        NetworkConfig::new(id, format!("net{}", id), SecurityType::Psk)
    }

    fn selected(id: i32, bssid: Bssid) -> SelectedNetwork {
        SelectedNetwork {
            config: net(id),
            bssid: Some(bssid),
        }
    }

    fn connected(id: i32, bssid: Bssid) -> SessionSnapshot {
        SessionSnapshot::connected_to(SessionId(1), RadioRole::Primary, net(id), bssid, 5180)
    }

    fn disconnected() -> SessionSnapshot {
        SessionSnapshot::new(SessionId(1), RadioRole::Primary)
    }

    #[test]
    fn test_same_network_other_bssid_is_roam() {
        let decision = classify(&connected(1, B1), &selected(1, B2), &policy(false));
        match decision {
            ConnectDecision::Trigger(trigger) => {
                assert!(trigger.is_roam());
                assert_eq!(trigger.bssid(), B2);
            }
            other => panic!("expected roam, got {:?}", other),
        }
    }

    #[test]
    fn test_other_network_is_connect() {
        let decision = classify(&connected(1, B1), &selected(2, B2), &policy(false));
        assert!(matches!(
            decision,
            ConnectDecision::Trigger(ConnectTrigger::ConnectWhenConnected { bssid, .. }) if bssid == B2
        ));
    }

    #[test]
    fn test_disconnected_is_connect_when_disconnected() {
        let decision = classify(&disconnected(), &selected(2, B2), &policy(false));
        assert!(matches!(
            decision,
            ConnectDecision::Trigger(ConnectTrigger::ConnectWhenDisconnected { .. })
        ));
    }

    #[test]
    fn test_same_bssid_is_noop() {
        let decision = classify(&connected(1, B1), &selected(1, B1), &policy(false));
        assert_eq!(decision, ConnectDecision::AlreadyOnTarget);
    }

    #[test]
    fn test_firmware_roaming_ignores_bssid_and_uses_wildcard() {
        assert_eq!(
            classify(&connected(1, B1), &selected(1, B2), &policy(true)),
            ConnectDecision::AlreadyOnTarget
        );
        let decision = classify(&disconnected(), &selected(2, B2), &policy(true));
        match decision {
            ConnectDecision::Trigger(trigger) => assert_eq!(trigger.bssid(), Bssid::ANY),
            other => panic!("expected connect, got {:?}", other),
        }
    }

    #[test]
    fn test_selection_sets_target_bssid_pins_even_with_firmware_roaming() {
        let mut p = policy(true);
        p.selection_sets_target_bssid = true;
        let decision = classify(&disconnected(), &selected(2, B2), &p);
        match decision {
            ConnectDecision::Trigger(trigger) => assert_eq!(trigger.bssid(), B2),
            other => panic!("expected connect, got {:?}", other),
        }
    }

    #[test]
    fn test_configured_bssid_conflict_is_dropped() {
        let mut target = selected(2, B2);
        target.config.bssid_override = Some(B1);
        assert_eq!(
            classify(&disconnected(), &target, &policy(false)),
            ConnectDecision::BssidMismatch {
                configured: B1,
                selected: B2
            }
        );
        // A matching override keeps the pinned BSSID even with firmware roaming.
        target.config.bssid_override = Some(B2);
        match classify(&disconnected(), &target, &policy(true)) {
            ConnectDecision::Trigger(trigger) => assert_eq!(trigger.bssid(), B2),
            other => panic!("expected connect, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_scan_result_is_bad_candidate() {
        let target = SelectedNetwork {
            config: net(2),
            bssid: None,
        };
        assert_eq!(
            classify(&disconnected(), &target, &policy(false)),
            ConnectDecision::BadCandidate
        );
    }

    #[test]
    fn test_linked_network_roams_only_when_enabled() {
        let mut current = net(1);
        current.linked_networks.push(2);
        let session =
            SessionSnapshot::connected_to(SessionId(1), RadioRole::Primary, current, B1, 5180);

        let decision = classify(&session, &selected(2, B2), &policy(false));
        assert!(matches!(
            decision,
            ConnectDecision::Trigger(ConnectTrigger::RoamWhenConnected { .. })
        ));

        let mut p = policy(false);
        p.linked_network_roaming = false;
        let decision = classify(&session, &selected(2, B2), &p);
        assert!(matches!(
            decision,
            ConnectDecision::Trigger(ConnectTrigger::ConnectWhenConnected { .. })
        ));
    }

    #[test]
    fn test_connecting_target_counts_as_on_target() {
        let mut session = disconnected();
        session.connecting = Some(net(3));
        session.connecting_bssid = Some(B2);
        assert!(is_on_target(&session, &selected(3, B2), &policy(false)));
        assert!(!is_on_target(&session, &selected(3, B1), &policy(false)));
    }
}
