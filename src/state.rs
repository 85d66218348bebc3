//! Aggregate connectivity state and auto-join gating.
//!
//! Every field is written only by the engine, in response to notifications
//! and policy setters. Setters here are guarded writes: they return whether
//! the value actually changed so the engine knows to re-evaluate auto-join.

use crate::session::WorkSource;
use crate::types::{Band, Bssid, SecurityType};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Link state of the primary session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Unknown,
    Connected,
    Disconnected,
    /// Between connected and disconnected; no scan schedule applies.
    Transitioning,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Transitioning => "transitioning",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MobilityState {
    Unknown,
    HighMovement,
    LowMovement,
    Stationary,
}

impl fmt::Display for MobilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::HighMovement => "high-movement",
            Self::LowMovement => "low-movement",
            Self::Stationary => "stationary",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiInternetState {
    None,
    ConnectionRequested,
    Connected,
}

/// Outcome of an external auto-join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum ExternalAutoJoin {
    /// Value changed; auto-join must be recomputed.
    Changed,
    Unchanged,
    /// A device admin disabled auto-join and a non-admin tried to change it.
    IgnoredAdminLock,
}

/// Multi-internet (dual STA) request state.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiInternetRequest {
    pub state: MultiInternetState,
    pub requestor: Option<WorkSource>,
    /// Connection requests not yet satisfied.
    pub pending_requests: bool,
    /// BSSIDs pinned by the requestor, per band.
    pub specified_bssids: HashMap<Band, Bssid>,
}

impl Default for MultiInternetRequest {
    fn default() -> Self {
        Self {
            state: MultiInternetState::None,
            requestor: None,
            pending_requests: false,
            specified_bssids: HashMap::new(),
        }
    }
}

impl MultiInternetRequest {
    pub fn is_active(&self) -> bool {
        self.state != MultiInternetState::None
    }

    pub fn is_requested(&self) -> bool {
        self.state == MultiInternetState::ConnectionRequested
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectivityState {
    pub wifi_enabled: bool,
    pub screen_on: bool,
    pub link_state: LinkState,
    pub mobility: MobilityState,
    pub power_save: bool,

    /// Derived by [`ConnectivityState::compute_auto_join`].
    auto_join_enabled: bool,
    auto_join_external: bool,
    auto_join_set_by_admin: bool,

    pub trusted_allowed: bool,
    pub untrusted_allowed: bool,
    pub oem_paid_allowed: bool,
    pub oem_private_allowed: bool,
    pub oem_paid_requestor: Option<WorkSource>,
    pub oem_private_requestor: Option<WorkSource>,
    pub restricted_uids: BTreeSet<u32>,
    pub specific_request_in_progress: bool,
    pub disallowed_security: Vec<SecurityType>,
    pub multi_internet: MultiInternetRequest,

    pub pno_enabled_by_framework: bool,
    pub pno_enabled_after_toggle: bool,
    pub p2p_group_started: bool,
    pub miracast_active: bool,
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self {
            wifi_enabled: false,
            screen_on: false,
            link_state: LinkState::Unknown,
            mobility: MobilityState::Unknown,
            power_save: false,
            auto_join_enabled: false,
            auto_join_external: true,
            auto_join_set_by_admin: false,
            trusted_allowed: false,
            untrusted_allowed: false,
            oem_paid_allowed: false,
            oem_private_allowed: false,
            oem_paid_requestor: None,
            oem_private_requestor: None,
            restricted_uids: BTreeSet::new(),
            specific_request_in_progress: false,
            disallowed_security: Vec::new(),
            multi_internet: MultiInternetRequest::default(),
            pno_enabled_by_framework: true,
            pno_enabled_after_toggle: false,
            p2p_group_started: false,
            miracast_active: false,
        }
    }
}

/// Assign `value` to `slot`, reporting whether it changed.
fn set_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

impl ConnectivityState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_join_enabled(&self) -> bool {
        self.auto_join_enabled
    }

    pub fn auto_join_external(&self) -> bool {
        self.auto_join_external
    }

    pub fn auto_join_set_by_admin(&self) -> bool {
        self.auto_join_set_by_admin
    }

    /// Wi-Fi on and auto-join on: the engine should be running.
    pub fn should_run(&self) -> bool {
        self.wifi_enabled && self.auto_join_enabled
    }

    /// Recompute the internal auto-join flag. Returns its new value.
    ///
    /// External disable always wins. Otherwise at least one kind of request
    /// must be pending and no exclusive single-network request in progress.
    pub fn compute_auto_join(&mut self) -> bool {
        let any_request = self.untrusted_allowed
            || self.oem_paid_allowed
            || self.oem_private_allowed
            || self.trusted_allowed
            || !self.restricted_uids.is_empty()
            || self.multi_internet.is_active();
        self.auto_join_enabled =
            self.auto_join_external && any_request && !self.specific_request_in_progress;
        self.auto_join_enabled
    }

    /// External auto-join toggle. A non-admin cannot lift an admin disable.
    pub fn set_auto_join_external(&mut self, enable: bool, is_admin: bool) -> ExternalAutoJoin {
        if !self.auto_join_external && self.auto_join_set_by_admin && !is_admin {
            return ExternalAutoJoin::IgnoredAdminLock;
        }
        self.auto_join_set_by_admin = is_admin;
        if set_if_changed(&mut self.auto_join_external, enable) {
            ExternalAutoJoin::Changed
        } else {
            ExternalAutoJoin::Unchanged
        }
    }

    pub fn set_trusted_allowed(&mut self, allowed: bool) -> bool {
        set_if_changed(&mut self.trusted_allowed, allowed)
    }

    pub fn set_untrusted_allowed(&mut self, allowed: bool) -> bool {
        set_if_changed(&mut self.untrusted_allowed, allowed)
    }

    /// The requestor is only replaced when the flag changes.
    pub fn set_oem_paid_allowed(&mut self, allowed: bool, requestor: Option<WorkSource>) -> bool {
        if !set_if_changed(&mut self.oem_paid_allowed, allowed) {
            return false;
        }
        self.oem_paid_requestor = requestor;
        true
    }

    pub fn set_oem_private_allowed(&mut self, allowed: bool, requestor: Option<WorkSource>) -> bool {
        if !set_if_changed(&mut self.oem_private_allowed, allowed) {
            return false;
        }
        self.oem_private_requestor = requestor;
        true
    }

    /// Returns true when the set went from empty to non-empty.
    pub fn add_restricted_uid(&mut self, uid: u32) -> bool {
        let was_empty = self.restricted_uids.is_empty();
        self.restricted_uids.insert(uid);
        was_empty
    }

    /// Returns true when removing `uid` emptied the set.
    pub fn remove_restricted_uid(&mut self, uid: u32) -> bool {
        self.restricted_uids.remove(&uid) && self.restricted_uids.is_empty()
    }

    pub fn set_specific_request_in_progress(&mut self, in_progress: bool) -> bool {
        set_if_changed(&mut self.specific_request_in_progress, in_progress)
    }

    /// The requestor is only replaced when the state changes.
    pub fn set_multi_internet_state(
        &mut self,
        state: MultiInternetState,
        requestor: Option<WorkSource>,
    ) -> bool {
        if !set_if_changed(&mut self.multi_internet.state, state) {
            return false;
        }
        self.multi_internet.requestor = requestor;
        true
    }

    /// Work source a restricted secondary connection is attributed to.
    /// OEM paid takes precedence.
    pub fn oem_requestor(&self, oem_paid: bool) -> Option<&WorkSource> {
        if oem_paid {
            self.oem_paid_requestor.as_ref()
        } else {
            self.oem_private_requestor.as_ref()
        }
    }

    /// Either OEM requestor, paid first.
    pub fn any_oem_requestor(&self) -> Option<&WorkSource> {
        self.oem_paid_requestor
            .as_ref()
            .or(self.oem_private_requestor.as_ref())
    }

    /// Internally triggered scans are suppressed while a Miracast session
    /// runs over a P2P group.
    pub fn internal_scans_suppressed(&self) -> bool {
        self.p2p_group_started && self.miracast_active
    }

    /// State reset applied when Wi-Fi is turned off.
    pub fn reset_on_wifi_disable(&mut self) {
        if self.pno_enabled_after_toggle {
            self.pno_enabled_by_framework = true;
        }
        self.miracast_active = false;
        self.p2p_group_started = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_join_needs_a_request() {
        let mut state = ConnectivityState::new();
        assert!(!state.compute_auto_join());
        assert!(state.set_trusted_allowed(true));
        assert!(state.compute_auto_join());
        assert!(!state.set_trusted_allowed(true));
    }

    #[test]
    fn test_each_request_kind_enables_auto_join() {
        let mut state = ConnectivityState::new();
        state.add_restricted_uid(10_001);
        assert!(state.compute_auto_join());

        let mut state = ConnectivityState::new();
        state.set_multi_internet_state(MultiInternetState::ConnectionRequested, None);
        assert!(state.compute_auto_join());

        let mut state = ConnectivityState::new();
        state.set_oem_private_allowed(true, Some(WorkSource::new(1, "oem")));
        assert!(state.compute_auto_join());
    }

    #[test]
    fn test_specific_request_blocks_auto_join() {
        let mut state = ConnectivityState::new();
        state.set_trusted_allowed(true);
        state.set_specific_request_in_progress(true);
        assert!(!state.compute_auto_join());
    }

    #[test]
    fn test_external_disable_wins() {
        let mut state = ConnectivityState::new();
        state.set_trusted_allowed(true);
        assert_eq!(
            state.set_auto_join_external(false, false),
            ExternalAutoJoin::Changed
        );
        assert!(!state.compute_auto_join());
    }

    #[test]
    fn test_admin_disable_not_overridden_by_non_admin() {
        let mut state = ConnectivityState::new();
        assert_eq!(
            state.set_auto_join_external(false, true),
            ExternalAutoJoin::Changed
        );
        assert_eq!(
            state.set_auto_join_external(true, false),
            ExternalAutoJoin::IgnoredAdminLock
        );
        assert!(!state.auto_join_external());
        assert_eq!(
            state.set_auto_join_external(true, true),
            ExternalAutoJoin::Changed
        );
        assert!(state.auto_join_external());
    }

    #[test]
    fn test_non_admin_disable_can_be_lifted() {
        let mut state = ConnectivityState::new();
        let _ = state.set_auto_join_external(false, false);
        assert_eq!(
            state.set_auto_join_external(true, false),
            ExternalAutoJoin::Changed
        );
    }

    #[test]
    fn test_restricted_uid_edges() {
        let mut state = ConnectivityState::new();
        assert!(state.add_restricted_uid(1));
        assert!(!state.add_restricted_uid(2));
        assert!(!state.remove_restricted_uid(1));
        assert!(state.remove_restricted_uid(2));
    }

    #[test]
    fn test_removing_unknown_restricted_uid_is_not_a_change() {
        let mut state = ConnectivityState::new();
        assert!(!state.remove_restricted_uid(7));

        state.add_restricted_uid(1);
        assert!(state.remove_restricted_uid(1));
        assert!(!state.remove_restricted_uid(1));
    }

    #[test]
    fn test_oem_requestor_precedence() {
        let mut state = ConnectivityState::new();
        state.set_oem_paid_allowed(true, Some(WorkSource::new(1, "paid")));
        state.set_oem_private_allowed(true, Some(WorkSource::new(2, "private")));
        assert_eq!(state.any_oem_requestor().map(|w| w.uid), Some(1));
        assert_eq!(state.oem_requestor(false).map(|w| w.uid), Some(2));
    }

    #[test]
    fn test_reset_on_wifi_disable() {
        let mut state = ConnectivityState::new();
        state.pno_enabled_by_framework = false;
        state.pno_enabled_after_toggle = true;
        state.p2p_group_started = true;
        state.miracast_active = true;
        assert!(state.internal_scans_suppressed());
        state.reset_on_wifi_disable();
        assert!(state.pno_enabled_by_framework);
        assert!(!state.internal_scans_suppressed());
    }
}
