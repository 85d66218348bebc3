//! Turning a selected network into a connect or roam on the right session.
//!
//! Covers the single-radio path, make-before-break through a transient
//! secondary session, restricted (OEM) secondary sessions and the second
//! internet connection. Anything that needs a new session parks a
//! continuation and resumes in [`ConnectivityEngine::handle_session_granted`].

use super::selection::SelectionOutcome;
use super::ConnectivityEngine;
use crate::collaborators::MetricEvent;
use crate::filter::BlockReason;
use crate::orchestrator::{
    classify, is_dbs_ap, is_on_target, secondary_candidates, AttemptDecision, BandPairing,
    ConnectDecision, ConnectTrigger, DialogGate, DialogId, PendingContinuation, RequestId,
    RetryPrune, RoamingPolicy, SecondaryPolicy, SwitchContext, TEMP_BSSID_BLOCK_DURATION_MS,
};
use crate::scan::ScanOrigin;
use crate::session::{RadioRole, SessionId, SessionSnapshot, WorkSource};
use crate::types::{Bssid, MacRandomization, NetworkConfig, ScanCandidate, SelectedNetwork};
use log::{debug, warn};

impl ConnectivityEngine {
    fn roaming_policy(&self) -> RoamingPolicy {
        RoamingPolicy {
            firmware_roaming: self.config.firmware_roaming_supported,
            linked_network_roaming: self.config.linked_network_roaming_enabled,
            selection_sets_target_bssid: self.config.network_selection_sets_target_bssid,
        }
    }

    /// BSSID to hand the broker with a session request. Firmware picks the
    /// access point itself when it roams.
    fn session_bssid_hint(&self, bssid: Option<Bssid>) -> Option<Bssid> {
        if self.config.firmware_roaming_supported {
            None
        } else {
            bssid.filter(|b| !b.is_any())
        }
    }

    /// Rate gate shared by every connect and roam.
    fn should_connect(&mut self) -> bool {
        let now = self.now_ms();
        match self.attempts.try_attempt(now, self.state.screen_on) {
            AttemptDecision::Allowed => true,
            AttemptDecision::RateLimited => {
                self.log_local("Too many connection attempts, skipping this one");
                self.record(MetricEvent::RateLimited);
                false
            }
        }
    }

    fn trigger_connect(&mut self, session: SessionId, target: &NetworkConfig, bssid: Bssid) {
        if !self.should_connect() {
            return;
        }
        if self.config.firmware_roaming_supported {
            // A pinned BSSID must stick.
            self.broker
                .set_firmware_roaming(session, target.pinned_bssid().is_none());
        }
        self.log_local(format!(
            "Connecting {} to {} ({})",
            session, target.ssid, bssid
        ));
        self.broker
            .connect(session, target.network_id, WorkSource::engine().uid, bssid);
        self.record(MetricEvent::ConnectAttempt);
    }

    fn trigger_roam(&mut self, session: SessionId, target: &NetworkConfig, bssid: Bssid) {
        if !self.should_connect() {
            return;
        }
        self.log_local(format!("Roaming {} to {} ({})", session, target.ssid, bssid));
        self.broker.roam(session, target.network_id, bssid);
        self.record(MetricEvent::RoamAttempt);
    }

    /// Classify `target` against `session`, logging whatever is not a trigger.
    fn trigger_for_session(
        &mut self,
        session: &SessionSnapshot,
        target: &SelectedNetwork,
    ) -> Option<ConnectTrigger> {
        match classify(session, target, &self.roaming_policy()) {
            ConnectDecision::BadCandidate => {
                warn!("{} was selected without a scan result", target.config.ssid);
                None
            }
            ConnectDecision::AlreadyOnTarget => {
                self.log_local(format!(
                    "{} already connected or connecting to {}",
                    session.role, target.config.ssid
                ));
                None
            }
            ConnectDecision::BssidMismatch {
                configured,
                selected,
            } => {
                self.log_local(format!(
                    "Selected BSSID {} does not match configured {} of {}",
                    selected, configured, target.config.ssid
                ));
                None
            }
            ConnectDecision::Trigger(trigger) => {
                if session.role == RadioRole::Primary && self.state.multi_internet.is_active() {
                    self.disconnect_secondary_on(target);
                }
                Some(trigger)
            }
        }
    }

    /// The primary is about to take over the secondary internet network.
    fn disconnect_secondary_on(&mut self, target: &SelectedNetwork) {
        let Some(secondary) = self.broker.session_in_role(RadioRole::SecondaryLongLived) else {
            return;
        };
        if is_on_target(&secondary, target, &self.roaming_policy()) {
            self.log_local(format!(
                "Disconnecting secondary {} before connecting the primary to {}",
                secondary.id, target.config.ssid
            ));
            self.broker.disconnect(secondary.id);
        }
    }

    /// Connect or roam on `session` with no make-before-break.
    fn connect_without_mbb(&mut self, session: &SessionSnapshot, target: &SelectedNetwork) {
        let Some(trigger) = self.trigger_for_session(session, target) else {
            return;
        };
        match trigger {
            ConnectTrigger::ConnectWhenDisconnected { target, bssid }
            | ConnectTrigger::ConnectWhenConnected { target, bssid, .. } => {
                self.trigger_connect(session.id, &target, bssid)
            }
            ConnectTrigger::RoamWhenConnected { target, bssid, .. } => {
                self.trigger_roam(session.id, &target, bssid)
            }
        }
    }

    pub(super) fn connect_primary_to_best(
        &mut self,
        origin: ScanOrigin,
        candidates: &[ScanCandidate],
    ) -> SelectionOutcome {
        match self.selector.select_network(candidates, true) {
            Some(selected) => {
                self.log_local(format!(
                    "{}: selected {}",
                    origin.name(),
                    selected.config.ssid
                ));
                self.connect_primary_using_mbb_if_available(selected);
                SelectionOutcome::CandidateSelected
            }
            None => {
                self.log_local(format!("{}: nothing selected", origin.name()));
                self.handle_no_candidate();
                SelectionOutcome::NoCandidate
            }
        }
    }

    /// Pass the switch through the dialog gate, then connect.
    fn connect_primary_using_mbb_if_available(&mut self, target: SelectedNetwork) {
        let Some(primary) = self.broker.primary() else {
            warn!("no primary session to connect to {}", target.config.ssid);
            return;
        };
        let now = self.now_ms();
        let ctx = SwitchContext {
            connected: primary.connected.as_ref(),
            sufficiency_check_enabled: self.config.sufficiency_check_enabled,
            ask_user_before_switching: self.config.ask_user_before_switching_from_user_selected,
        };
        match self.dialog.evaluate(ctx, &target, now) {
            DialogGate::Proceed => self.continue_primary_connection(&primary, target),
            DialogGate::Blocked(by) => {
                self.log_local(format!("Not switching to {}: {:?}", target.config.ssid, by));
            }
            DialogGate::Prompt { id, replaced } => {
                if let Some(old) = replaced {
                    self.dialogs.dismiss(old);
                }
                if let Some(current) = &primary.connected {
                    self.log_local(format!(
                        "Asking before switching from {} to {}",
                        current.ssid, target.config.ssid
                    ));
                    self.dialogs.show_network_switch(id, current, &target.config);
                }
            }
        }
    }

    fn continue_primary_connection(&mut self, primary: &SessionSnapshot, target: SelectedNetwork) {
        let Some(trigger) = self.trigger_for_session(primary, &target) else {
            return;
        };
        match trigger {
            ConnectTrigger::ConnectWhenDisconnected { target, bssid } => {
                self.trigger_connect(primary.id, &target, bssid);
                self.broker.stop_sessions_in_role(RadioRole::SecondaryTransient);
            }
            ConnectTrigger::ConnectWhenConnected {
                current,
                target,
                bssid,
            } => {
                let factory_mac = current.mac_randomization == MacRandomization::None
                    && target.mac_randomization == MacRandomization::None;
                if factory_mac || !self.config.sta_sta_for_mbb_supported {
                    if factory_mac {
                        self.log_local("Both networks use the factory MAC, breaking before make");
                    }
                    self.trigger_connect(primary.id, &target, bssid);
                    self.broker.stop_sessions_in_role(RadioRole::SecondaryTransient);
                    return;
                }
                let ssid = target.ssid.clone();
                let hint = self.session_bssid_hint(Some(bssid));
                let request = self.pending.park(PendingContinuation::MakeBeforeBreak {
                    target: SelectedNetwork {
                        config: target,
                        bssid: Some(bssid),
                    },
                });
                self.log_local(format!("Make-before-break to {} via {}", ssid, request));
                self.broker.request_session(
                    request,
                    RadioRole::SecondaryTransient,
                    WorkSource::engine(),
                    &ssid,
                    hint,
                );
            }
            ConnectTrigger::RoamWhenConnected { target, bssid, .. } => {
                self.trigger_roam(primary.id, &target, bssid);
                self.broker.stop_sessions_in_role(RadioRole::SecondaryTransient);
            }
        }
    }

    /// OEM restricted candidates go to a secondary long-lived session,
    /// the rest to the primary once the session answer arrives.
    pub(super) fn handle_restricted_candidates(
        &mut self,
        origin: ScanOrigin,
        normal: Vec<ScanCandidate>,
        restricted: Vec<ScanCandidate>,
        all: Vec<ScanCandidate>,
    ) -> SelectionOutcome {
        let secondary = self
            .selector
            .select_network(&restricted, true)
            .filter(|s| s.bssid.is_some() && (s.config.oem_paid || s.config.oem_private));
        let Some(secondary) = secondary else {
            self.log_local(format!("{}: no usable restricted candidate", origin.name()));
            return self.connect_primary_to_best(origin, &all);
        };
        let Some(requestor) = self.state.oem_requestor(secondary.config.oem_paid).cloned() else {
            self.log_local("Restricted connection allowed without a requestor, primary only");
            return self.connect_primary_to_best(origin, &all);
        };
        let primary_target = self.selector.select_network(&normal, true);
        let ssid = secondary.config.ssid.clone();
        let hint = self.session_bssid_hint(secondary.bssid);
        let request = self.pending.park(PendingContinuation::RestrictedSecondary {
            scan_origin: origin,
            primary_target,
            secondary_target: secondary,
            all_candidates: all,
        });
        self.log_local(format!(
            "Requesting restricted secondary for {} via {}",
            ssid, request
        ));
        self.broker.request_session(
            request,
            RadioRole::SecondaryLongLived,
            requestor,
            &ssid,
            hint,
        );
        SelectionOutcome::Deferred
    }

    /// Pick a second internet network next to the connected primary.
    /// Returns true when a session request went out.
    pub(super) fn handle_multi_internet_candidates(
        &mut self,
        candidates: &[ScanCandidate],
        origin: ScanOrigin,
    ) -> bool {
        let Some(primary) = self.broker.primary() else {
            return false;
        };
        let Some(primary_config) = primary.connected.clone() else {
            self.log_local("Primary not connected, no secondary internet");
            return false;
        };
        let Some(requestor) = self.state.multi_internet.requestor.clone() else {
            warn!("multi-internet requested without a requestor");
            return false;
        };
        let has_secondary = self
            .broker
            .session_in_role(RadioRole::SecondaryLongLived)
            .is_some();
        if !has_secondary
            && !self
                .broker
                .can_request_more_in_role(&requestor, RadioRole::SecondaryLongLived)
        {
            self.log_local("No room for a secondary internet session");
            return false;
        }

        let policy = if self.config.multi_internet_multi_ap_allowed {
            SecondaryPolicy::MultiAp
        } else {
            SecondaryPolicy::SameNetworkOnly
        };
        let pairing = if self.config.multi_internet_dual_5g_supported {
            BandPairing::Dual5Ghz
        } else {
            BandPairing::DistinctBands
        };
        let eligible = secondary_candidates(
            candidates,
            &primary,
            policy,
            pairing,
            &self.state.multi_internet.specified_bssids,
        );
        if eligible.is_empty() {
            self.log_local(format!("{}: no secondary internet candidate", origin.name()));
            return false;
        }
        let Some(selected) = self.selector.select_network(&eligible, false) else {
            return false;
        };
        let Some(bssid) = selected.bssid else {
            return false;
        };
        let dbs_ap = is_dbs_ap(&primary_config, &selected.config);
        if dbs_ap && selected.config.static_ip {
            self.log_local(format!(
                "{} uses a static IP, cannot join both bands",
                selected.config.ssid
            ));
            return false;
        }

        let ssid = selected.config.ssid.clone();
        let hint = self.session_bssid_hint(Some(bssid));
        let request = self.pending.park(PendingContinuation::MultiInternetSecondary {
            scan_origin: origin,
            target: selected.config,
            bssid,
            dbs_ap,
        });
        self.log_local(format!(
            "Requesting secondary internet for {} ({}) via {}",
            ssid, bssid, request
        ));
        self.broker.request_session(
            request,
            RadioRole::SecondaryLongLived,
            requestor,
            &ssid,
            hint,
        );
        true
    }

    pub(super) fn handle_session_granted(
        &mut self,
        request: RequestId,
        session: Option<SessionSnapshot>,
    ) {
        let Some(continuation) = self.pending.take(request) else {
            debug!("ignoring answer to unknown {}", request);
            return;
        };
        debug!("{} answered for {}", request, continuation.name());
        match continuation {
            PendingContinuation::RestrictedSecondary {
                scan_origin,
                primary_target,
                secondary_target,
                all_candidates,
            } => self.resume_restricted_secondary(
                scan_origin,
                primary_target,
                secondary_target,
                all_candidates,
                session,
            ),
            PendingContinuation::MultiInternetSecondary {
                scan_origin,
                target,
                bssid,
                dbs_ap,
            } => self.resume_multi_internet_secondary(scan_origin, target, bssid, dbs_ap, session),
            PendingContinuation::MakeBeforeBreak { target } => {
                self.resume_make_before_break(target, session)
            }
        }
    }

    fn resume_restricted_secondary(
        &mut self,
        origin: ScanOrigin,
        primary_target: Option<SelectedNetwork>,
        secondary_target: SelectedNetwork,
        all: Vec<ScanCandidate>,
        session: Option<SessionSnapshot>,
    ) {
        let Some(session) = session else {
            self.log_local("Restricted secondary request returned nothing, aborting");
            self.handle_no_candidate();
            self.on_scan_results_handled(origin, false);
            return;
        };
        if session.role == RadioRole::Primary {
            self.log_local("Restricted request got the primary, single radio only");
            let outcome = self.connect_primary_to_best(origin, &all);
            self.on_scan_results_handled(origin, outcome == SelectionOutcome::CandidateSelected);
            return;
        }
        if let Some(primary_target) = primary_target {
            if let Some(primary) = self.broker.primary() {
                self.connect_without_mbb(&primary, &primary_target);
            }
        }
        self.connect_without_mbb(&session, &secondary_target);
        self.on_scan_results_handled(origin, true);
    }

    fn resume_multi_internet_secondary(
        &mut self,
        origin: ScanOrigin,
        mut target: NetworkConfig,
        bssid: Bssid,
        dbs_ap: bool,
        session: Option<SessionSnapshot>,
    ) {
        let Some(session) = session else {
            self.log_local("Secondary internet request returned nothing, aborting");
            self.handle_no_candidate();
            self.on_scan_results_handled(origin, false);
            return;
        };
        if session.role != RadioRole::SecondaryLongLived {
            // The primary is already connected; nothing to fall back to.
            warn!(
                "secondary internet request answered with a {} session, dropping",
                session.role
            );
            self.on_scan_results_handled(origin, false);
            return;
        }
        self.broker.mark_secondary_internet(session.id, dbs_ap);
        target.bssid_override = Some(bssid);
        let selected = SelectedNetwork {
            config: target,
            bssid: Some(bssid),
        };
        self.connect_without_mbb(&session, &selected);
        self.on_scan_results_handled(origin, true);
    }

    fn resume_make_before_break(&mut self, target: SelectedNetwork, session: Option<SessionSnapshot>) {
        let Some(session) = session else {
            self.log_local("Make-before-break request returned nothing, aborting");
            return;
        };
        if is_on_target(&session, &target, &self.roaming_policy()) {
            self.log_local(format!(
                "{} already on {}",
                session.role, target.config.ssid
            ));
            return;
        }
        if session.role == RadioRole::SecondaryTransient {
            self.record(MetricEvent::MakeBeforeBreakTriggered);
        }
        let bssid = target.bssid.unwrap_or(Bssid::ANY);
        self.trigger_connect(session.id, &target.config, bssid);
    }

    pub(super) fn handle_network_switch_dialog_response(&mut self, id: DialogId, accepted: bool) {
        let answered = if accepted {
            self.dialog.accept(id)
        } else {
            self.dialog.reject(id)
        };
        let Some(target) = answered else {
            debug!("ignoring answer to stale {}", id);
            return;
        };
        let Some(primary) = self.broker.primary() else {
            warn!("no primary session for the answer to {}", id);
            return;
        };
        let network_id = target.network_id();
        let bssid = target.bssid;
        if accepted {
            self.log_local(format!("User accepted switching to {}", target.config.ssid));
            self.continue_primary_connection(&primary, target);
            self.broker.notify_switch_accepted(primary.id, network_id, bssid);
        } else {
            self.log_local(format!("User rejected switching to {}", target.config.ssid));
            self.broker.notify_switch_rejected(primary.id, network_id, bssid);
        }
    }

    /// After a failed attempt, go straight to the next best of the latest
    /// candidates instead of waiting for another scan.
    pub(super) fn retry_connection_on_latest_candidates(
        &mut self,
        session: SessionId,
        failed_bssid: Bssid,
        failed: &NetworkConfig,
        ignore_same_network: bool,
    ) {
        let now = self.now_ms();
        let registry = &self.registry;
        let pruned = self.latest.prune_for_retry(
            failed_bssid,
            failed,
            ignore_same_network,
            now,
            |id| registry.network(id),
        );
        let candidates = match pruned {
            RetryPrune::Pruned(candidates) => candidates,
            RetryPrune::Stale => {
                debug!("latest candidates are stale, no automatic retry");
                return;
            }
            RetryPrune::Unchanged => {
                debug!("nothing pruned, no automatic retry");
                return;
            }
        };
        let Some(selected) = self.selector.select_network(&candidates, true) else {
            return;
        };
        self.log_local(format!(
            "Automatic retry on the next best candidate {}",
            selected.config.ssid
        ));
        // Keep the supplicant off the failed BSSID while we retry.
        self.blocklist.block_for(
            failed_bssid,
            &failed.ssid,
            TEMP_BSSID_BLOCK_DURATION_MS,
            BlockReason::FastReconnect,
            now,
        );
        self.trigger_connect(session, &selected.config, Bssid::ANY);
        self.broker.stop_sessions_in_role(RadioRole::SecondaryTransient);
    }
}
