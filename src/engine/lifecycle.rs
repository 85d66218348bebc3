//! Running-state gating, connection and screen state, and policy setters.

use super::{AttemptOutcome, ConnectivityEngine};
use crate::scan::{InitialScanState, ScanType, ScheduleKind, DEFAULT_SCANNING_TYPE};
use crate::session::{RadioRole, SessionId, WorkSource};
use crate::state::{ExternalAutoJoin, LinkState, MultiInternetState};
use crate::timer::TimerKind;
use crate::types::{Bssid, NetworkConfig, NetworkId};
use log::{debug, error, warn};

impl ConnectivityEngine {
    /// Idempotent. Disabling forgets blocks, temporary disables, pinning and
    /// any session request still in flight.
    pub(super) fn set_wifi_enabled(&mut self, enabled: bool) {
        if self.state.wifi_enabled == enabled {
            debug!("wifi already {}", if enabled { "enabled" } else { "disabled" });
            return;
        }
        self.log_local(format!("Set Wi-Fi enabled: {}", enabled));
        if !enabled {
            self.reset_on_wifi_disable();
        }
        self.state.wifi_enabled = enabled;
        self.update_running_state();
    }

    fn reset_on_wifi_disable(&mut self) {
        self.blocklist.clear();
        self.registry.reset_on_wifi_disable();
        self.state.reset_on_wifi_disable();
        self.carrier_filter.clear();
        self.high_movement.clear();
        let dropped = self.pending.clear();
        if dropped > 0 {
            debug!("dropped {} pending session requests", dropped);
        }
    }

    pub(super) fn update_running_state(&mut self) {
        if self.state.should_run() {
            self.start();
        } else {
            self.stop();
        }
    }

    fn start(&mut self) {
        if self.running {
            return;
        }
        self.attempts.clear();
        self.running = true;
        self.latest.clear();
        self.counters.starts += 1;
        self.log_local("Connectivity engine started");
        if self.config.partial_initial_scan_enabled {
            self.initial_scan = InitialScanState::Start;
            if self.state.screen_on {
                // Get ahead of any user-triggered scan.
                self.start_initial_partial_scan(DEFAULT_SCANNING_TYPE[0]);
            }
        }
    }

    fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.stop_connectivity_scan();
        self.cancel_timer(TimerKind::Watchdog);
        self.cancel_timer(TimerKind::DelayedCarrierPartialScan);
        self.last_periodic_scan_ms = None;
        self.notifier.clear_pending(true);
        self.wait_for_full_band = false;
        self.latest.clear();
        self.single_scan_retry.reset();
        self.counters.stops += 1;
        self.log_local("Connectivity engine stopped");
    }

    /// Recompute auto-join, start or stop accordingly, then rescan.
    pub(super) fn check_all_states_and_enable_auto_join(&mut self) {
        let enabled = self.state.compute_auto_join();
        debug!("auto-join enabled: {}", enabled);
        self.update_running_state();
        self.start_connectivity_scan(true);
    }

    pub(super) fn set_trusted_connection_allowed(&mut self, allowed: bool) {
        if !self.state.set_trusted_allowed(allowed) {
            return;
        }
        self.log_local(format!("Trusted connections allowed: {}", allowed));
        self.check_all_states_and_enable_auto_join();
    }

    pub(super) fn set_untrusted_connection_allowed(&mut self, allowed: bool) {
        if !self.state.set_untrusted_allowed(allowed) {
            return;
        }
        self.log_local(format!("Untrusted connections allowed: {}", allowed));
        self.check_all_states_and_enable_auto_join();
    }

    pub(super) fn set_oem_paid_connection_allowed(
        &mut self,
        allowed: bool,
        requestor: Option<WorkSource>,
    ) {
        if !self.state.set_oem_paid_allowed(allowed, requestor) {
            return;
        }
        self.log_local(format!("OEM paid connections allowed: {}", allowed));
        self.check_all_states_and_enable_auto_join();
    }

    pub(super) fn set_oem_private_connection_allowed(
        &mut self,
        allowed: bool,
        requestor: Option<WorkSource>,
    ) {
        if !self.state.set_oem_private_allowed(allowed, requestor) {
            return;
        }
        self.log_local(format!("OEM private connections allowed: {}", allowed));
        self.check_all_states_and_enable_auto_join();
    }

    pub(super) fn add_restricted_connection_uid(&mut self, uid: u32) {
        self.log_local(format!("Restricted connections allowed for uid {}", uid));
        if self.state.add_restricted_uid(uid) {
            self.check_all_states_and_enable_auto_join();
        }
    }

    pub(super) fn remove_restricted_connection_uid(&mut self, uid: u32) {
        self.log_local(format!("Restricted connections revoked for uid {}", uid));
        if self.state.remove_restricted_uid(uid) {
            self.check_all_states_and_enable_auto_join();
        }
    }

    pub(super) fn set_specific_network_request_in_progress(&mut self, in_progress: bool) {
        if !self.state.set_specific_request_in_progress(in_progress) {
            return;
        }
        self.log_local(format!("Specific network request in progress: {}", in_progress));
        self.check_all_states_and_enable_auto_join();
    }

    /// A non-admin caller cannot lift a device admin's disable.
    pub(super) fn set_auto_join_enabled_external(&mut self, enable: bool, is_admin: bool) {
        match self.state.set_auto_join_external(enable, is_admin) {
            ExternalAutoJoin::IgnoredAdminLock => {
                warn!("auto-join disabled by device admin, ignoring request to set {}", enable);
                return;
            }
            ExternalAutoJoin::Unchanged => return,
            ExternalAutoJoin::Changed => {}
        }
        self.log_local(format!(
            "Auto-join enabled externally: {} (admin: {})",
            enable, is_admin
        ));
        if !enable {
            self.dismiss_network_switch_dialog();
        }
        self.check_all_states_and_enable_auto_join();
    }

    pub(super) fn set_multi_internet_state(
        &mut self,
        state: MultiInternetState,
        requestor: Option<WorkSource>,
    ) {
        if !self.state.set_multi_internet_state(state, requestor) {
            return;
        }
        self.log_local(format!("Multi-internet state: {:?}", state));
        self.check_all_states_and_enable_auto_join();
    }

    pub(super) fn handle_screen_state_changed(&mut self, screen_on: bool) {
        self.log_local(format!("Screen on: {}", screen_on));
        self.state.screen_on = screen_on;
        if self.state.link_state == LinkState::Disconnected
            && self.config.partial_initial_scan_enabled
        {
            self.initial_scan = InitialScanState::Start;
        }
        self.notifier.handle_screen_state(screen_on);

        if screen_on {
            self.cancel_timer(TimerKind::NetworkChangeDebounce);
            if self.next_screen_on_delay_ms > 0 {
                let delay = std::mem::take(&mut self.next_screen_on_delay_ms);
                self.log_local(format!("Deferring screen-on connectivity scan by {}ms", delay));
                self.stop_connectivity_scan();
                self.rearm_timer(TimerKind::ScreenOnConnectivityScan, delay);
                return;
            }
        } else {
            self.cancel_timer(TimerKind::ScreenOnConnectivityScan);
        }
        self.start_connectivity_scan(false);
    }

    /// Only the primary session drives the link state.
    pub(super) fn handle_connection_state_changed(&mut self, role: RadioRole, state: LinkState) {
        if role != RadioRole::Primary {
            error!("ignoring connection state {} from {} session", state, role);
            return;
        }
        self.log_local(format!("Primary link state: {}", state));
        self.state.link_state = state;

        match state {
            LinkState::Disconnected => {
                if self.config.watchdog_enabled {
                    self.rearm_timer(TimerKind::Watchdog, self.config.watchdog_interval_ms);
                }
                self.current_schedule = Some(ScheduleKind::Disconnected);
                self.start_connectivity_scan(true);
                self.reset_network_switch_dialog();
            }
            LinkState::Connected => {
                self.cancel_timer(TimerKind::Watchdog);
                self.cancel_timer(TimerKind::DelayedCarrierPartialScan);
                self.current_schedule = Some(if self.use_single_saved_network_schedule() {
                    ScheduleKind::SingleSavedNetwork
                } else {
                    ScheduleKind::Connected
                });
                self.start_connectivity_scan(false);
            }
            LinkState::Unknown | LinkState::Transitioning => {
                self.current_schedule = None;
                self.start_connectivity_scan(false);
            }
        }
    }

    /// Success feeds the open network notifier; a non-timeout failure on
    /// the primary retries the next best of the latest candidates.
    pub(super) fn handle_connection_attempt_ended(
        &mut self,
        session: SessionId,
        role: RadioRole,
        outcome: AttemptOutcome,
        bssid: Bssid,
        config: NetworkConfig,
    ) {
        if !matches!(role, RadioRole::Primary | RadioRole::SecondaryLongLived) {
            warn!("ignoring connection attempt result from {} session", role);
            return;
        }
        if outcome.is_success() {
            self.notifier.handle_wifi_connected(&config.ssid);
            return;
        }
        self.notifier.handle_connection_failure();
        if role != RadioRole::Primary
            || outcome == AttemptOutcome::NoResponse
            || config.admin_restricted
        {
            return;
        }
        let ignore_same_network = outcome == AttemptOutcome::AuthenticationFailure { eap: true };
        self.retry_connection_on_latest_candidates(session, bssid, &config, ignore_same_network);
    }

    /// A user-initiated connection is about to happen: forget throttling
    /// and blocks for that network.
    pub(super) fn prepare_for_forced_connection(&mut self, network_id: NetworkId) {
        let Some(config) = self.registry.network(network_id) else {
            warn!("prepare_for_forced_connection: unknown network {}", network_id);
            return;
        };
        self.log_local(format!("Preparing for forced connection to {}", config.ssid));
        self.attempts.clear();
        self.blocklist.clear_for_ssid(&config.ssid);
    }

    /// Full band scan on behalf of `work_source`, whose results are the only
    /// ones considered until they arrive.
    pub(super) fn force_connectivity_scan(&mut self, work_source: WorkSource) {
        if !self.state.wifi_enabled || !self.running {
            return;
        }
        self.log_local(format!("Forced connectivity scan for {}", work_source.package));
        self.attempts.clear();
        self.wait_for_full_band = true;
        self.start_forced_single_scan(true, work_source, ScanType::HighAccuracy);
    }

    pub(super) fn dismiss_network_switch_dialog(&mut self) {
        if let Some(id) = self.dialog.dismiss() {
            self.dialogs.dismiss(id);
        }
    }

    pub(super) fn reset_network_switch_dialog(&mut self) {
        if let Some(id) = self.dialog.reset() {
            self.dialogs.dismiss(id);
        }
    }

    pub(super) fn disable_network_switch_dialog(&mut self, duration_ms: u64) {
        let now = self.now_ms();
        self.log_local(format!("Network switch dialog disabled for {}ms", duration_ms));
        if let Some(id) = self.dialog.disable_for(duration_ms, now) {
            self.dialogs.dismiss(id);
        }
    }
}
