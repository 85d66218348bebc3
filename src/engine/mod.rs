//! The connectivity decision engine.
//!
//! [`ConnectivityEngine`] owns every piece of mutable connectivity state and
//! consumes [`EngineEvent`]s strictly one at a time. Notifications, policy
//! setters, collaborator callbacks and timer fires all arrive through
//! [`ConnectivityEngine::handle_event`]; the engine reacts by calling out to
//! its collaborators, whose answers come back later as further events.
//!
//! The implementation is split by concern:
//!
//! - `lifecycle`: wifi/auto-join gating, connection and screen state, policy setters
//! - `scanning`: periodic, background, watchdog and retry scans
//! - `selection`: scan result intake and the candidate filter pipeline
//! - `connect`: connection orchestration and session continuations

mod connect;
mod lifecycle;
mod local_log;
mod scanning;
mod selection;


pub use local_log::{LocalLog, LOCAL_LOG_CAPACITY};

use crate::clock::Clock;
use crate::collaborators::{
    CandidateProvider, Collaborators, DialogSink, MetricEvent, MetricsSink, NetworkRegistry,
    OpenNetworkNotifier, RadioRoleBroker, ScanIssuer,
};
use crate::config::{ConfigError, EngineConfig};
use crate::filter::{BssidBlocklist, DelayedCarrierFilter, HighMovementFilter};
use crate::orchestrator::{
    ConnectionAttemptHistory, DialogId, LatestCandidates, NetworkSwitchDialogState,
    PendingRequests, RequestId,
};
use crate::scan::{
    InitialScanState, LowRssiBackoff, ScanRetryCounter, ScanSchedule, ScanType, ScheduleCursor,
    ScheduleKind, POWER_SAVE_SCAN_INTERVAL_MULTIPLIER,
};
use crate::session::{RadioRole, SessionId, SessionSnapshot, WorkSource};
use crate::state::{ConnectivityState, LinkState, MobilityState, MultiInternetState};
use crate::timer::{TimerHandle, TimerKind, TimerService, TimerSlot};
use crate::types::{Band, Bssid, NetworkConfig, NetworkId, ScanDetail, SecurityType};
use log::debug;
use std::collections::HashMap;
use std::fmt::Write as _;

/// How a connection attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// The access point never answered. Never retried automatically.
    NoResponse,
    AuthenticationFailure {
        /// EAP method failure, as opposed to a wrong password.
        eap: bool,
    },
    Other,
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Every input the engine reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    // Lifecycle and radio notifications.
    SetWifiEnabled(bool),
    ScreenStateChanged(bool),
    ConnectionStateChanged {
        role: RadioRole,
        state: LinkState,
    },
    ConnectionAttemptEnded {
        session: SessionId,
        role: RadioRole,
        outcome: AttemptOutcome,
        bssid: Bssid,
        config: NetworkConfig,
    },

    // Policy setters.
    SetTrustedConnectionAllowed(bool),
    SetUntrustedConnectionAllowed(bool),
    SetOemPaidConnectionAllowed {
        allowed: bool,
        requestor: Option<WorkSource>,
    },
    SetOemPrivateConnectionAllowed {
        allowed: bool,
        requestor: Option<WorkSource>,
    },
    AddRestrictedConnectionUid(u32),
    RemoveRestrictedConnectionUid(u32),
    SetSpecificNetworkRequestInProgress(bool),
    SetAutoJoinEnabledExternal {
        enable: bool,
        is_admin: bool,
    },
    SetDisallowedSecurityTypes(Vec<SecurityType>),
    MultiInternetStateChanged {
        state: MultiInternetState,
        requestor: Option<WorkSource>,
    },
    MultiInternetRequestsChanged {
        pending: bool,
        specified_bssids: HashMap<Band, Bssid>,
    },
    SetDeviceMobilityState(MobilityState),
    SetPowerSaveMode(bool),

    // Scan controls.
    /// An empty interval list clears the override.
    SetExternalScreenOnScanSchedule {
        intervals_sec: Vec<u32>,
        scan_types: Vec<ScanType>,
    },
    SetOneShotScreenOnConnectivityScanDelay(u64),
    NetworkConfigurationChanged,
    SetPnoScanEnabledByFramework {
        enabled: bool,
        after_toggle: bool,
    },
    PrepareForForcedConnection(NetworkId),
    ForceConnectivityScan(WorkSource),
    SetMiracastMode(bool),
    SetP2pGroupStarted(bool),

    // Network switch dialog.
    DisableNetworkSwitchDialog {
        duration_ms: u64,
    },
    NetworkSwitchDialogResponse {
        id: DialogId,
        accepted: bool,
    },

    // Scan issuer callbacks.
    FullScanResult(ScanDetail),
    ScanResultsAvailable {
        full_band: bool,
    },
    SingleScanFailed {
        full_band: bool,
        reason: String,
    },
    BackgroundScanFailed {
        reason: String,
    },
    BackgroundNetworksFound(Vec<ScanDetail>),

    // Asynchronous answers.
    TimerFired(TimerHandle),
    SessionGranted {
        request: RequestId,
        session: Option<SessionSnapshot>,
    },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetWifiEnabled(_) => "set-wifi-enabled",
            Self::ScreenStateChanged(_) => "screen-state-changed",
            Self::ConnectionStateChanged { .. } => "connection-state-changed",
            Self::ConnectionAttemptEnded { .. } => "connection-attempt-ended",
            Self::SetTrustedConnectionAllowed(_) => "set-trusted-connection-allowed",
            Self::SetUntrustedConnectionAllowed(_) => "set-untrusted-connection-allowed",
            Self::SetOemPaidConnectionAllowed { .. } => "set-oem-paid-connection-allowed",
            Self::SetOemPrivateConnectionAllowed { .. } => "set-oem-private-connection-allowed",
            Self::AddRestrictedConnectionUid(_) => "add-restricted-connection-uid",
            Self::RemoveRestrictedConnectionUid(_) => "remove-restricted-connection-uid",
            Self::SetSpecificNetworkRequestInProgress(_) => "set-specific-network-request",
            Self::SetAutoJoinEnabledExternal { .. } => "set-auto-join-enabled-external",
            Self::SetDisallowedSecurityTypes(_) => "set-disallowed-security-types",
            Self::MultiInternetStateChanged { .. } => "multi-internet-state-changed",
            Self::MultiInternetRequestsChanged { .. } => "multi-internet-requests-changed",
            Self::SetDeviceMobilityState(_) => "set-device-mobility-state",
            Self::SetPowerSaveMode(_) => "set-power-save-mode",
            Self::SetExternalScreenOnScanSchedule { .. } => "set-external-screen-on-schedule",
            Self::SetOneShotScreenOnConnectivityScanDelay(_) => "set-one-shot-screen-on-delay",
            Self::NetworkConfigurationChanged => "network-configuration-changed",
            Self::SetPnoScanEnabledByFramework { .. } => "set-pno-scan-enabled",
            Self::PrepareForForcedConnection(_) => "prepare-for-forced-connection",
            Self::ForceConnectivityScan(_) => "force-connectivity-scan",
            Self::SetMiracastMode(_) => "set-miracast-mode",
            Self::SetP2pGroupStarted(_) => "set-p2p-group-started",
            Self::DisableNetworkSwitchDialog { .. } => "disable-network-switch-dialog",
            Self::NetworkSwitchDialogResponse { .. } => "network-switch-dialog-response",
            Self::FullScanResult(_) => "full-scan-result",
            Self::ScanResultsAvailable { .. } => "scan-results-available",
            Self::SingleScanFailed { .. } => "single-scan-failed",
            Self::BackgroundScanFailed { .. } => "background-scan-failed",
            Self::BackgroundNetworksFound(_) => "background-networks-found",
            Self::TimerFired(_) => "timer-fired",
            Self::SessionGranted { .. } => "session-granted",
        }
    }
}

/// One slot per timer kind.
struct TimerSlots {
    periodic_scan: TimerSlot,
    watchdog: TimerSlot,
    restart_single_scan: TimerSlot,
    restart_connectivity_scan: TimerSlot,
    high_movement_partial_scan: TimerSlot,
    delayed_carrier_partial_scan: TimerSlot,
    network_change_debounce: TimerSlot,
    screen_on_connectivity_scan: TimerSlot,
}

impl TimerSlots {
    fn new() -> Self {
        Self {
            periodic_scan: TimerSlot::new(TimerKind::PeriodicScan),
            watchdog: TimerSlot::new(TimerKind::Watchdog),
            restart_single_scan: TimerSlot::new(TimerKind::RestartSingleScan),
            restart_connectivity_scan: TimerSlot::new(TimerKind::RestartConnectivityScan),
            high_movement_partial_scan: TimerSlot::new(TimerKind::HighMovementPartialScan),
            delayed_carrier_partial_scan: TimerSlot::new(TimerKind::DelayedCarrierPartialScan),
            network_change_debounce: TimerSlot::new(TimerKind::NetworkChangeDebounce),
            screen_on_connectivity_scan: TimerSlot::new(TimerKind::ScreenOnConnectivityScan),
        }
    }

    fn get_mut(&mut self, kind: TimerKind) -> &mut TimerSlot {
        match kind {
            TimerKind::PeriodicScan => &mut self.periodic_scan,
            TimerKind::Watchdog => &mut self.watchdog,
            TimerKind::RestartSingleScan => &mut self.restart_single_scan,
            TimerKind::RestartConnectivityScan => &mut self.restart_connectivity_scan,
            TimerKind::HighMovementPartialScan => &mut self.high_movement_partial_scan,
            TimerKind::DelayedCarrierPartialScan => &mut self.delayed_carrier_partial_scan,
            TimerKind::NetworkChangeDebounce => &mut self.network_change_debounce,
            TimerKind::ScreenOnConnectivityScan => &mut self.screen_on_connectivity_scan,
        }
    }

    fn get(&self, kind: TimerKind) -> &TimerSlot {
        match kind {
            TimerKind::PeriodicScan => &self.periodic_scan,
            TimerKind::Watchdog => &self.watchdog,
            TimerKind::RestartSingleScan => &self.restart_single_scan,
            TimerKind::RestartConnectivityScan => &self.restart_connectivity_scan,
            TimerKind::HighMovementPartialScan => &self.high_movement_partial_scan,
            TimerKind::DelayedCarrierPartialScan => &self.delayed_carrier_partial_scan,
            TimerKind::NetworkChangeDebounce => &self.network_change_debounce,
            TimerKind::ScreenOnConnectivityScan => &self.screen_on_connectivity_scan,
        }
    }
}

/// Lifecycle counters, reported by [`ConnectivityEngine::dump`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleCounters {
    pub starts: u64,
    pub stops: u64,
}

/// Owns all connectivity state. Not `Send`: run it on one task.
pub struct ConnectivityEngine {
    config: EngineConfig,

    clock: Box<dyn Clock>,
    timers: Box<dyn TimerService>,
    scanner: Box<dyn ScanIssuer>,
    selector: Box<dyn CandidateProvider>,
    broker: Box<dyn RadioRoleBroker>,
    registry: Box<dyn NetworkRegistry>,
    metrics: Box<dyn MetricsSink>,
    dialogs: Box<dyn DialogSink>,
    notifier: Box<dyn OpenNetworkNotifier>,

    state: ConnectivityState,
    running: bool,
    counters: LifecycleCounters,

    // Scheduling.
    connected_schedule: ScanSchedule,
    disconnected_schedule: ScanSchedule,
    single_saved_network_schedule: ScanSchedule,
    current_schedule: Option<ScheduleKind>,
    external_schedule: Option<ScanSchedule>,
    cursor: ScheduleCursor,
    last_periodic_scan_ms: Option<u64>,
    last_network_selection_ms: Option<u64>,
    next_screen_on_delay_ms: u64,
    slots: TimerSlots,
    restart_single_full_band: bool,
    pno_started: bool,
    single_scan_retry: ScanRetryCounter,
    pno_retry: ScanRetryCounter,
    low_rssi: LowRssiBackoff,
    initial_scan: InitialScanState,
    failed_initial_partial_scan: bool,
    wait_for_full_band: bool,

    // Result intake and filtering.
    scan_buffer: Vec<ScanDetail>,
    single_chain_ignored: u64,
    blocklist: BssidBlocklist,
    carrier_filter: DelayedCarrierFilter,
    high_movement: HighMovementFilter,
    latest: LatestCandidates,

    // Orchestration.
    attempts: ConnectionAttemptHistory,
    dialog: NetworkSwitchDialogState,
    pending: PendingRequests,

    local_log: LocalLog,
}

impl ConnectivityEngine {
    /// Build an idle engine. Nothing happens until Wi-Fi is enabled and
    /// some connection request turns auto-join on.
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        config.validate()?;
        let Collaborators {
            clock,
            timers,
            scanner,
            selector,
            broker,
            registry,
            metrics,
            dialogs,
            notifier,
        } = collaborators;
        Ok(Self {
            connected_schedule: config.connected_schedule(),
            disconnected_schedule: config.disconnected_schedule(),
            single_saved_network_schedule: config.single_saved_network_schedule(),
            low_rssi: LowRssiBackoff::new(
                config.low_rssi_retry_start_delay_sec * 1000,
                config.low_rssi_retry_max_delay_sec * 1000,
            ),
            carrier_filter: DelayedCarrierFilter::new(
                config.delayed_carrier_ids.iter().copied(),
                config.delayed_carrier_selection_ms,
            ),
            high_movement: HighMovementFilter::new(
                config.high_movement_scan_delay_ms,
                config.high_movement_rssi_delta,
            ),
            config,
            clock,
            timers,
            scanner,
            selector,
            broker,
            registry,
            metrics,
            dialogs,
            notifier,
            state: ConnectivityState::new(),
            running: false,
            counters: LifecycleCounters::default(),
            current_schedule: None,
            external_schedule: None,
            cursor: ScheduleCursor::new(),
            last_periodic_scan_ms: None,
            last_network_selection_ms: None,
            next_screen_on_delay_ms: 0,
            slots: TimerSlots::new(),
            restart_single_full_band: false,
            pno_started: false,
            single_scan_retry: ScanRetryCounter::new(),
            pno_retry: ScanRetryCounter::new(),
            initial_scan: InitialScanState::Complete,
            failed_initial_partial_scan: false,
            wait_for_full_band: false,
            scan_buffer: Vec::new(),
            single_chain_ignored: 0,
            blocklist: BssidBlocklist::new(),
            attempts: ConnectionAttemptHistory::default(),
            dialog: NetworkSwitchDialogState::new(),
            pending: PendingRequests::new(),
            latest: LatestCandidates::new(),
            local_log: LocalLog::new(LOCAL_LOG_CAPACITY),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &ConnectivityState {
        &self.state
    }

    /// Scanning and auto-connect are active.
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn counters(&self) -> LifecycleCounters {
        self.counters
    }

    pub fn current_schedule(&self) -> Option<ScheduleKind> {
        self.current_schedule
    }

    pub fn schedule_cursor(&self) -> ScheduleCursor {
        self.cursor
    }

    pub fn is_timer_armed(&self, kind: TimerKind) -> bool {
        self.slots.get(kind).is_armed()
    }

    pub fn local_log(&self) -> &LocalLog {
        &self.local_log
    }

    /// Process one event to completion.
    pub fn handle_event(&mut self, event: EngineEvent) {
        debug!("engine event: {}", event.name());
        match event {
            EngineEvent::SetWifiEnabled(enabled) => self.set_wifi_enabled(enabled),
            EngineEvent::ScreenStateChanged(on) => self.handle_screen_state_changed(on),
            EngineEvent::ConnectionStateChanged { role, state } => {
                self.handle_connection_state_changed(role, state)
            }
            EngineEvent::ConnectionAttemptEnded {
                session,
                role,
                outcome,
                bssid,
                config,
            } => self.handle_connection_attempt_ended(session, role, outcome, bssid, config),
            EngineEvent::SetTrustedConnectionAllowed(allowed) => {
                self.set_trusted_connection_allowed(allowed)
            }
            EngineEvent::SetUntrustedConnectionAllowed(allowed) => {
                self.set_untrusted_connection_allowed(allowed)
            }
            EngineEvent::SetOemPaidConnectionAllowed { allowed, requestor } => {
                self.set_oem_paid_connection_allowed(allowed, requestor)
            }
            EngineEvent::SetOemPrivateConnectionAllowed { allowed, requestor } => {
                self.set_oem_private_connection_allowed(allowed, requestor)
            }
            EngineEvent::AddRestrictedConnectionUid(uid) => self.add_restricted_connection_uid(uid),
            EngineEvent::RemoveRestrictedConnectionUid(uid) => {
                self.remove_restricted_connection_uid(uid)
            }
            EngineEvent::SetSpecificNetworkRequestInProgress(in_progress) => {
                self.set_specific_network_request_in_progress(in_progress)
            }
            EngineEvent::SetAutoJoinEnabledExternal { enable, is_admin } => {
                self.set_auto_join_enabled_external(enable, is_admin)
            }
            EngineEvent::SetDisallowedSecurityTypes(types) => {
                self.state.disallowed_security = types;
            }
            EngineEvent::MultiInternetStateChanged { state, requestor } => {
                self.set_multi_internet_state(state, requestor)
            }
            EngineEvent::MultiInternetRequestsChanged {
                pending,
                specified_bssids,
            } => {
                self.state.multi_internet.pending_requests = pending;
                self.state.multi_internet.specified_bssids = specified_bssids;
            }
            EngineEvent::SetDeviceMobilityState(mobility) => {
                self.set_device_mobility_state(mobility)
            }
            EngineEvent::SetPowerSaveMode(enabled) => self.state.power_save = enabled,
            EngineEvent::SetExternalScreenOnScanSchedule {
                intervals_sec,
                scan_types,
            } => self.set_external_screen_on_scan_schedule(intervals_sec, scan_types),
            EngineEvent::SetOneShotScreenOnConnectivityScanDelay(delay_ms) => {
                self.next_screen_on_delay_ms = delay_ms;
            }
            EngineEvent::NetworkConfigurationChanged => self.handle_network_configuration_changed(),
            EngineEvent::SetPnoScanEnabledByFramework {
                enabled,
                after_toggle,
            } => self.set_pno_scan_enabled_by_framework(enabled, after_toggle),
            EngineEvent::PrepareForForcedConnection(network_id) => {
                self.prepare_for_forced_connection(network_id)
            }
            EngineEvent::ForceConnectivityScan(work_source) => {
                self.force_connectivity_scan(work_source)
            }
            EngineEvent::SetMiracastMode(active) => self.state.miracast_active = active,
            EngineEvent::SetP2pGroupStarted(started) => self.state.p2p_group_started = started,
            EngineEvent::DisableNetworkSwitchDialog { duration_ms } => {
                self.disable_network_switch_dialog(duration_ms)
            }
            EngineEvent::NetworkSwitchDialogResponse { id, accepted } => {
                self.handle_network_switch_dialog_response(id, accepted)
            }
            EngineEvent::FullScanResult(detail) => self.handle_full_scan_result(detail),
            EngineEvent::ScanResultsAvailable { full_band } => {
                self.handle_scan_results_available(full_band)
            }
            EngineEvent::SingleScanFailed { full_band, reason } => {
                self.handle_single_scan_failed(full_band, &reason)
            }
            EngineEvent::BackgroundScanFailed { reason } => {
                self.handle_background_scan_failed(&reason)
            }
            EngineEvent::BackgroundNetworksFound(details) => {
                self.handle_background_networks_found(details)
            }
            EngineEvent::TimerFired(handle) => self.handle_timer_fired(handle),
            EngineEvent::SessionGranted { request, session } => {
                self.handle_session_granted(request, session)
            }
        }
    }

    /// Human-readable snapshot of flags, schedules, counters and recent
    /// local-log lines.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let s = &self.state;
        let _ = writeln!(out, "Dump of ConnectivityEngine");
        let _ = writeln!(
            out,
            "running: {} (starts {}, stops {})",
            self.running, self.counters.starts, self.counters.stops
        );
        let _ = writeln!(
            out,
            "wifi_enabled: {} auto_join: {} (external {}, by admin {}) screen_on: {}",
            s.wifi_enabled,
            s.auto_join_enabled(),
            s.auto_join_external(),
            s.auto_join_set_by_admin(),
            s.screen_on
        );
        let _ = writeln!(
            out,
            "link_state: {} mobility: {} power_save: {}",
            s.link_state, s.mobility, s.power_save
        );
        let _ = writeln!(
            out,
            "requests: trusted {} untrusted {} oem_paid {} oem_private {} restricted_uids {} specific {} multi_internet {:?}",
            s.trusted_allowed,
            s.untrusted_allowed,
            s.oem_paid_allowed,
            s.oem_private_allowed,
            s.restricted_uids.len(),
            s.specific_request_in_progress,
            s.multi_internet.state
        );
        match (self.current_schedule, self.active_schedule()) {
            (Some(kind), Some(schedule)) => {
                let _ = writeln!(
                    out,
                    "schedule: {:?}{} intervals {:?} types {:?} cursor {}",
                    kind,
                    if self.external_schedule.is_some() { " (external override)" } else { "" },
                    schedule.intervals_sec(),
                    schedule.scan_types(),
                    self.cursor.index()
                );
            }
            _ => {
                let _ = writeln!(out, "schedule: none");
            }
        }
        let _ = writeln!(
            out,
            "pno_started: {} pno_enabled_by_framework: {} initial_scan: {:?} wait_for_full_band: {}",
            self.pno_started, s.pno_enabled_by_framework, self.initial_scan, self.wait_for_full_band
        );
        let _ = writeln!(
            out,
            "scan retries: single {} background {} low_rssi_delay_ms {}",
            self.single_scan_retry.failures(),
            self.pno_retry.failures(),
            self.low_rssi.current_ms()
        );
        let _ = writeln!(
            out,
            "blocklist: {} latest_candidates: {} delayed_carrier_tracked: {} single_chain_ignored: {}",
            self.blocklist.len(),
            self.latest.len(),
            self.carrier_filter.tracked(),
            self.single_chain_ignored
        );
        let _ = writeln!(
            out,
            "connection attempts in window: {} rate limited total: {}",
            self.attempts.len(),
            self.attempts.rate_limited_total()
        );
        let _ = writeln!(
            out,
            "pending session requests: {} active dialog: {:?} dialog rejected: {}",
            self.pending.len(),
            self.dialog.active(),
            self.dialog.is_rejected()
        );
        let _ = writeln!(out, "local log (latest last):");
        for line in self.local_log.lines() {
            let _ = writeln!(out, "  {}", line);
        }
        out
    }

    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn log_local(&mut self, message: impl Into<String>) {
        let now = self.clock.now_ms();
        self.local_log.log(now, message.into());
    }

    fn record(&mut self, event: MetricEvent) {
        self.metrics.record(event);
    }

    /// The external override, else the schedule selected by link state.
    fn active_schedule(&self) -> Option<&ScanSchedule> {
        let kind = self.current_schedule?;
        if let Some(external) = &self.external_schedule {
            return Some(external);
        }
        Some(match kind {
            ScheduleKind::Connected => &self.connected_schedule,
            ScheduleKind::Disconnected => &self.disconnected_schedule,
            ScheduleKind::SingleSavedNetwork => &self.single_saved_network_schedule,
        })
    }

    /// Stretch factor for periodic and background scan intervals. Battery
    /// saver stretches every schedule alike, connected or not.
    fn scan_interval_multiplier(&self) -> u64 {
        if self.config.battery_saver_scan_multiplier_enabled && self.state.power_save {
            POWER_SAVE_SCAN_INTERVAL_MULTIPLIER
        } else {
            1
        }
    }

    fn rearm_timer(&mut self, kind: TimerKind, delay_ms: u64) {
        let timers = self.timers.as_mut();
        self.slots.get_mut(kind).rearm(timers, delay_ms);
    }

    fn cancel_timer(&mut self, kind: TimerKind) -> bool {
        let timers = self.timers.as_mut();
        self.slots.get_mut(kind).cancel(timers)
    }

    /// Arm only if idle. Returns whether a timer was armed.
    fn arm_timer_if_idle(&mut self, kind: TimerKind, delay_ms: u64) -> bool {
        let timers = self.timers.as_mut();
        self.slots.get_mut(kind).arm(timers, delay_ms).is_ok()
    }
}
