//! Scan scheduling: periodic screen-on scans, background (PNO) scans, the
//! disconnected watchdog, submission retries and timer dispatch.

use super::ConnectivityEngine;
use crate::collaborators::{BackgroundScanSettings, MetricEvent, PnoNetwork, ScanChannels, ScanSettings};
use crate::scan::{
    ChannelSet, InitialScanState, RetryDecision, ScanSchedule, ScanType, ScheduleKind,
    CHANNEL_LIST_AGE_MS, MAX_PNO_SCAN_FREQUENCY_AGE_MS, NETWORK_CHANGE_TRIGGER_PNO_THROTTLE_MS,
};
use crate::session::WorkSource;
use crate::state::{LinkState, MobilityState};
use crate::timer::{TimerHandle, TimerKind};
use log::{debug, error, info, warn};

impl ConnectivityEngine {
    /// Restart scanning according to the current state.
    ///
    /// Screen on: periodic single scans on the active schedule. Screen off
    /// and disconnected: a background scan. `immediate` drops the minimum
    /// spacing from the previous periodic scan.
    pub(super) fn start_connectivity_scan(&mut self, immediate: bool) {
        debug!(
            "start_connectivity_scan: screen_on={} link={} immediate={}",
            self.state.screen_on, self.state.link_state, immediate
        );
        if !self.state.should_run() {
            return;
        }
        if !self.registry.has_potential_networks() {
            debug!("no networks to auto-join, not scanning");
            return;
        }
        self.stop_connectivity_scan();

        if !matches!(
            self.state.link_state,
            LinkState::Connected | LinkState::Disconnected
        ) {
            return;
        }
        if self.current_schedule.is_none() {
            return;
        }

        if self.state.screen_on {
            self.start_periodic_scan(immediate);
        } else if self.state.link_state == LinkState::Disconnected && !self.pno_started {
            self.start_disconnected_pno_scan();
        }
    }

    pub(super) fn stop_connectivity_scan(&mut self) {
        self.cancel_timer(TimerKind::PeriodicScan);
        self.cancel_timer(TimerKind::HighMovementPartialScan);
        self.stop_pno_scan();
    }

    fn start_periodic_scan(&mut self, immediate: bool) {
        self.low_rssi.reset();
        if self.state.link_state == LinkState::Connected
            && !self.config.associated_network_selection_enabled
        {
            return;
        }
        if immediate {
            self.last_periodic_scan_ms = None;
        }
        self.cursor.reset();
        self.start_periodic_single_scan();
    }

    /// One periodic firing: maybe scan, then re-arm on the schedule.
    ///
    /// The cursor only advances when a scan is actually issued.
    pub(super) fn start_periodic_single_scan(&mut self) {
        let Some(schedule) = self.active_schedule().cloned() else {
            debug!("periodic scan with no schedule, ignoring");
            return;
        };
        let multiplier = self.scan_interval_multiplier();
        let now = self.now_ms();

        if let Some(last) = self.last_periodic_scan_ms {
            let min_interval = schedule.interval_ms(0, multiplier);
            let elapsed = now.saturating_sub(last);
            if elapsed < min_interval {
                let remaining = min_interval - elapsed;
                debug!("periodic scan too close to the previous one, deferring {}ms", remaining);
                self.arm_periodic_scan_timer(remaining);
                return;
            }
        }

        let mut full_band = true;
        let mut scan_needed = true;
        if self.state.link_state == LinkState::Connected
            && !self.state.multi_internet.is_requested()
        {
            if let Some(primary) = self.broker.primary() {
                let window = self.config.connected_high_rssi_scan_min_window_ms();
                let recently_selected = self
                    .last_network_selection_ms
                    .map_or(false, |t| now.saturating_sub(t) <= window);
                let good_enough = self.selector.is_link_sufficient(&primary)
                    || (self.selector.is_link_good_with_internet(&primary) && recently_selected)
                    || primary.active_stream;
                if good_enough {
                    if self.config.firmware_roaming_supported {
                        self.log_local("No periodic scan: current network is sufficient and firmware roams");
                        scan_needed = false;
                    } else {
                        self.log_local("Periodic partial scan: current network is sufficient");
                        full_band = false;
                    }
                }
            }
        }

        let interval = self.cursor.interval_ms(&schedule, multiplier);
        if scan_needed {
            self.last_periodic_scan_ms = Some(now);
            let scan_type = self.cursor.scan_type(&schedule);
            if self.state.link_state == LinkState::Disconnected
                && self.initial_scan == InitialScanState::Start
            {
                self.start_initial_partial_scan(scan_type);
            } else {
                self.start_single_scan(full_band, WorkSource::engine(), scan_type);
            }
            self.arm_periodic_scan_timer(interval);
            self.cursor.advance(&schedule);
        } else {
            self.arm_periodic_scan_timer(interval);
        }
    }

    fn arm_periodic_scan_timer(&mut self, delay_ms: u64) {
        let timers = self.timers.as_mut();
        if let Err(e) = self.slots.periodic_scan.arm(timers, delay_ms) {
            error!("{}", e);
        }
    }

    /// Reduced-channel scan right after start-up.
    pub(super) fn start_initial_partial_scan(&mut self, scan_type: ScanType) {
        let channels = self.start_single_scan(false, WorkSource::engine(), scan_type);
        // An empty channel history already moved the state to Complete.
        if self.initial_scan == InitialScanState::Start {
            self.initial_scan = InitialScanState::AwaitingResponse;
            self.record(MetricEvent::InitialPartialScan {
                channels: channels.unwrap_or(0),
            });
        }
    }

    /// Single scan, only while the engine should run. Returns the channel
    /// count of a partial scan that was issued.
    pub(super) fn start_single_scan(
        &mut self,
        full_band: bool,
        work_source: WorkSource,
        scan_type: ScanType,
    ) -> Option<usize> {
        if !self.state.should_run() {
            return None;
        }
        self.start_forced_single_scan(full_band, work_source, scan_type)
    }

    /// Single scan regardless of auto-join.
    pub(super) fn start_forced_single_scan(
        &mut self,
        full_band: bool,
        work_source: WorkSource,
        scan_type: ScanType,
    ) -> Option<usize> {
        let channels = if full_band {
            ScanChannels::AllBands
        } else {
            match self.partial_scan_channels() {
                Some(frequencies) => ScanChannels::Frequencies(frequencies),
                None => {
                    self.log_local("No channel history for a partial scan, using full band");
                    if self.initial_scan == InitialScanState::Start {
                        self.initial_scan = InitialScanState::Complete;
                        self.failed_initial_partial_scan = true;
                    }
                    ScanChannels::AllBands
                }
            }
        };
        let partial_count = match &channels {
            ScanChannels::Frequencies(f) => Some(f.len()),
            ScanChannels::AllBands => None,
        };
        if self.issue_single_scan(channels, work_source, scan_type) {
            partial_count
        } else {
            None
        }
    }

    /// Hand a scan to the issuer. Returns false if suppressed.
    fn issue_single_scan(
        &mut self,
        channels: ScanChannels,
        work_source: WorkSource,
        scan_type: ScanType,
    ) -> bool {
        if work_source == WorkSource::engine() && self.state.internal_scans_suppressed() {
            self.log_local("Miracast over P2P is active, ignoring internal scan");
            return false;
        }
        self.low_rssi.reset();
        let full_band = channels.is_full_band();
        debug!(
            "starting {} single scan ({:?}) for {}",
            if full_band { "full band" } else { "partial" },
            scan_type,
            work_source.package
        );
        self.scanner.start_single_scan(ScanSettings {
            scan_type,
            channels,
            work_source,
            report_full_results: true,
        });
        self.record(MetricEvent::SingleScanIssued { full_band });
        true
    }

    /// Re-check scan on a fixed set of frequencies.
    fn start_frequency_scan(&mut self, frequencies: Vec<u32>, reason: &str) {
        if frequencies.is_empty() {
            debug!("{}: no frequencies to scan", reason);
            return;
        }
        if !self.state.should_run() {
            return;
        }
        self.log_local(format!("{}: partial scan on {} channels", reason, frequencies.len()));
        self.issue_single_scan(
            ScanChannels::Frequencies(frequencies),
            WorkSource::engine(),
            ScanType::HighAccuracy,
        );
    }

    /// Channels for a partial scan, or `None` if history is empty.
    ///
    /// Connected: the current channel plus the connected network's recent
    /// ones. Otherwise: recent channels of the most relevant saved networks,
    /// a few per network.
    fn partial_scan_channels(&self) -> Option<Vec<u32>> {
        let primary = self.broker.primary().filter(|p| p.is_connected());
        let set = match primary {
            Some(primary) => {
                let mut set = ChannelSet::new(self.config.associated_partial_scan_max_active_channels);
                if let Some(frequency) = primary.frequency_mhz {
                    set.insert(frequency);
                }
                if let Some(network) = &primary.connected {
                    let recent = self.registry.recent_frequencies(&network.ssid, CHANNEL_LIST_AGE_MS);
                    set.add_network_frequencies(recent, 0);
                }
                set
            }
            None => {
                let max_age = self.config.initial_partial_scan_channel_age_ms();
                let per_network = self.config.initial_partial_scan_max_new_channels_per_network;
                let mut set = ChannelSet::new(self.config.initial_partial_scan_channel_max_count);
                for network in self.registry.scan_optimization_networks() {
                    let recent = self.registry.recent_frequencies(&network.ssid, max_age);
                    if !set.add_network_frequencies(recent, per_network) {
                        break;
                    }
                }
                set
            }
        };
        if set.is_empty() {
            None
        } else {
            Some(set.into_vec())
        }
    }

    fn pno_interval_ms(&self) -> u64 {
        let base = match self.state.mobility {
            MobilityState::Stationary => self.config.pno_stationary_interval_ms,
            _ => self.config.pno_moving_interval_ms,
        };
        base * self.scan_interval_multiplier()
    }

    pub(super) fn start_disconnected_pno_scan(&mut self) {
        if !self.state.pno_enabled_by_framework {
            self.log_local("Background scan disabled by framework");
            return;
        }
        let networks: Vec<PnoNetwork> = self
            .registry
            .scan_optimization_networks()
            .into_iter()
            .map(|network| PnoNetwork {
                frequencies: self
                    .registry
                    .recent_frequencies(&network.ssid, MAX_PNO_SCAN_FREQUENCY_AGE_MS),
                ssid: network.ssid,
                security: network.security,
            })
            .collect();
        if networks.is_empty() {
            info!("No network for background scan");
            return;
        }
        let period_ms = self.pno_interval_ms();
        self.log_local(format!(
            "Starting background scan: {} networks every {}ms",
            networks.len(),
            period_ms
        ));
        self.scanner
            .start_background_scan(BackgroundScanSettings { period_ms, networks });
        self.pno_started = true;
        self.record(MetricEvent::BackgroundScanStarted);
    }

    pub(super) fn stop_pno_scan(&mut self) {
        if !self.pno_started {
            return;
        }
        self.scanner.stop_background_scan();
        self.pno_started = false;
    }

    pub(super) fn set_pno_scan_enabled_by_framework(&mut self, enabled: bool, after_toggle: bool) {
        self.log_local(format!(
            "Background scan enabled by framework: {} (after toggle: {})",
            enabled, after_toggle
        ));
        self.state.pno_enabled_by_framework = enabled;
        self.state.pno_enabled_after_toggle = after_toggle;
        if enabled {
            if !self.state.screen_on && self.state.link_state == LinkState::Disconnected {
                self.start_connectivity_scan(false);
            }
        } else {
            self.stop_pno_scan();
        }
    }

    /// Restart a running background scan if mobility changed its period.
    pub(super) fn set_device_mobility_state(&mut self, mobility: MobilityState) {
        let previous_interval = self.pno_interval_ms();
        if self.state.mobility == mobility {
            return;
        }
        self.log_local(format!("Device mobility state: {} -> {}", self.state.mobility, mobility));
        self.state.mobility = mobility;
        if self.pno_started && previous_interval != self.pno_interval_ms() {
            self.stop_pno_scan();
            self.start_disconnected_pno_scan();
        }
    }

    pub(super) fn set_external_screen_on_scan_schedule(
        &mut self,
        intervals_sec: Vec<u32>,
        scan_types: Vec<ScanType>,
    ) {
        if intervals_sec.is_empty() {
            self.log_local("External screen-on scan schedule cleared");
            self.external_schedule = None;
            return;
        }
        match ScanSchedule::new(intervals_sec, scan_types) {
            Ok(schedule) => {
                self.log_local(format!(
                    "External screen-on scan schedule: {:?} {:?}",
                    schedule.intervals_sec(),
                    schedule.scan_types()
                ));
                self.external_schedule = Some(schedule);
            }
            Err(e) => error!("rejecting external scan schedule: {}", e),
        }
    }

    /// Only one saved network and nothing else worth looking for.
    pub(super) fn use_single_saved_network_schedule(&self) -> bool {
        self.broker.primary().map_or(false, |p| p.is_connected())
            && self.registry.network_count() == 1
            && !self.notifier.is_enabled()
    }

    /// Swap between the connected and single-saved-network schedules.
    /// Returns whether the schedule changed.
    fn update_single_scanning_schedule(&mut self) -> bool {
        if !self.running || self.state.link_state != LinkState::Connected {
            return false;
        }
        let next = if self.use_single_saved_network_schedule() {
            ScheduleKind::SingleSavedNetwork
        } else {
            ScheduleKind::Connected
        };
        if self.current_schedule == Some(next) {
            return false;
        }
        self.current_schedule = Some(next);
        true
    }

    pub(super) fn handle_network_configuration_changed(&mut self) {
        if self.state.screen_on {
            if self.update_single_scanning_schedule() {
                self.log_local("Scan schedule changed after network configuration change");
                self.start_connectivity_scan(false);
            }
            return;
        }
        if self.is_timer_armed(TimerKind::NetworkChangeDebounce) {
            debug!("network change rescan throttled");
            return;
        }
        self.update_single_scanning_schedule();
        self.arm_timer_if_idle(
            TimerKind::NetworkChangeDebounce,
            NETWORK_CHANGE_TRIGGER_PNO_THROTTLE_MS,
        );
    }

    fn handle_watchdog(&mut self) {
        if self.state.link_state != LinkState::Disconnected {
            return;
        }
        self.log_local("Watchdog: disconnected, starting a full band scan");
        self.start_single_scan(true, WorkSource::engine(), ScanType::HighAccuracy);
        if self.config.watchdog_enabled {
            self.rearm_timer(TimerKind::Watchdog, self.config.watchdog_interval_ms);
        }
    }

    pub(super) fn handle_timer_fired(&mut self, handle: TimerHandle) {
        let kind = handle.kind();
        if !self.slots.get_mut(kind).take_if_fired(handle) {
            debug!("ignoring stale {} timer #{}", kind, handle.id());
            return;
        }
        match kind {
            TimerKind::PeriodicScan => {
                if self.state.screen_on {
                    self.start_periodic_single_scan();
                }
            }
            TimerKind::Watchdog => self.handle_watchdog(),
            TimerKind::RestartSingleScan => {
                let full_band = self.restart_single_full_band;
                self.start_single_scan(full_band, WorkSource::engine(), ScanType::HighAccuracy);
            }
            TimerKind::RestartConnectivityScan => self.start_connectivity_scan(true),
            TimerKind::HighMovementPartialScan => {
                let frequencies = self.high_movement.cached_frequencies();
                self.start_frequency_scan(frequencies, "High movement re-check");
            }
            TimerKind::DelayedCarrierPartialScan => {
                let frequencies = self.carrier_filter.frequencies();
                self.start_frequency_scan(frequencies, "Delayed carrier re-check");
            }
            TimerKind::NetworkChangeDebounce | TimerKind::ScreenOnConnectivityScan => {
                self.start_connectivity_scan(false)
            }
        }
    }

    pub(super) fn handle_single_scan_failed(&mut self, full_band: bool, reason: &str) {
        self.log_local(format!("Single scan failed: {}", reason));
        self.record(MetricEvent::SingleScanFailed);
        match self.single_scan_retry.on_failure(self.state.screen_on) {
            RetryDecision::RetryAfter { delay_ms } => {
                self.restart_single_full_band = full_band;
                self.rearm_timer(TimerKind::RestartSingleScan, delay_ms);
            }
            RetryDecision::GiveUp => {
                warn!("single scan failed too many times (or screen off), giving up");
            }
        }
    }

    pub(super) fn handle_background_scan_failed(&mut self, reason: &str) {
        self.log_local(format!("Background scan failed: {}", reason));
        self.record(MetricEvent::BackgroundScanFailed);
        match self.pno_retry.on_failure(true) {
            RetryDecision::RetryAfter { delay_ms } => {
                self.rearm_timer(TimerKind::RestartConnectivityScan, delay_ms);
            }
            RetryDecision::GiveUp => {
                warn!("background scan failed too many times, giving up");
            }
        }
    }
}
