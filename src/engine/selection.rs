//! Scan result intake and the candidate filter pipeline.

use super::ConnectivityEngine;
use crate::collaborators::{MetricEvent, SelectionPolicy};
use crate::filter::{BlockReason, HighMovementOutcome};
use crate::scan::{InitialScanState, ScanOrigin};
use crate::session::{RadioRole, SessionSnapshot, WorkSource};
use crate::state::{LinkState, MobilityState};
use crate::timer::TimerKind;
use crate::types::{ScanCandidate, ScanDetail};
use log::{debug, error};

/// What became of one batch of scan results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SelectionOutcome {
    /// A connection, or a session request leading to one, was triggered.
    CandidateSelected,
    NoCandidate,
    /// Parked on a session grant; the grant finishes the bookkeeping.
    Deferred,
}

impl ConnectivityEngine {
    pub(super) fn handle_full_scan_result(&mut self, detail: ScanDetail) {
        if !self.running {
            return;
        }
        if detail.radio_chains == Some(1) && !self.config.use_single_radio_chain_results {
            self.single_chain_ignored += 1;
            debug!("ignoring single radio chain result from {}", detail.bssid);
            return;
        }
        self.scan_buffer.push(detail);
    }

    /// End of a single scan. The buffered results are consumed whatever
    /// happens to them.
    pub(super) fn handle_scan_results_available(&mut self, full_band: bool) {
        self.single_scan_retry.reset();
        let details = std::mem::take(&mut self.scan_buffer);
        if !self.running {
            return;
        }
        if self.wait_for_full_band {
            if !full_band {
                self.log_local(format!(
                    "Discarding {} partial scan results while waiting for full band",
                    details.len()
                ));
                return;
            }
            self.wait_for_full_band = false;
        }
        let origin = ScanOrigin::SingleScan { full_band };
        let outcome = self.handle_scan_results(details, origin);
        if outcome != SelectionOutcome::Deferred {
            self.on_scan_results_handled(origin, outcome == SelectionOutcome::CandidateSelected);
        }
    }

    pub(super) fn handle_background_networks_found(&mut self, details: Vec<ScanDetail>) {
        if !self.running {
            return;
        }
        // Matches without information elements cannot be evaluated.
        let details: Vec<ScanDetail> = details
            .into_iter()
            .filter(|d| d.has_information_elements)
            .collect();
        self.pno_retry.reset();
        self.log_local(format!("Background scan found {} networks", details.len()));
        let origin = ScanOrigin::Background;
        let outcome = self.handle_scan_results(details, origin);
        if outcome != SelectionOutcome::Deferred {
            self.on_scan_results_handled(origin, outcome == SelectionOutcome::CandidateSelected);
        }
    }

    /// Post-selection bookkeeping for one batch.
    pub(super) fn on_scan_results_handled(&mut self, origin: ScanOrigin, candidate_selected: bool) {
        match origin {
            ScanOrigin::SingleScan { .. } => match self.initial_scan {
                InitialScanState::AwaitingResponse => {
                    self.initial_scan = InitialScanState::Complete;
                    if candidate_selected {
                        self.record(MetricEvent::InitialPartialScanResult {
                            candidate_found: true,
                        });
                    } else {
                        self.log_local("Initial partial scan found nothing, scanning full band");
                        self.failed_initial_partial_scan = true;
                        self.start_connectivity_scan(true);
                    }
                }
                InitialScanState::Complete => {
                    if self.failed_initial_partial_scan && candidate_selected {
                        self.record(MetricEvent::InitialPartialScanResult {
                            candidate_found: false,
                        });
                    }
                    self.failed_initial_partial_scan = false;
                }
                InitialScanState::Start => {}
            },
            ScanOrigin::Background => {
                if candidate_selected {
                    self.low_rssi.reset();
                } else {
                    let delay = self.low_rssi.next_delay();
                    self.log_local(format!(
                        "Background scan found no candidate, regular scan in {}ms",
                        delay
                    ));
                    self.rearm_timer(TimerKind::RestartConnectivityScan, delay);
                }
            }
        }
    }

    /// Run selection even on a sufficient link when some secondary use
    /// could still be served.
    fn should_skip_sufficiency_check(&self, sessions: &[SessionSnapshot]) -> bool {
        if sessions.iter().any(|s| s.role == RadioRole::SecondaryLongLived) {
            return false;
        }
        if self.state.oem_paid_allowed || self.state.oem_private_allowed {
            match self.state.any_oem_requestor() {
                Some(requestor) => {
                    if self
                        .broker
                        .can_request_more_in_role(requestor, RadioRole::SecondaryLongLived)
                    {
                        return true;
                    }
                }
                None => error!("OEM connections allowed without a requestor"),
            }
        }
        if self.state.multi_internet.is_requested() {
            if let Some(requestor) = &self.state.multi_internet.requestor {
                if self
                    .broker
                    .can_request_more_in_role(requestor, RadioRole::SecondaryLongLived)
                {
                    return true;
                }
            }
        }
        self.broker
            .can_request_more_in_role(&WorkSource::engine(), RadioRole::SecondaryTransient)
    }

    fn selection_policy(&self, skip_sufficiency_check: bool) -> SelectionPolicy {
        SelectionPolicy {
            untrusted_allowed: self.state.untrusted_allowed,
            oem_paid_allowed: self.state.oem_paid_allowed,
            oem_private_allowed: self.state.oem_private_allowed,
            restricted_uids: self.state.restricted_uids.clone(),
            skip_sufficiency_check,
            disallowed_security: self.state.disallowed_security.clone(),
        }
    }

    /// Blocklist reconciliation, ranking, filtering, then orchestration.
    pub(super) fn handle_scan_results(
        &mut self,
        details: Vec<ScanDetail>,
        origin: ScanOrigin,
    ) -> SelectionOutcome {
        let now = self.now_ms();
        let sessions = self.broker.internet_sessions();
        let skip_sufficiency_check = self.should_skip_sufficiency_check(&sessions);

        if let ScanOrigin::SingleScan { full_band: true } = origin {
            let cleared = self.blocklist.clear_for_reason(BlockReason::FastReconnect);
            if cleared > 0 {
                debug!("cleared {} fast reconnect blocks", cleared);
            }
        }
        for detail in self.blocklist.try_enabling_blocked(&details, now) {
            let Some(config) = self.registry.network_for_scan_detail(&detail) else {
                continue;
            };
            if !config.selection_enabled && !self.blocklist.has_blocked_for_ssid(&config.ssid, now) {
                self.registry.enable_network_selection(config.network_id);
            }
        }
        let blocked = self.blocklist.update_and_get(now);

        self.log_local(format!("{} results: start network selection", origin.name()));
        let policy = self.selection_policy(skip_sufficiency_check);
        let ranked = self
            .selector
            .candidates_from_scan(&details, &blocked, &sessions, &policy);
        let candidates = self.filter_candidates(ranked, origin, now);
        self.last_network_selection_ms = Some(now);

        if candidates.is_empty() {
            self.log_local(format!("{}: no candidates", origin.name()));
            self.handle_no_candidate();
            return SelectionOutcome::NoCandidate;
        }

        if (self.state.oem_paid_allowed || self.state.oem_private_allowed)
            && self.config.sta_sta_for_restricted_supported
        {
            let (restricted, normal): (Vec<ScanCandidate>, Vec<ScanCandidate>) = candidates
                .iter()
                .cloned()
                .partition(|c| c.is_oem_restricted());
            if !restricted.is_empty() {
                return self.handle_restricted_candidates(origin, normal, restricted, candidates);
            }
        }

        if self.state.multi_internet.is_active() && self.state.multi_internet.pending_requests {
            if self.handle_multi_internet_candidates(&candidates, origin) {
                return SelectionOutcome::Deferred;
            }
            let needed = self
                .broker
                .primary()
                .map_or(false, |p| self.selector.is_network_selection_needed(&p));
            if !needed {
                return SelectionOutcome::Deferred;
            }
        }

        self.connect_primary_to_best(origin, &candidates)
    }

    /// Delayed-carrier hold-back, then (only while moving fast) the
    /// stability check. The latest-candidates cache sees the list in between.
    fn filter_candidates(
        &mut self,
        ranked: Vec<ScanCandidate>,
        origin: ScanOrigin,
        now: u64,
    ) -> Vec<ScanCandidate> {
        let not_partial = origin.is_not_partial();
        let held = self.carrier_filter.filter(ranked, not_partial, now);
        if held.has_delayed
            && not_partial
            && self.state.link_state != LinkState::Connected
            && self.arm_timer_if_idle(
                TimerKind::DelayedCarrierPartialScan,
                self.config.delayed_carrier_selection_ms,
            )
        {
            self.log_local("Delayed carrier candidates held back, re-check scheduled");
        }
        let candidates = held.candidates;
        self.latest.store(candidates.clone(), now);

        if self.state.mobility != MobilityState::HighMovement
            || !self.config.high_movement_selection_enabled
        {
            return candidates;
        }
        let had_candidates = !candidates.is_empty();
        match self.high_movement.filter(candidates, not_partial, now) {
            HighMovementOutcome::Stable(stable) => {
                self.record(MetricEvent::HighMovementStarted);
                stable
            }
            HighMovementOutcome::Suppressed { rescan_after_ms } => {
                if had_candidates {
                    self.record(MetricEvent::HighMovementSkipped);
                }
                if let Some(delay) = rescan_after_ms {
                    self.arm_timer_if_idle(TimerKind::HighMovementPartialScan, delay);
                }
                Vec::new()
            }
        }
    }

    /// Nothing to connect to. Offers open networks while disconnected.
    pub(super) fn handle_no_candidate(&mut self) {
        if self.state.link_state == LinkState::Disconnected {
            let open = self.selector.open_unsaved_networks();
            self.notifier.handle_scan_results(&open);
        }
        self.record(MetricEvent::NoCandidate);
    }
}
