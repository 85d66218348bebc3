//! Interfaces to everything the engine drives but does not own.
//!
//! All methods are fire-and-forget from the engine's point of view.
//! Asynchronous answers (scan results, scan failures, session grants, dialog
//! responses) come back later as [`crate::engine::EngineEvent`]s on the
//! engine's serial queue, never as return values or callbacks.

use crate::clock::Clock;
use crate::orchestrator::{DialogId, RequestId};
use crate::scan::ScanType;
use crate::session::{RadioRole, SessionId, SessionSnapshot, WorkSource};
use crate::timer::TimerService;
use crate::types::{
    Bssid, NetworkConfig, NetworkId, ScanCandidate, ScanDetail, SecurityType, SelectedNetwork,
};
use std::collections::{BTreeSet, HashSet};

/// Channels a single scan covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanChannels {
    /// Every band, DFS channels included.
    AllBands,
    Frequencies(Vec<u32>),
}

impl ScanChannels {
    pub fn is_full_band(&self) -> bool {
        matches!(self, Self::AllBands)
    }
}

/// Settings of one single (one-shot) scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    pub scan_type: ScanType,
    pub channels: ScanChannels,
    pub work_source: WorkSource,
    /// Deliver each result as it arrives as well as the batch at the end.
    pub report_full_results: bool,
}

/// One network searched for by a background scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PnoNetwork {
    pub ssid: String,
    pub security: SecurityType,
    /// Channels the network was recently seen on. Empty means all channels.
    pub frequencies: Vec<u32>,
}

/// Settings of a background (PNO) scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundScanSettings {
    pub period_ms: u64,
    pub networks: Vec<PnoNetwork>,
}

/// Executes scans. Outcomes arrive as engine events.
pub trait ScanIssuer {
    fn start_single_scan(&mut self, settings: ScanSettings);
    fn start_background_scan(&mut self, settings: BackgroundScanSettings);
    fn stop_background_scan(&mut self);
}

/// Policy flags handed to the candidate provider with every batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub untrusted_allowed: bool,
    pub oem_paid_allowed: bool,
    pub oem_private_allowed: bool,
    pub restricted_uids: BTreeSet<u32>,
    /// Run selection even if the current link would pass the sufficiency check.
    pub skip_sufficiency_check: bool,
    pub disallowed_security: Vec<SecurityType>,
}

/// Ranks scan results and picks networks.
pub trait CandidateProvider {
    fn candidates_from_scan(
        &mut self,
        details: &[ScanDetail],
        blocklist: &HashSet<Bssid>,
        sessions: &[SessionSnapshot],
        policy: &SelectionPolicy,
    ) -> Vec<ScanCandidate>;

    /// Best network among `candidates`. `allow_user_override` lets a
    /// remembered user choice win over the score.
    fn select_network(
        &mut self,
        candidates: &[ScanCandidate],
        allow_user_override: bool,
    ) -> Option<SelectedNetwork>;

    /// The current link meets the quality bar where re-selection is pointless.
    fn is_link_sufficient(&self, session: &SessionSnapshot) -> bool;

    /// Good signal and validated (or intentionally absent) internet.
    fn is_link_good_with_internet(&self, session: &SessionSnapshot) -> bool;

    fn is_network_selection_needed(&self, session: &SessionSnapshot) -> bool;

    /// Unsaved open networks from the last batch, for the open network notifier.
    fn open_unsaved_networks(&self) -> Vec<ScanDetail>;
}

/// Owns radio sessions and their lifecycle.
pub trait RadioRoleBroker {
    fn primary(&self) -> Option<SessionSnapshot>;
    fn session_in_role(&self, role: RadioRole) -> Option<SessionSnapshot>;
    /// Sessions providing internet (primary and secondary long-lived).
    fn internet_sessions(&self) -> Vec<SessionSnapshot>;
    fn can_request_more_in_role(&self, requestor: &WorkSource, role: RadioRole) -> bool;

    /// Ask for a session. The answer arrives as `SessionGranted` carrying
    /// `request`; it may be an existing session of another role, or none.
    fn request_session(
        &mut self,
        request: RequestId,
        role: RadioRole,
        requestor: WorkSource,
        ssid: &str,
        bssid: Option<Bssid>,
    );
    fn stop_sessions_in_role(&mut self, role: RadioRole);

    fn connect(&mut self, session: SessionId, network_id: NetworkId, uid: u32, bssid: Bssid);
    fn roam(&mut self, session: SessionId, network_id: NetworkId, bssid: Bssid);
    fn disconnect(&mut self, session: SessionId);
    fn set_firmware_roaming(&mut self, session: SessionId, enabled: bool);
    fn mark_secondary_internet(&mut self, session: SessionId, dbs_ap: bool);
    fn notify_switch_accepted(&mut self, session: SessionId, network_id: NetworkId, bssid: Option<Bssid>);
    fn notify_switch_rejected(&mut self, session: SessionId, network_id: NetworkId, bssid: Option<Bssid>);
}

/// Saved, suggested and passpoint networks.
pub trait NetworkRegistry {
    fn network(&self, id: NetworkId) -> Option<NetworkConfig>;
    fn network_for_scan_detail(&self, detail: &ScanDetail) -> Option<NetworkConfig>;
    fn enable_network_selection(&mut self, id: NetworkId);

    /// Saved plus suggested plus passpoint networks.
    fn network_count(&self) -> usize;

    /// Anything at all that could be auto-joined.
    fn has_potential_networks(&self) -> bool;

    /// Connectable non-passpoint networks, most relevant first.
    fn scan_optimization_networks(&self) -> Vec<NetworkConfig>;

    /// Channels `ssid` was seen on within the last `max_age_ms`.
    fn recent_frequencies(&self, ssid: &str, max_age_ms: u64) -> Vec<u32>;

    /// Forget temporary disables and subscription pinning.
    fn reset_on_wifi_disable(&mut self);
}

/// Counted occurrences, fire-and-forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricEvent {
    SingleScanIssued { full_band: bool },
    SingleScanFailed,
    BackgroundScanStarted,
    BackgroundScanFailed,
    ConnectAttempt,
    RoamAttempt,
    RateLimited,
    NoCandidate,
    HighMovementSkipped,
    HighMovementStarted,
    MakeBeforeBreakTriggered,
    InitialPartialScan { channels: usize },
    InitialPartialScanResult { candidate_found: bool },
}

pub trait MetricsSink {
    fn record(&mut self, event: MetricEvent);
}

/// Shows and dismisses user-facing prompts. Answers arrive as
/// `NetworkSwitchDialogResponse` events.
pub trait DialogSink {
    fn show_network_switch(&mut self, id: DialogId, current: &NetworkConfig, target: &NetworkConfig);
    fn dismiss(&mut self, id: DialogId);
}

/// Suggests open networks to the user when nothing saved is around.
pub trait OpenNetworkNotifier {
    fn is_enabled(&self) -> bool;
    fn handle_scan_results(&mut self, open_networks: &[ScanDetail]);
    fn handle_screen_state(&mut self, screen_on: bool);
    fn handle_wifi_connected(&mut self, ssid: &str);
    fn handle_connection_failure(&mut self);
    fn clear_pending(&mut self, reset_repeat_delay: bool);
}

/// Everything the engine talks to, bundled for construction.
pub struct Collaborators {
    pub clock: Box<dyn Clock>,
    pub timers: Box<dyn TimerService>,
    pub scanner: Box<dyn ScanIssuer>,
    pub selector: Box<dyn CandidateProvider>,
    pub broker: Box<dyn RadioRoleBroker>,
    pub registry: Box<dyn NetworkRegistry>,
    pub metrics: Box<dyn MetricsSink>,
    pub dialogs: Box<dyn DialogSink>,
    pub notifier: Box<dyn OpenNetworkNotifier>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_channels_full_band() {
        assert!(ScanChannels::AllBands.is_full_band());
        assert!(!ScanChannels::Frequencies(vec![2412]).is_full_band());
    }

    #[test]
    fn test_default_policy_allows_nothing_extra() {
        let policy = SelectionPolicy::default();
        assert!(!policy.untrusted_allowed);
        assert!(policy.restricted_uids.is_empty());
    }
}
