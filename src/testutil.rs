//! Recording fakes for engine tests.
//!
//! Every fake shares one [`FakeWorld`] behind `Rc<RefCell<..>>`: the fakes
//! read their canned answers from it and append what the engine asked for.
//! Tests must not hold a borrow of the world across `handle_event`.

use crate::clock::{Clock, ManualClock};
use crate::collaborators::{
    BackgroundScanSettings, CandidateProvider, Collaborators, DialogSink, MetricEvent,
    MetricsSink, NetworkRegistry, OpenNetworkNotifier, RadioRoleBroker, ScanIssuer,
    ScanSettings, SelectionPolicy,
};
use crate::config::EngineConfig;
use crate::engine::{ConnectivityEngine, EngineEvent};
use crate::orchestrator::{DialogId, RequestId};
use crate::session::{RadioRole, SessionId, SessionSnapshot, WorkSource};
use crate::state::LinkState;
use crate::timer::{TimerHandle, TimerKind, TimerService};
use crate::types::{
    Bssid, CandidateKey, NetworkConfig, NetworkId, ScanCandidate, ScanDetail, SecurityType,
    SelectedNetwork,
};
use std::cell::{RefCell, RefMut};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub fn bssid(n: u8) -> Bssid {
    Bssid::new([0x02, 0, 0, 0, 0, n])
}

pub fn network(id: NetworkId, ssid: &str) -> NetworkConfig {
    NetworkConfig::new(id, ssid, SecurityType::Psk)
}

pub fn detail(ssid: &str, n: u8, frequency_mhz: u32, rssi_dbm: i32) -> ScanDetail {
    ScanDetail {
        ssid: ssid.to_string(),
        bssid: bssid(n),
        frequency_mhz,
        rssi_dbm,
        has_information_elements: true,
        radio_chains: None,
    }
}

pub fn candidate(config: &NetworkConfig, n: u8, frequency_mhz: u32, rssi_dbm: i32) -> ScanCandidate {
    ScanCandidate {
        key: CandidateKey {
            network_id: config.network_id,
            ssid: config.ssid.clone(),
            bssid: bssid(n),
            security: config.security,
        },
        rssi_dbm,
        frequency_mhz,
        passpoint: config.passpoint,
        oem_paid: config.oem_paid,
        oem_private: config.oem_private,
        carrier_id: config.carrier_id,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BrokerCall {
    RequestSession {
        request: RequestId,
        role: RadioRole,
        requestor: WorkSource,
        ssid: String,
        bssid: Option<Bssid>,
    },
    StopSessionsInRole(RadioRole),
    Connect {
        session: SessionId,
        network_id: NetworkId,
        bssid: Bssid,
    },
    Roam {
        session: SessionId,
        network_id: NetworkId,
        bssid: Bssid,
    },
    Disconnect(SessionId),
    SetFirmwareRoaming {
        session: SessionId,
        enabled: bool,
    },
    MarkSecondaryInternet {
        session: SessionId,
        dbs_ap: bool,
    },
    SwitchAccepted(NetworkId),
    SwitchRejected(NetworkId),
}

impl BrokerCall {
    /// Calls that change what a radio is doing.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Roam { .. } | Self::Disconnect(_) | Self::RequestSession { .. }
        )
    }
}

/// Canned answers and call logs shared by all fakes.
pub struct FakeWorld {
    // Timers.
    pub armed: Vec<(TimerHandle, u64)>,
    pub cancelled: Vec<TimerHandle>,

    // Scanner.
    pub single_scans: Vec<ScanSettings>,
    pub background_scans: Vec<BackgroundScanSettings>,
    pub background_stops: usize,

    // Selector. Candidates are derived from scan details and saved networks;
    // selection picks the strongest one.
    pub link_sufficient: bool,
    pub link_good_with_internet: bool,
    pub selection_needed: bool,
    pub open_networks: Vec<ScanDetail>,
    pub selection_inputs: Vec<Vec<ScanCandidate>>,
    pub last_policy: Option<SelectionPolicy>,

    // Broker.
    pub primary: Option<SessionSnapshot>,
    pub secondaries: Vec<SessionSnapshot>,
    pub can_request_more: bool,
    pub broker_calls: Vec<BrokerCall>,

    // Registry.
    pub networks: Vec<NetworkConfig>,
    pub frequencies: HashMap<String, Vec<u32>>,
    pub enabled_networks: Vec<NetworkId>,
    pub registry_resets: usize,

    pub metrics: Vec<MetricEvent>,

    pub dialogs_shown: Vec<(DialogId, NetworkId, NetworkId)>,
    pub dialogs_dismissed: Vec<DialogId>,

    pub notifier_enabled: bool,
    pub notifier_scan_results: usize,
    pub notifier_connected: Vec<String>,
    pub notifier_failures: usize,
}

impl Default for FakeWorld {
    fn default() -> Self {
        Self {
            armed: Vec::new(),
            cancelled: Vec::new(),
            single_scans: Vec::new(),
            background_scans: Vec::new(),
            background_stops: 0,
            link_sufficient: false,
            link_good_with_internet: false,
            selection_needed: true,
            open_networks: Vec::new(),
            selection_inputs: Vec::new(),
            last_policy: None,
            primary: Some(SessionSnapshot::new(SessionId(1), RadioRole::Primary)),
            secondaries: Vec::new(),
            can_request_more: false,
            broker_calls: Vec::new(),
            networks: Vec::new(),
            frequencies: HashMap::new(),
            enabled_networks: Vec::new(),
            registry_resets: 0,
            metrics: Vec::new(),
            dialogs_shown: Vec::new(),
            dialogs_dismissed: Vec::new(),
            notifier_enabled: false,
            notifier_scan_results: 0,
            notifier_connected: Vec::new(),
            notifier_failures: 0,
        }
    }
}

impl FakeWorld {
    /// Most recently armed, not cancelled handle of `kind`.
    pub fn pending_timer(&self, kind: TimerKind) -> Option<TimerHandle> {
        self.armed
            .iter()
            .rev()
            .map(|(h, _)| *h)
            .find(|h| h.kind() == kind && !self.cancelled.contains(h))
    }

    pub fn last_delay(&self, kind: TimerKind) -> Option<u64> {
        self.armed
            .iter()
            .rev()
            .find(|(h, _)| h.kind() == kind)
            .map(|(_, d)| *d)
    }

    pub fn connects(&self) -> Vec<(SessionId, NetworkId, Bssid)> {
        self.broker_calls
            .iter()
            .filter_map(|c| match c {
                BrokerCall::Connect {
                    session,
                    network_id,
                    bssid,
                } => Some((*session, *network_id, *bssid)),
                _ => None,
            })
            .collect()
    }

    pub fn roams(&self) -> Vec<(SessionId, NetworkId, Bssid)> {
        self.broker_calls
            .iter()
            .filter_map(|c| match c {
                BrokerCall::Roam {
                    session,
                    network_id,
                    bssid,
                } => Some((*session, *network_id, *bssid)),
                _ => None,
            })
            .collect()
    }

    pub fn session_requests(&self) -> Vec<(RequestId, RadioRole, Option<Bssid>)> {
        self.broker_calls
            .iter()
            .filter_map(|c| match c {
                BrokerCall::RequestSession {
                    request, role, bssid, ..
                } => Some((*request, *role, *bssid)),
                _ => None,
            })
            .collect()
    }

    pub fn metric_count(&self, event: MetricEvent) -> usize {
        self.metrics.iter().filter(|m| **m == event).count()
    }

    fn network_by_ssid(&self, ssid: &str) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.ssid == ssid)
    }
}

/// The world as shared by the fakes.
pub type SharedWorld = Rc<RefCell<FakeWorld>>;

type World = SharedWorld;

struct FakeTimers(World);

impl TimerService for FakeTimers {
    fn arm(&mut self, kind: TimerKind, delay_ms: u64) -> TimerHandle {
        let mut w = self.0.borrow_mut();
        // Ids only need to be unique; the log never shrinks.
        let handle = TimerHandle::new(w.armed.len() as u64 + 1, kind);
        w.armed.push((handle, delay_ms));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.0.borrow_mut().cancelled.push(handle);
    }
}

struct FakeScanner(World);

impl ScanIssuer for FakeScanner {
    fn start_single_scan(&mut self, settings: ScanSettings) {
        self.0.borrow_mut().single_scans.push(settings);
    }

    fn start_background_scan(&mut self, settings: BackgroundScanSettings) {
        self.0.borrow_mut().background_scans.push(settings);
    }

    fn stop_background_scan(&mut self) {
        self.0.borrow_mut().background_stops += 1;
    }
}

struct FakeSelector(World);

impl CandidateProvider for FakeSelector {
    fn candidates_from_scan(
        &mut self,
        details: &[ScanDetail],
        blocklist: &HashSet<Bssid>,
        _sessions: &[SessionSnapshot],
        policy: &SelectionPolicy,
    ) -> Vec<ScanCandidate> {
        let mut w = self.0.borrow_mut();
        w.last_policy = Some(policy.clone());
        details
            .iter()
            .filter(|d| !blocklist.contains(&d.bssid))
            .filter_map(|d| {
                let config = w.network_by_ssid(&d.ssid)?;
                if !config.is_autojoin_eligible() {
                    return None;
                }
                let mut c = candidate(config, 0, d.frequency_mhz, d.rssi_dbm);
                c.key.bssid = d.bssid;
                Some(c)
            })
            .collect()
    }

    fn select_network(
        &mut self,
        candidates: &[ScanCandidate],
        _allow_user_override: bool,
    ) -> Option<SelectedNetwork> {
        let mut w = self.0.borrow_mut();
        w.selection_inputs.push(candidates.to_vec());
        let best = candidates.iter().max_by_key(|c| c.rssi_dbm)?;
        let config = w
            .networks
            .iter()
            .find(|n| n.network_id == best.network_id())
            .cloned()
            .unwrap_or_else(|| NetworkConfig::new(best.network_id(), best.key.ssid.clone(), best.key.security));
        Some(SelectedNetwork {
            config,
            bssid: Some(best.bssid()),
        })
    }

    fn is_link_sufficient(&self, _session: &SessionSnapshot) -> bool {
        self.0.borrow().link_sufficient
    }

    fn is_link_good_with_internet(&self, _session: &SessionSnapshot) -> bool {
        self.0.borrow().link_good_with_internet
    }

    fn is_network_selection_needed(&self, _session: &SessionSnapshot) -> bool {
        self.0.borrow().selection_needed
    }

    fn open_unsaved_networks(&self) -> Vec<ScanDetail> {
        self.0.borrow().open_networks.clone()
    }
}

struct FakeBroker(World);

impl RadioRoleBroker for FakeBroker {
    fn primary(&self) -> Option<SessionSnapshot> {
        self.0.borrow().primary.clone()
    }

    fn session_in_role(&self, role: RadioRole) -> Option<SessionSnapshot> {
        let w = self.0.borrow();
        if role == RadioRole::Primary {
            return w.primary.clone();
        }
        w.secondaries.iter().find(|s| s.role == role).cloned()
    }

    fn internet_sessions(&self) -> Vec<SessionSnapshot> {
        let w = self.0.borrow();
        w.primary
            .iter()
            .chain(w.secondaries.iter().filter(|s| s.role == RadioRole::SecondaryLongLived))
            .cloned()
            .collect()
    }

    fn can_request_more_in_role(&self, _requestor: &WorkSource, _role: RadioRole) -> bool {
        self.0.borrow().can_request_more
    }

    fn request_session(
        &mut self,
        request: RequestId,
        role: RadioRole,
        requestor: WorkSource,
        ssid: &str,
        bssid: Option<Bssid>,
    ) {
        self.0.borrow_mut().broker_calls.push(BrokerCall::RequestSession {
            request,
            role,
            requestor,
            ssid: ssid.to_string(),
            bssid,
        });
    }

    fn stop_sessions_in_role(&mut self, role: RadioRole) {
        self.0
            .borrow_mut()
            .broker_calls
            .push(BrokerCall::StopSessionsInRole(role));
    }

    fn connect(&mut self, session: SessionId, network_id: NetworkId, _uid: u32, bssid: Bssid) {
        self.0.borrow_mut().broker_calls.push(BrokerCall::Connect {
            session,
            network_id,
            bssid,
        });
    }

    fn roam(&mut self, session: SessionId, network_id: NetworkId, bssid: Bssid) {
        self.0.borrow_mut().broker_calls.push(BrokerCall::Roam {
            session,
            network_id,
            bssid,
        });
    }

    fn disconnect(&mut self, session: SessionId) {
        self.0
            .borrow_mut()
            .broker_calls
            .push(BrokerCall::Disconnect(session));
    }

    fn set_firmware_roaming(&mut self, session: SessionId, enabled: bool) {
        self.0
            .borrow_mut()
            .broker_calls
            .push(BrokerCall::SetFirmwareRoaming { session, enabled });
    }

    fn mark_secondary_internet(&mut self, session: SessionId, dbs_ap: bool) {
        self.0
            .borrow_mut()
            .broker_calls
            .push(BrokerCall::MarkSecondaryInternet { session, dbs_ap });
    }

    fn notify_switch_accepted(&mut self, _session: SessionId, network_id: NetworkId, _bssid: Option<Bssid>) {
        self.0
            .borrow_mut()
            .broker_calls
            .push(BrokerCall::SwitchAccepted(network_id));
    }

    fn notify_switch_rejected(&mut self, _session: SessionId, network_id: NetworkId, _bssid: Option<Bssid>) {
        self.0
            .borrow_mut()
            .broker_calls
            .push(BrokerCall::SwitchRejected(network_id));
    }
}

struct FakeRegistry(World);

impl NetworkRegistry for FakeRegistry {
    fn network(&self, id: NetworkId) -> Option<NetworkConfig> {
        self.0
            .borrow()
            .networks
            .iter()
            .find(|n| n.network_id == id)
            .cloned()
    }

    fn network_for_scan_detail(&self, detail: &ScanDetail) -> Option<NetworkConfig> {
        self.0.borrow().network_by_ssid(&detail.ssid).cloned()
    }

    fn enable_network_selection(&mut self, id: NetworkId) {
        let mut w = self.0.borrow_mut();
        w.enabled_networks.push(id);
        if let Some(n) = w.networks.iter_mut().find(|n| n.network_id == id) {
            n.selection_enabled = true;
        }
    }

    fn network_count(&self) -> usize {
        self.0.borrow().networks.len()
    }

    fn has_potential_networks(&self) -> bool {
        !self.0.borrow().networks.is_empty()
    }

    fn scan_optimization_networks(&self) -> Vec<NetworkConfig> {
        self.0
            .borrow()
            .networks
            .iter()
            .filter(|n| n.is_autojoin_eligible())
            .cloned()
            .collect()
    }

    fn recent_frequencies(&self, ssid: &str, _max_age_ms: u64) -> Vec<u32> {
        self.0
            .borrow()
            .frequencies
            .get(ssid)
            .cloned()
            .unwrap_or_default()
    }

    fn reset_on_wifi_disable(&mut self) {
        self.0.borrow_mut().registry_resets += 1;
    }
}

struct FakeMetrics(World);

impl MetricsSink for FakeMetrics {
    fn record(&mut self, event: MetricEvent) {
        self.0.borrow_mut().metrics.push(event);
    }
}

struct FakeDialogs(World);

impl DialogSink for FakeDialogs {
    fn show_network_switch(&mut self, id: DialogId, current: &NetworkConfig, target: &NetworkConfig) {
        self.0
            .borrow_mut()
            .dialogs_shown
            .push((id, current.network_id, target.network_id));
    }

    fn dismiss(&mut self, id: DialogId) {
        self.0.borrow_mut().dialogs_dismissed.push(id);
    }
}

struct FakeNotifier(World);

impl OpenNetworkNotifier for FakeNotifier {
    fn is_enabled(&self) -> bool {
        self.0.borrow().notifier_enabled
    }

    fn handle_scan_results(&mut self, _open_networks: &[ScanDetail]) {
        self.0.borrow_mut().notifier_scan_results += 1;
    }

    fn handle_screen_state(&mut self, _screen_on: bool) {}

    fn handle_wifi_connected(&mut self, ssid: &str) {
        self.0.borrow_mut().notifier_connected.push(ssid.to_string());
    }

    fn handle_connection_failure(&mut self) {
        self.0.borrow_mut().notifier_failures += 1;
    }

    fn clear_pending(&mut self, _reset_repeat_delay: bool) {}
}

/// Fakes over `world` for everything but time.
pub fn fake_collaborators(
    world: &SharedWorld,
    clock: Box<dyn Clock>,
    timers: Box<dyn TimerService>,
) -> Collaborators {
    Collaborators {
        clock,
        timers,
        scanner: Box::new(FakeScanner(world.clone())),
        selector: Box::new(FakeSelector(world.clone())),
        broker: Box::new(FakeBroker(world.clone())),
        registry: Box::new(FakeRegistry(world.clone())),
        metrics: Box::new(FakeMetrics(world.clone())),
        dialogs: Box::new(FakeDialogs(world.clone())),
        notifier: Box::new(FakeNotifier(world.clone())),
    }
}

/// An engine wired to fakes, plus handles on the fakes.
pub struct Harness {
    pub engine: ConnectivityEngine,
    pub clock: ManualClock,
    world: World,
}

impl Harness {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_world(config, FakeWorld::default())
    }

    pub fn with_world(config: EngineConfig, world: FakeWorld) -> Self {
        let world = Rc::new(RefCell::new(world));
        let clock = ManualClock::new(1_000_000);
        let timers = Box::new(FakeTimers(world.clone()));
        let collaborators = fake_collaborators(&world, Box::new(clock.clone()), timers);
        let engine = ConnectivityEngine::new(config, collaborators).unwrap();
        Self {
            engine,
            clock,
            world,
        }
    }

    pub fn world(&self) -> RefMut<'_, FakeWorld> {
        self.world.borrow_mut()
    }

    pub fn send(&mut self, event: EngineEvent) {
        self.engine.handle_event(event);
    }

    /// Fire the pending timer of `kind`. Returns false if none is pending.
    pub fn fire(&mut self, kind: TimerKind) -> bool {
        let handle = self.world().pending_timer(kind);
        match handle {
            Some(handle) => {
                self.send(EngineEvent::TimerFired(handle));
                true
            }
            None => false,
        }
    }

    /// Wi-Fi on, trusted connections requested, screen as given, link
    /// disconnected: the engine is running and scanning.
    pub fn start_disconnected(&mut self, screen_on: bool) {
        self.send(EngineEvent::ScreenStateChanged(screen_on));
        self.send(EngineEvent::SetWifiEnabled(true));
        self.send(EngineEvent::SetTrustedConnectionAllowed(true));
        self.send(EngineEvent::ConnectionStateChanged {
            role: RadioRole::Primary,
            state: LinkState::Disconnected,
        });
    }

    /// Deliver a single scan batch.
    pub fn deliver_scan(&mut self, details: Vec<ScanDetail>, full_band: bool) {
        for d in details {
            self.send(EngineEvent::FullScanResult(d));
        }
        self.send(EngineEvent::ScanResultsAvailable { full_band });
    }

    pub fn set_primary_connected(&mut self, config: NetworkConfig, n: u8, frequency_mhz: u32) {
        self.world().primary = Some(SessionSnapshot::connected_to(
            SessionId(1),
            RadioRole::Primary,
            config,
            bssid(n),
            frequency_mhz,
        ));
        self.send(EngineEvent::ConnectionStateChanged {
            role: RadioRole::Primary,
            state: LinkState::Connected,
        });
    }
}
