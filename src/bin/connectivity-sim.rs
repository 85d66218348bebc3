//! Host simulation of the connectivity engine.
//!
//! Runs the engine on a tokio current-thread runtime against a simulated
//! radio: a handful of access points whose signal drifts over time, a
//! broker with one primary session, and a dialog sink that accepts every
//! prompt. Useful for watching scheduling and roaming decisions in the log.
//!
//! Serves engine counters at http://localhost:8080/stats and the engine
//! dump at http://localhost:8080/dump.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin connectivity-sim -- [--config engine.json] [--stats-port 8080] [--no-stats]
//! ```

use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wifi_connectivity_engine::{
    engine_channel, AttemptOutcome, BackgroundScanSettings, Bssid, CandidateKey,
    CandidateProvider, Collaborators, ConnectivityEngine, DialogId, DialogSink,
    DiagnosticsServer, EngineConfig, EngineEvent, EngineHandle, EngineRunner, EngineStats,
    LinkState, NetworkConfig, NetworkId, NetworkRegistry, OpenNetworkNotifier, RadioRole,
    RadioRoleBroker, RequestId, ScanCandidate, ScanChannels, ScanDetail, ScanIssuer,
    ScanSettings, SecurityType, SelectedNetwork, SelectionPolicy, SessionId, SessionSnapshot,
    TokioClock, TokioTimerService, WorkSource, DEFAULT_DIAGNOSTICS_PORT,
};

const SCAN_LATENCY: Duration = Duration::from_millis(400);
const CONNECT_LATENCY: Duration = Duration::from_millis(800);
const DRIFT_INTERVAL: Duration = Duration::from_secs(10);
const SUFFICIENT_RSSI_DBM: i32 = -65;

#[derive(Debug, Clone)]
struct AccessPoint {
    ssid: String,
    bssid: Bssid,
    frequency_mhz: u32,
    rssi_dbm: i32,
}

#[derive(Debug)]
struct SimState {
    access_points: Vec<AccessPoint>,
    saved: Vec<NetworkConfig>,
    primary: SessionSnapshot,
    last_details: Vec<ScanDetail>,
    drift_step: u32,
}

type Shared = Arc<Mutex<SimState>>;

fn lock(state: &Shared) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn ap(ssid: &str, last_octet: u8, frequency_mhz: u32, rssi_dbm: i32) -> AccessPoint {
    AccessPoint {
        ssid: ssid.to_string(),
        bssid: Bssid::new([0x02, 0x00, 0x5e, 0x10, 0x00, last_octet]),
        frequency_mhz,
        rssi_dbm,
    }
}

impl SimState {
    fn new() -> Self {
        Self {
            access_points: vec![
                ap("home", 1, 2412, -70),
                ap("home", 2, 5180, -58),
                ap("office", 3, 5240, -80),
                ap("cafe-guest", 4, 2437, -62),
            ],
            saved: vec![
                NetworkConfig::new(1, "home", SecurityType::Psk),
                NetworkConfig::new(2, "office", SecurityType::Sae),
            ],
            primary: SessionSnapshot::new(SessionId(1), RadioRole::Primary),
            last_details: Vec::new(),
            drift_step: 0,
        }
    }

    fn saved_by_ssid(&self, ssid: &str) -> Option<&NetworkConfig> {
        self.saved.iter().find(|n| n.ssid == ssid)
    }

    fn visible(&self, channels: &ScanChannels) -> Vec<ScanDetail> {
        self.access_points
            .iter()
            .filter(|ap| match channels {
                ScanChannels::AllBands => true,
                ScanChannels::Frequencies(freqs) => freqs.contains(&ap.frequency_mhz),
            })
            .map(|ap| ScanDetail {
                ssid: ap.ssid.clone(),
                bssid: ap.bssid,
                frequency_mhz: ap.frequency_mhz,
                rssi_dbm: ap.rssi_dbm,
                has_information_elements: true,
                radio_chains: Some(2),
            })
            .collect()
    }

    fn rssi_of(&self, bssid: Bssid) -> Option<i32> {
        self.access_points
            .iter()
            .find(|ap| ap.bssid == bssid)
            .map(|ap| ap.rssi_dbm)
    }

    /// Walk the user between the home access points.
    fn drift(&mut self) {
        self.drift_step += 1;
        let toward_second = (self.drift_step / 6) % 2 == 0;
        for ap in self.access_points.iter_mut().filter(|ap| ap.ssid == "home") {
            let closer = (ap.bssid.octets()[5] == 2) == toward_second;
            ap.rssi_dbm = if closer {
                (ap.rssi_dbm + 3).min(-45)
            } else {
                (ap.rssi_dbm - 3).max(-88)
            };
        }
    }
}

fn post(handle: &EngineHandle, event: EngineEvent) {
    if let Err(e) = handle.send(event) {
        debug!("{}", e);
    }
}

struct SimScanner {
    state: Shared,
    handle: EngineHandle,
    background: Option<CancellationToken>,
}

impl ScanIssuer for SimScanner {
    fn start_single_scan(&mut self, settings: ScanSettings) {
        let details = lock(&self.state).visible(&settings.channels);
        let full_band = settings.channels.is_full_band();
        info!(
            "sim: {:?} scan on {} for {}, {} results",
            settings.scan_type,
            if full_band { "all bands" } else { "partial channels" },
            settings.work_source.package,
            details.len()
        );
        let handle = self.handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(SCAN_LATENCY).await;
            for detail in details {
                post(&handle, EngineEvent::FullScanResult(detail));
            }
            post(&handle, EngineEvent::ScanResultsAvailable { full_band });
        });
    }

    fn start_background_scan(&mut self, settings: BackgroundScanSettings) {
        self.stop_background_scan();
        info!(
            "sim: background scan every {}ms for {} networks",
            settings.period_ms,
            settings.networks.len()
        );
        let wanted: HashSet<String> = settings.networks.into_iter().map(|n| n.ssid).collect();
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let state = self.state.clone();
        let handle = self.handle.clone();
        let period = Duration::from_millis(settings.period_ms);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = tokio::time::sleep(period) => {
                        let found: Vec<ScanDetail> = lock(&state)
                            .visible(&ScanChannels::AllBands)
                            .into_iter()
                            .filter(|d| wanted.contains(&d.ssid))
                            .collect();
                        if !found.is_empty() {
                            post(&handle, EngineEvent::BackgroundNetworksFound(found));
                            break;
                        }
                    }
                }
            }
        });
        self.background = Some(token);
    }

    fn stop_background_scan(&mut self) {
        if let Some(token) = self.background.take() {
            token.cancel();
        }
    }
}

struct SimSelector {
    state: Shared,
}

impl CandidateProvider for SimSelector {
    fn candidates_from_scan(
        &mut self,
        details: &[ScanDetail],
        blocklist: &HashSet<Bssid>,
        _sessions: &[SessionSnapshot],
        policy: &SelectionPolicy,
    ) -> Vec<ScanCandidate> {
        let mut state = lock(&self.state);
        state.last_details = details.to_vec();
        details
            .iter()
            .filter(|d| !blocklist.contains(&d.bssid))
            .filter_map(|d| {
                let config = state.saved_by_ssid(&d.ssid)?;
                if !config.is_autojoin_eligible()
                    || policy.disallowed_security.contains(&config.security)
                {
                    return None;
                }
                Some(ScanCandidate {
                    key: CandidateKey {
                        network_id: config.network_id,
                        ssid: config.ssid.clone(),
                        bssid: d.bssid,
                        security: config.security,
                    },
                    rssi_dbm: d.rssi_dbm,
                    frequency_mhz: d.frequency_mhz,
                    passpoint: config.passpoint,
                    oem_paid: config.oem_paid,
                    oem_private: config.oem_private,
                    carrier_id: config.carrier_id,
                })
            })
            .collect()
    }

    fn select_network(
        &mut self,
        candidates: &[ScanCandidate],
        _allow_user_override: bool,
    ) -> Option<SelectedNetwork> {
        let best = candidates.iter().max_by_key(|c| c.rssi_dbm)?;
        let config = lock(&self.state).saved_by_ssid(&best.key.ssid)?.clone();
        Some(SelectedNetwork {
            config,
            bssid: Some(best.bssid()),
        })
    }

    fn is_link_sufficient(&self, session: &SessionSnapshot) -> bool {
        let state = lock(&self.state);
        session
            .connected_bssid
            .and_then(|b| state.rssi_of(b))
            .map_or(false, |rssi| rssi >= SUFFICIENT_RSSI_DBM)
    }

    fn is_link_good_with_internet(&self, session: &SessionSnapshot) -> bool {
        self.is_link_sufficient(session)
    }

    fn is_network_selection_needed(&self, session: &SessionSnapshot) -> bool {
        !self.is_link_sufficient(session)
    }

    fn open_unsaved_networks(&self) -> Vec<ScanDetail> {
        let state = lock(&self.state);
        state
            .last_details
            .iter()
            .filter(|d| state.saved_by_ssid(&d.ssid).is_none())
            .cloned()
            .collect()
    }
}

/// Single-radio broker: every session request is answered with the primary.
struct SimBroker {
    state: Shared,
    handle: EngineHandle,
}

impl SimBroker {
    fn associate(&mut self, session: SessionId, network_id: NetworkId, bssid: Bssid, roam: bool) {
        let mut state = lock(&self.state);
        let Some(config) = state.saved.iter().find(|n| n.network_id == network_id).cloned() else {
            warn!("sim: unknown network {}", network_id);
            return;
        };
        let Some(target) = state.access_points.iter().find(|ap| {
            ap.ssid == config.ssid && (bssid.is_any() || ap.bssid == bssid)
        }) else {
            warn!("sim: {} not in range", config.ssid);
            return;
        };
        let (target_bssid, frequency_mhz) = (target.bssid, target.frequency_mhz);
        info!(
            "sim: {} {} to {} via {}",
            session,
            if roam { "roaming" } else { "connecting" },
            config.ssid,
            target_bssid
        );
        state.primary = SessionSnapshot::connected_to(
            session,
            RadioRole::Primary,
            config.clone(),
            target_bssid,
            frequency_mhz,
        );
        drop(state);

        let handle = self.handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(CONNECT_LATENCY).await;
            post(
                &handle,
                EngineEvent::ConnectionAttemptEnded {
                    session,
                    role: RadioRole::Primary,
                    outcome: AttemptOutcome::Success,
                    bssid: target_bssid,
                    config,
                },
            );
            post(
                &handle,
                EngineEvent::ConnectionStateChanged {
                    role: RadioRole::Primary,
                    state: LinkState::Connected,
                },
            );
        });
    }
}

impl RadioRoleBroker for SimBroker {
    fn primary(&self) -> Option<SessionSnapshot> {
        Some(lock(&self.state).primary.clone())
    }

    fn session_in_role(&self, role: RadioRole) -> Option<SessionSnapshot> {
        match role {
            RadioRole::Primary => self.primary(),
            _ => None,
        }
    }

    fn internet_sessions(&self) -> Vec<SessionSnapshot> {
        self.primary().into_iter().collect()
    }

    fn can_request_more_in_role(&self, _requestor: &WorkSource, _role: RadioRole) -> bool {
        false
    }

    fn request_session(
        &mut self,
        request: RequestId,
        role: RadioRole,
        _requestor: WorkSource,
        ssid: &str,
        _bssid: Option<Bssid>,
    ) {
        debug!("sim: {} session for {} answered with primary", role, ssid);
        let session = self.primary();
        post(&self.handle, EngineEvent::SessionGranted { request, session });
    }

    fn stop_sessions_in_role(&mut self, role: RadioRole) {
        debug!("sim: no {} sessions to stop", role);
    }

    fn connect(&mut self, session: SessionId, network_id: NetworkId, _uid: u32, bssid: Bssid) {
        self.associate(session, network_id, bssid, false);
    }

    fn roam(&mut self, session: SessionId, network_id: NetworkId, bssid: Bssid) {
        self.associate(session, network_id, bssid, true);
    }

    fn disconnect(&mut self, session: SessionId) {
        info!("sim: {} disconnecting", session);
        lock(&self.state).primary = SessionSnapshot::new(session, RadioRole::Primary);
        post(
            &self.handle,
            EngineEvent::ConnectionStateChanged {
                role: RadioRole::Primary,
                state: LinkState::Disconnected,
            },
        );
    }

    fn set_firmware_roaming(&mut self, session: SessionId, enabled: bool) {
        debug!("sim: {} firmware roaming {}", session, enabled);
    }

    fn mark_secondary_internet(&mut self, session: SessionId, dbs_ap: bool) {
        debug!("sim: {} secondary internet (dbs {})", session, dbs_ap);
    }

    fn notify_switch_accepted(&mut self, session: SessionId, network_id: NetworkId, _bssid: Option<Bssid>) {
        info!("sim: {} switch to network {} accepted", session, network_id);
    }

    fn notify_switch_rejected(&mut self, session: SessionId, network_id: NetworkId, _bssid: Option<Bssid>) {
        info!("sim: {} switch to network {} rejected", session, network_id);
    }
}

struct SimRegistry {
    state: Shared,
}

impl NetworkRegistry for SimRegistry {
    fn network(&self, id: NetworkId) -> Option<NetworkConfig> {
        lock(&self.state)
            .saved
            .iter()
            .find(|n| n.network_id == id)
            .cloned()
    }

    fn network_for_scan_detail(&self, detail: &ScanDetail) -> Option<NetworkConfig> {
        lock(&self.state).saved_by_ssid(&detail.ssid).cloned()
    }

    fn enable_network_selection(&mut self, id: NetworkId) {
        if let Some(n) = lock(&self.state)
            .saved
            .iter_mut()
            .find(|n| n.network_id == id)
        {
            n.selection_enabled = true;
        }
    }

    fn network_count(&self) -> usize {
        lock(&self.state).saved.len()
    }

    fn has_potential_networks(&self) -> bool {
        !lock(&self.state).saved.is_empty()
    }

    fn scan_optimization_networks(&self) -> Vec<NetworkConfig> {
        lock(&self.state)
            .saved
            .iter()
            .filter(|n| n.is_autojoin_eligible())
            .cloned()
            .collect()
    }

    fn recent_frequencies(&self, ssid: &str, _max_age_ms: u64) -> Vec<u32> {
        lock(&self.state)
            .access_points
            .iter()
            .filter(|ap| ap.ssid == ssid)
            .map(|ap| ap.frequency_mhz)
            .collect()
    }

    fn reset_on_wifi_disable(&mut self) {
        for n in lock(&self.state).saved.iter_mut() {
            n.selection_enabled = true;
        }
    }
}

/// Accepts every switch prompt after a short think.
struct SimDialogs {
    handle: EngineHandle,
}

impl DialogSink for SimDialogs {
    fn show_network_switch(&mut self, id: DialogId, current: &NetworkConfig, target: &NetworkConfig) {
        info!("sim: prompt {}: switch {} -> {}?", id, current.ssid, target.ssid);
        let handle = self.handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            post(
                &handle,
                EngineEvent::NetworkSwitchDialogResponse { id, accepted: true },
            );
        });
    }

    fn dismiss(&mut self, id: DialogId) {
        info!("sim: prompt {} dismissed", id);
    }
}

struct SimNotifier;

impl OpenNetworkNotifier for SimNotifier {
    fn is_enabled(&self) -> bool {
        true
    }

    fn handle_scan_results(&mut self, open_networks: &[ScanDetail]) {
        if !open_networks.is_empty() {
            info!("sim: {} unsaved networks nearby", open_networks.len());
        }
    }

    fn handle_screen_state(&mut self, screen_on: bool) {
        debug!("sim: notifier screen {}", if screen_on { "on" } else { "off" });
    }

    fn handle_wifi_connected(&mut self, ssid: &str) {
        info!("sim: connected to {}", ssid);
    }

    fn handle_connection_failure(&mut self) {
        warn!("sim: connection failed");
    }

    fn clear_pending(&mut self, _reset_repeat_delay: bool) {}
}

struct Options {
    config: Option<String>,
    stats_port: Option<u16>,
}

fn parse_args() -> Result<Options, String> {
    let mut options = Options {
        config: None,
        stats_port: Some(DEFAULT_DIAGNOSTICS_PORT),
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                options.config = Some(args.next().ok_or("--config needs a path")?);
            }
            "--stats-port" => {
                let port = args.next().ok_or("--stats-port needs a port")?;
                options.stats_port = Some(port.parse().map_err(|_| format!("bad port {}", port))?);
            }
            "--no-stats" => options.stats_port = None,
            other => return Err(format!("unknown argument {}", other)),
        }
    }
    Ok(options)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("=== Connectivity engine simulation starting ===");

    let options = match parse_args() {
        Ok(options) => options,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    let config = match &options.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => {
                info!("Loaded engine config from {}", path);
                config
            }
            Err(e) => {
                error!("Failed to load {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };

    let stats = Arc::new(EngineStats::new());
    // Keep server alive until the end of main
    let _diagnostics = options.stats_port.and_then(|port| {
        match DiagnosticsServer::start(None, port, stats.clone()) {
            Ok(server) => {
                info!("Diagnostics at http://localhost:{}/stats and /dump", port);
                Some(server)
            }
            Err(e) => {
                warn!("Failed to start diagnostics server: {}", e);
                warn!("Continuing without diagnostics");
                None
            }
        }
    });

    let shutdown = CancellationToken::new();
    let (handle, inbox) = engine_channel();
    let state: Shared = Arc::new(Mutex::new(SimState::new()));

    let collaborators = Collaborators {
        clock: Box::new(TokioClock::new()),
        timers: Box::new(TokioTimerService::new(&handle, shutdown.child_token())),
        scanner: Box::new(SimScanner {
            state: state.clone(),
            handle: handle.clone(),
            background: None,
        }),
        selector: Box::new(SimSelector {
            state: state.clone(),
        }),
        broker: Box::new(SimBroker {
            state: state.clone(),
            handle: handle.clone(),
        }),
        registry: Box::new(SimRegistry {
            state: state.clone(),
        }),
        metrics: Box::new(stats.clone()),
        dialogs: Box::new(SimDialogs {
            handle: handle.clone(),
        }),
        notifier: Box::new(SimNotifier),
    };

    let engine = match ConnectivityEngine::new(config, collaborators) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Invalid engine config: {}", e);
            std::process::exit(1);
        }
    };

    for event in [
        EngineEvent::ScreenStateChanged(true),
        EngineEvent::SetWifiEnabled(true),
        EngineEvent::SetTrustedConnectionAllowed(true),
        EngineEvent::ConnectionStateChanged {
            role: RadioRole::Primary,
            state: LinkState::Disconnected,
        },
    ] {
        post(&handle, event);
    }

    let drift_state = state.clone();
    let drift_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(DRIFT_INTERVAL);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = drift_shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    lock(&drift_state).drift();
                }
            }
        }
    });

    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl+C received");
                ctrl_c_shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    info!("Running (Ctrl+C to exit)...");
    let engine = EngineRunner::new(engine, inbox, shutdown)
        .with_stats(stats.clone())
        .run()
        .await;

    let counters = engine.counters();
    info!(
        "=== Simulation finished: {} events, {} connects, {} starts ===",
        stats.events_processed(),
        stats.connect_attempts(),
        counters.starts
    );
}
