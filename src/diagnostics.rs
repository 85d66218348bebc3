//! HTTP diagnostics server for a running engine.
//!
//! Serves two endpoints from a background thread:
//!
//! - `/stats`: engine counters as JSON
//! - `/dump`: the latest [`ConnectivityEngine::dump`] text published by the runner
//!
//! # Example Response
//!
//! ```json
//! {
//!   "uptime_secs": 3600,
//!   "running": true,
//!   "events_processed": 412,
//!   "scans": {
//!     "single": 38,
//!     "single_failed": 1,
//!     "background": 4,
//!     "background_failed": 0,
//!     "initial_partial": 1
//!   },
//!   "connections": {
//!     "connect_attempts": 3,
//!     "roam_attempts": 1,
//!     "rate_limited": 0,
//!     "make_before_break": 1,
//!     "no_candidate": 20
//!   },
//!   "high_movement": { "skipped": 2, "started": 1 }
//! }
//! ```
//!
//! [`ConnectivityEngine::dump`]: crate::engine::ConnectivityEngine::dump

use crate::collaborators::{MetricEvent, MetricsSink};
use log::{error, info, warn};
use serde::Serialize;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tiny_http::{Header, Method, Response, Server};

/// Default port for the diagnostics server.
pub const DEFAULT_DIAGNOSTICS_PORT: u16 = 8080;

/// Counters fed by the engine's metrics sink and the runner.
///
/// Shared between the engine task and the server thread. Counters are
/// atomics; only the dump text sits behind a lock.
#[derive(Debug)]
pub struct EngineStats {
    start_time: Instant,
    running: AtomicBool,
    events_processed: AtomicUsize,
    single_scans: AtomicUsize,
    single_scan_failures: AtomicUsize,
    background_scans: AtomicUsize,
    background_scan_failures: AtomicUsize,
    initial_partial_scans: AtomicUsize,
    connect_attempts: AtomicUsize,
    roam_attempts: AtomicUsize,
    rate_limited: AtomicUsize,
    make_before_break: AtomicUsize,
    no_candidate: AtomicUsize,
    high_movement_skipped: AtomicUsize,
    high_movement_started: AtomicUsize,
    dump: Mutex<String>,
}

#[derive(Debug, Serialize)]
struct ScanCounts {
    single: usize,
    single_failed: usize,
    background: usize,
    background_failed: usize,
    initial_partial: usize,
}

#[derive(Debug, Serialize)]
struct ConnectionCounts {
    connect_attempts: usize,
    roam_attempts: usize,
    rate_limited: usize,
    make_before_break: usize,
    no_candidate: usize,
}

#[derive(Debug, Serialize)]
struct HighMovementCounts {
    skipped: usize,
    started: usize,
}

#[derive(Debug, Serialize)]
struct StatsSnapshot {
    uptime_secs: u64,
    running: bool,
    events_processed: usize,
    scans: ScanCounts,
    connections: ConnectionCounts,
    high_movement: HighMovementCounts,
}

fn load(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::Relaxed)
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl EngineStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            running: AtomicBool::new(false),
            events_processed: AtomicUsize::new(0),
            single_scans: AtomicUsize::new(0),
            single_scan_failures: AtomicUsize::new(0),
            background_scans: AtomicUsize::new(0),
            background_scan_failures: AtomicUsize::new(0),
            initial_partial_scans: AtomicUsize::new(0),
            connect_attempts: AtomicUsize::new(0),
            roam_attempts: AtomicUsize::new(0),
            rate_limited: AtomicUsize::new(0),
            make_before_break: AtomicUsize::new(0),
            no_candidate: AtomicUsize::new(0),
            high_movement_skipped: AtomicUsize::new(0),
            high_movement_started: AtomicUsize::new(0),
            dump: Mutex::new(String::new()),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Called by the runner after each processed event.
    pub fn record_event(&self, running: bool) {
        bump(&self.events_processed);
        self.running.store(running, Ordering::Relaxed);
    }

    pub fn events_processed(&self) -> usize {
        load(&self.events_processed)
    }

    pub fn connect_attempts(&self) -> usize {
        load(&self.connect_attempts)
    }

    pub fn single_scans(&self) -> usize {
        load(&self.single_scans)
    }

    /// Replace the text served on `/dump`.
    pub fn publish_dump(&self, dump: String) {
        match self.dump.lock() {
            Ok(mut guard) => *guard = dump,
            Err(poisoned) => *poisoned.into_inner() = dump,
        }
    }

    pub fn dump(&self) -> String {
        match self.dump.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.uptime_secs(),
            running: self.running.load(Ordering::Relaxed),
            events_processed: load(&self.events_processed),
            scans: ScanCounts {
                single: load(&self.single_scans),
                single_failed: load(&self.single_scan_failures),
                background: load(&self.background_scans),
                background_failed: load(&self.background_scan_failures),
                initial_partial: load(&self.initial_partial_scans),
            },
            connections: ConnectionCounts {
                connect_attempts: load(&self.connect_attempts),
                roam_attempts: load(&self.roam_attempts),
                rate_limited: load(&self.rate_limited),
                make_before_break: load(&self.make_before_break),
                no_candidate: load(&self.no_candidate),
            },
            high_movement: HighMovementCounts {
                skipped: load(&self.high_movement_skipped),
                started: load(&self.high_movement_started),
            },
        }
    }

    /// Serialize all counters to JSON.
    pub fn to_json(&self) -> String {
        match serde_json::to_string(&self.snapshot()) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize engine stats: {}", e);
                "{}".to_string()
            }
        }
    }
}

impl Default for EngineStats {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for Arc<EngineStats> {
    fn record(&mut self, event: MetricEvent) {
        let counter = match event {
            MetricEvent::SingleScanIssued { .. } => &self.single_scans,
            MetricEvent::SingleScanFailed => &self.single_scan_failures,
            MetricEvent::BackgroundScanStarted => &self.background_scans,
            MetricEvent::BackgroundScanFailed => &self.background_scan_failures,
            MetricEvent::ConnectAttempt => &self.connect_attempts,
            MetricEvent::RoamAttempt => &self.roam_attempts,
            MetricEvent::RateLimited => &self.rate_limited,
            MetricEvent::NoCandidate => &self.no_candidate,
            MetricEvent::HighMovementSkipped => &self.high_movement_skipped,
            MetricEvent::HighMovementStarted => &self.high_movement_started,
            MetricEvent::MakeBeforeBreakTriggered => &self.make_before_break,
            MetricEvent::InitialPartialScan { .. } => &self.initial_partial_scans,
            MetricEvent::InitialPartialScanResult { .. } => return,
        };
        bump(counter);
    }
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

fn respond(request: tiny_http::Request, response: Response<std::io::Cursor<Vec<u8>>>) {
    if let Err(e) = request.respond(response) {
        warn!("Failed to send response: {}", e);
    }
}

fn with_optional_header(
    response: Response<std::io::Cursor<Vec<u8>>>,
    header: &Option<Header>,
) -> Response<std::io::Cursor<Vec<u8>>> {
    match header {
        Some(h) => response.with_header(h.clone()),
        None => response,
    }
}

/// HTTP diagnostics server. Drop it to stop the server.
pub struct DiagnosticsServer {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    port: Option<u16>,
}

impl DiagnosticsServer {
    /// Start serving `stats` on `bind_addr:port` (0.0.0.0 when `None`).
    /// Port 0 picks a free port; see [`DiagnosticsServer::port`].
    pub fn start(
        bind_addr: Option<IpAddr>,
        port: u16,
        stats: Arc<EngineStats>,
    ) -> Result<Self, std::io::Error> {
        let addr = match bind_addr {
            Some(ip) => format!("{}:{}", ip, port),
            None => format!("0.0.0.0:{}", port),
        };

        let server = Server::http(&addr)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::AddrInUse, format!("{}", e)))?;
        let port = server.server_addr().to_ip().map(|a| a.port());

        info!("Diagnostics server listening on http://{}/stats", addr);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let handle = thread::spawn(move || {
            Self::run_server(server, stats, shutdown_clone);
        });

        Ok(Self {
            handle: Some(handle),
            shutdown,
            port,
        })
    }

    /// Port actually bound.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    fn run_server(server: Server, stats: Arc<EngineStats>, shutdown: Arc<AtomicBool>) {
        let json = header("Content-Type", "application/json");
        let text = header("Content-Type", "text/plain; charset=utf-8");
        let location = header("Location", "/stats");
        let allow_get = header("Allow", "GET");

        loop {
            if shutdown.load(Ordering::Acquire) {
                info!("Diagnostics server shutting down");
                break;
            }

            match server.recv_timeout(Duration::from_millis(100)) {
                Ok(Some(request)) => {
                    if request.method() != &Method::Get {
                        let response = Response::from_string("Method Not Allowed")
                            .with_status_code(405);
                        respond(request, with_optional_header(response, &allow_get));
                        continue;
                    }

                    let response = match request.url() {
                        "/stats" | "/stats/" => with_optional_header(
                            Response::from_string(stats.to_json()).with_status_code(200),
                            &json,
                        ),
                        "/dump" | "/dump/" => with_optional_header(
                            Response::from_string(stats.dump()).with_status_code(200),
                            &text,
                        ),
                        "/" => with_optional_header(
                            Response::from_string("See /stats for engine statistics")
                                .with_status_code(302),
                            &location,
                        ),
                        _ => Response::from_string("Not Found").with_status_code(404),
                    };
                    respond(request, response);
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Diagnostics server error: {}", e);
                    break;
                }
            }
        }
    }

    /// Stop the server. May take up to one 100ms poll.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DiagnosticsServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{Ipv4Addr, TcpStream};

    fn get(port: u16, path: &str) -> String {
        let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).unwrap();
        write!(
            stream,
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        )
        .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    #[test]
    fn test_metrics_sink_counts() {
        let stats = Arc::new(EngineStats::new());
        let mut sink = stats.clone();
        sink.record(MetricEvent::ConnectAttempt);
        sink.record(MetricEvent::ConnectAttempt);
        sink.record(MetricEvent::SingleScanIssued { full_band: false });
        sink.record(MetricEvent::InitialPartialScanResult {
            candidate_found: true,
        });

        assert_eq!(stats.connect_attempts(), 2);
        assert_eq!(stats.single_scans(), 1);
    }

    #[test]
    fn test_stats_json() {
        let stats = Arc::new(EngineStats::new());
        let mut sink = stats.clone();
        sink.record(MetricEvent::RateLimited);
        stats.record_event(true);

        let value: serde_json::Value = serde_json::from_str(&stats.to_json()).unwrap();
        assert_eq!(value["running"], true);
        assert_eq!(value["events_processed"], 1);
        assert_eq!(value["connections"]["rate_limited"], 1);
        assert_eq!(value["scans"]["single"], 0);
        assert!(value["uptime_secs"].is_u64());
    }

    #[test]
    fn test_publish_dump_replaces_text() {
        let stats = EngineStats::new();
        assert_eq!(stats.dump(), "");
        stats.publish_dump("first".to_string());
        stats.publish_dump("second".to_string());
        assert_eq!(stats.dump(), "second");
    }

    #[test]
    fn test_server_serves_stats_and_dump() {
        let stats = Arc::new(EngineStats::new());
        stats.publish_dump("Dump of ConnectivityEngine\nrunning: true".to_string());
        let mut sink = stats.clone();
        sink.record(MetricEvent::RoamAttempt);

        let mut server =
            DiagnosticsServer::start(Some(IpAddr::V4(Ipv4Addr::LOCALHOST)), 0, stats).unwrap();
        let port = server.port().unwrap();

        let response = get(port, "/stats");
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("\"roam_attempts\":1"));

        let response = get(port, "/dump");
        assert!(response.contains("running: true"));

        let response = get(port, "/nope");
        assert!(response.starts_with("HTTP/1.1 404"));

        server.stop();
    }
}
