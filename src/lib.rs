//! Wi-Fi connectivity decision engine.
//!
//! Decides when to scan, which scan results become connection candidates,
//! and whether to connect, roam, or bring up a secondary session. Radio
//! control, scoring and persistence live behind the traits in
//! [`collaborators`]; the engine itself is a single-threaded state machine
//! driven by [`EngineEvent`]s and can be tested on the host without a radio.

pub mod clock;
pub mod collaborators;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod filter;
pub mod orchestrator;
pub mod runtime;
pub mod scan;
pub mod session;
pub mod state;
pub mod timer;
pub mod types;

#[cfg(test)]
mod testutil;

// Re-export commonly used items
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use collaborators::{
    BackgroundScanSettings, CandidateProvider, Collaborators, DialogSink, MetricEvent,
    MetricsSink, NetworkRegistry, OpenNetworkNotifier, PnoNetwork, RadioRoleBroker, ScanChannels,
    ScanIssuer, ScanSettings, SelectionPolicy,
};
pub use config::{ConfigError, EngineConfig};
pub use diagnostics::{DiagnosticsServer, EngineStats, DEFAULT_DIAGNOSTICS_PORT};
pub use engine::{AttemptOutcome, ConnectivityEngine, EngineEvent, LifecycleCounters};
pub use orchestrator::{DialogId, RequestId};
pub use runtime::{
    engine_channel, EngineHandle, EngineInbox, EngineRunner, RuntimeError, TokioClock,
    TokioTimerService,
};
pub use scan::ScanType;
pub use session::{RadioRole, SessionId, SessionSnapshot, WorkSource};
pub use state::{LinkState, MobilityState, MultiInternetState};
pub use timer::{TimerHandle, TimerKind, TimerService};
pub use types::{
    Band, Bssid, BssidParseError, CandidateKey, NetworkConfig, NetworkId, ScanCandidate,
    ScanDetail, SecurityType, SelectedNetwork,
};
