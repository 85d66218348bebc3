//! Pieces of the connection orchestrator that do not need the engine.
//!
//! The engine strings these together; each one is a plain state holder or a
//! pure decision function and is tested in isolation.

mod continuation;
mod decision;
mod dialog;
mod multi_internet;
mod rate_limit;
mod retry;

pub use continuation::{PendingContinuation, PendingRequests, RequestId};
pub use decision::{classify, is_on_target, ConnectDecision, ConnectTrigger, RoamingPolicy};
pub use dialog::{BlockedBy, DialogGate, DialogId, NetworkSwitchDialogState, SwitchContext};
pub use multi_internet::{is_dbs_ap, secondary_candidates, BandPairing, SecondaryPolicy};
pub use rate_limit::{
    AttemptDecision, ConnectionAttemptHistory, MAX_CONNECTION_ATTEMPTS_RATE,
    MAX_CONNECTION_ATTEMPTS_TIME_INTERVAL_MS,
};
pub use retry::{LatestCandidates, RetryPrune, TEMP_BSSID_BLOCK_DURATION_MS};
