//! Scan scheduling building blocks.
//!
//! The scheduler itself lives in the engine (it needs the whole connectivity
//! state); this module holds the pieces it is assembled from.

mod channels;
mod retry;
mod schedule;

pub use channels::{ChannelSet, CHANNEL_LIST_AGE_MS, MAX_PNO_SCAN_FREQUENCY_AGE_MS};
pub use retry::{
    LowRssiBackoff, RetryDecision, ScanRetryCounter, MAX_SCAN_RESTART_ALLOWED,
    RESTART_SCAN_DELAY_MS,
};
pub use schedule::{
    ScanSchedule, ScanType, ScheduleCursor, ScheduleError, ScheduleKind,
    DEFAULT_SCANNING_SCHEDULE_SEC, DEFAULT_SCANNING_TYPE, POWER_SAVE_SCAN_INTERVAL_MULTIPLIER,
};

/// Debounce for configuration churn while the screen is off.
pub const NETWORK_CHANGE_TRIGGER_PNO_THROTTLE_MS: u64 = 3000;

/// Progress of the reduced-channel scan issued right after start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialScanState {
    Start,
    AwaitingResponse,
    Complete,
}

/// Where a batch of scan results came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrigin {
    /// Any single scan, whoever requested it.
    SingleScan { full_band: bool },
    /// Background (PNO) scan match.
    Background,
}

impl ScanOrigin {
    /// Results that reflect the whole environment rather than a channel subset.
    /// Background scans count, since they cover every channel they search.
    pub fn is_not_partial(&self) -> bool {
        match self {
            Self::SingleScan { full_band } => *full_band,
            Self::Background => true,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SingleScan { .. } => "all-single-scan",
            Self::Background => "pno-scan",
        }
    }
}
