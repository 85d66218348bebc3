//! Periodic single-scan schedules.
//!
//! A schedule is a list of backoff intervals with a parallel list of scan
//! types. The [`ScheduleCursor`] walks it: it resets to 0 at the start of a
//! burst, advances by one per issued scan and saturates at the last entry.
//! Lookups past the end of either list use the last element.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default backoff for every schedule, in seconds.
pub const DEFAULT_SCANNING_SCHEDULE_SEC: [u32; 4] = [20, 40, 80, 160];

/// Default scan type list.
pub const DEFAULT_SCANNING_TYPE: [ScanType; 1] = [ScanType::HighAccuracy];

/// Multiplier applied to scan intervals in battery saver.
pub const POWER_SAVE_SCAN_INTERVAL_MULTIPLIER: u64 = 2;

/// Radio scan mode requested from the scan issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    LowLatency,
    LowPower,
    HighAccuracy,
}

impl ScanType {
    /// Map the numeric encoding used in configuration overlays.
    pub fn from_index(value: i64) -> Option<ScanType> {
        match value {
            0 => Some(ScanType::LowLatency),
            1 => Some(ScanType::LowPower),
            2 => Some(ScanType::HighAccuracy),
            _ => None,
        }
    }
}

/// Which schedule family is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Disconnected,
    Connected,
    /// Connected to the only saved/suggested/passpoint network on the device.
    SingleSavedNetwork,
}

/// Error constructing a schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// Invalid schedule parameter.
    InvalidSchedule(&'static str),
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSchedule(msg) => write!(f, "invalid scan schedule: {}", msg),
        }
    }
}

impl std::error::Error for ScheduleError {}

/// Backoff intervals plus scan types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSchedule {
    intervals_sec: Vec<u32>,
    scan_types: Vec<ScanType>,
}

impl Default for ScanSchedule {
    fn default() -> Self {
        Self {
            intervals_sec: DEFAULT_SCANNING_SCHEDULE_SEC.to_vec(),
            scan_types: DEFAULT_SCANNING_TYPE.to_vec(),
        }
    }
}

impl ScanSchedule {
    /// Build a schedule. Both lists must be non-empty and every interval >= 1s.
    pub fn new(intervals_sec: Vec<u32>, scan_types: Vec<ScanType>) -> Result<Self, ScheduleError> {
        if intervals_sec.is_empty() {
            return Err(ScheduleError::InvalidSchedule("intervals must not be empty"));
        }
        if intervals_sec.iter().any(|&s| s < 1) {
            return Err(ScheduleError::InvalidSchedule("intervals must be >= 1 second"));
        }
        if scan_types.is_empty() {
            return Err(ScheduleError::InvalidSchedule("scan types must not be empty"));
        }
        Ok(Self {
            intervals_sec,
            scan_types,
        })
    }

    pub fn intervals_sec(&self) -> &[u32] {
        &self.intervals_sec
    }

    pub fn scan_types(&self) -> &[ScanType] {
        &self.scan_types
    }

    pub fn len(&self) -> usize {
        self.intervals_sec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals_sec.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.intervals_sec.len().saturating_sub(1)
    }

    /// Interval at `index`, clamped to the last entry, times `multiplier`.
    pub fn interval_ms(&self, index: usize, multiplier: u64) -> u64 {
        let sec = self
            .intervals_sec
            .get(index.min(self.last_index()))
            .copied()
            .unwrap_or(DEFAULT_SCANNING_SCHEDULE_SEC[0]);
        u64::from(sec) * 1000 * multiplier
    }

    /// Scan type at `index`, clamped to the last entry.
    pub fn scan_type(&self, index: usize) -> ScanType {
        let last = self.scan_types.len().saturating_sub(1);
        self.scan_types
            .get(index.min(last))
            .copied()
            .unwrap_or(DEFAULT_SCANNING_TYPE[0])
    }
}

/// Position within the current schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleCursor {
    index: usize,
}

impl ScheduleCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Start of a new periodic-scan burst.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Step forward after an issued scan, pinned at the last entry.
    pub fn advance(&mut self, schedule: &ScanSchedule) {
        if self.index < schedule.last_index() {
            self.index += 1;
        }
    }

    pub fn interval_ms(&self, schedule: &ScanSchedule, multiplier: u64) -> u64 {
        schedule.interval_ms(self.index, multiplier)
    }

    pub fn scan_type(&self, schedule: &ScanSchedule) -> ScanType {
        schedule.scan_type(self.index)
    }
}
