//! Engine configuration.
//!
//! Loaded from JSON; every field has a default so a partial (or empty)
//! document is valid. Schedule and scan type arrays are kept raw and
//! resolved into [`ScanSchedule`]s on demand, falling back to compiled-in
//! defaults (with a warning) when empty or malformed.
//!
//! # Example
//!
//! ```
//! use wifi_connectivity_engine::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{ "watchdog_interval_ms": 600000 }"#).unwrap();
//! assert_eq!(config.watchdog_interval_ms, 600_000);
//! assert!(config.validate().is_ok());
//! ```

use crate::scan::{ScanSchedule, ScanType, ScheduleKind};
use crate::types::CarrierId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// A value is out of range.
    InvalidConfig(&'static str),
    Io(io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            Self::Io(e) => write!(f, "failed to read config: {}", e),
            Self::Parse(e) => write!(f, "failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidConfig(_) => None,
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Periodic scan backoff while connected, seconds.
    pub connected_scan_schedule_sec: Vec<i64>,
    /// Scan types while connected (0 low latency, 1 low power, 2 high accuracy).
    pub connected_scan_types: Vec<i64>,
    pub disconnected_scan_schedule_sec: Vec<i64>,
    pub disconnected_scan_types: Vec<i64>,
    /// Used when the connected network is the only one known. Falls back to
    /// the connected schedule.
    pub single_saved_network_scan_schedule_sec: Vec<i64>,
    pub single_saved_network_scan_types: Vec<i64>,

    pub pno_moving_interval_ms: u64,
    pub pno_stationary_interval_ms: u64,
    pub watchdog_interval_ms: u64,
    pub watchdog_enabled: bool,
    pub low_rssi_retry_start_delay_sec: u64,
    pub low_rssi_retry_max_delay_sec: u64,

    pub partial_initial_scan_enabled: bool,
    pub initial_partial_scan_channel_max_count: usize,
    pub initial_partial_scan_max_new_channels_per_network: usize,
    pub initial_partial_scan_channel_age_mins: u64,
    pub associated_partial_scan_max_active_channels: usize,

    pub high_movement_selection_enabled: bool,
    pub high_movement_scan_delay_ms: u64,
    pub high_movement_rssi_delta: i32,
    pub delayed_carrier_ids: Vec<CarrierId>,
    pub delayed_carrier_selection_ms: u64,

    pub firmware_roaming_supported: bool,
    pub network_selection_sets_target_bssid: bool,
    pub sta_sta_for_restricted_supported: bool,
    pub sta_sta_for_mbb_supported: bool,
    pub multi_internet_multi_ap_allowed: bool,
    /// Low and high 5 GHz count as separate bands for a second internet connection.
    pub multi_internet_dual_5g_supported: bool,
    pub linked_network_roaming_enabled: bool,
    pub ask_user_before_switching_from_user_selected: bool,
    pub sufficiency_check_enabled: bool,
    pub associated_network_selection_enabled: bool,
    pub use_single_radio_chain_results: bool,
    pub battery_saver_scan_multiplier_enabled: bool,
    pub connected_high_rssi_scan_min_window_sec: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            connected_scan_schedule_sec: Vec::new(),
            connected_scan_types: Vec::new(),
            disconnected_scan_schedule_sec: Vec::new(),
            disconnected_scan_types: Vec::new(),
            single_saved_network_scan_schedule_sec: Vec::new(),
            single_saved_network_scan_types: Vec::new(),
            pno_moving_interval_ms: 20_000,
            pno_stationary_interval_ms: 60_000,
            watchdog_interval_ms: 20 * 60 * 1000,
            watchdog_enabled: true,
            low_rssi_retry_start_delay_sec: 20,
            low_rssi_retry_max_delay_sec: 80,
            partial_initial_scan_enabled: false,
            initial_partial_scan_channel_max_count: 10,
            initial_partial_scan_max_new_channels_per_network: 2,
            initial_partial_scan_channel_age_mins: 14_400,
            associated_partial_scan_max_active_channels: 6,
            high_movement_selection_enabled: true,
            high_movement_scan_delay_ms: 30_000,
            high_movement_rssi_delta: 8,
            delayed_carrier_ids: Vec::new(),
            delayed_carrier_selection_ms: 5_000,
            firmware_roaming_supported: false,
            network_selection_sets_target_bssid: false,
            sta_sta_for_restricted_supported: false,
            sta_sta_for_mbb_supported: false,
            multi_internet_multi_ap_allowed: false,
            multi_internet_dual_5g_supported: false,
            linked_network_roaming_enabled: true,
            ask_user_before_switching_from_user_selected: false,
            sufficiency_check_enabled: true,
            associated_network_selection_enabled: true,
            use_single_radio_chain_results: false,
            battery_saver_scan_multiplier_enabled: true,
            connected_high_rssi_scan_min_window_sec: 10,
        }
    }
}

/// Resolve a raw interval array, or `None` with a log line if unusable.
fn parse_intervals(raw: &[i64], name: &str) -> Option<Vec<u32>> {
    if raw.is_empty() {
        log::warn!("{} is not configured, using default scan schedule", name);
        return None;
    }
    let parsed: Option<Vec<u32>> = raw
        .iter()
        .map(|&v| if v >= 1 { u32::try_from(v).ok() } else { None })
        .collect();
    if parsed.is_none() {
        log::warn!("{} is misconfigured, using default scan schedule", name);
    }
    parsed
}

fn parse_scan_types(raw: &[i64], name: &str) -> Option<Vec<ScanType>> {
    if raw.is_empty() {
        log::warn!("{} is not configured, using default scan types", name);
        return None;
    }
    let parsed: Option<Vec<ScanType>> = raw.iter().map(|&v| ScanType::from_index(v)).collect();
    if parsed.is_none() {
        log::warn!("{} is misconfigured, using default scan types", name);
    }
    parsed
}

fn resolve_schedule(
    intervals: &[i64],
    types: &[i64],
    name: &str,
    fallback: &ScanSchedule,
) -> ScanSchedule {
    let intervals = parse_intervals(intervals, name)
        .unwrap_or_else(|| fallback.intervals_sec().to_vec());
    let types = parse_scan_types(types, name).unwrap_or_else(|| fallback.scan_types().to_vec());
    ScanSchedule::new(intervals, types).unwrap_or_else(|_| fallback.clone())
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check ranges. Schedule arrays are not checked here; they fall back
    /// to defaults when resolved.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pno_moving_interval_ms == 0 || self.pno_stationary_interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "background scan intervals must be > 0",
            ));
        }
        if self.watchdog_enabled && self.watchdog_interval_ms == 0 {
            return Err(ConfigError::InvalidConfig("watchdog interval must be > 0"));
        }
        if self.low_rssi_retry_start_delay_sec == 0 {
            return Err(ConfigError::InvalidConfig(
                "low RSSI retry start delay must be > 0",
            ));
        }
        if self.low_rssi_retry_max_delay_sec < self.low_rssi_retry_start_delay_sec {
            return Err(ConfigError::InvalidConfig(
                "low RSSI retry max delay must be >= start delay",
            ));
        }
        if self.high_movement_rssi_delta <= 0 {
            return Err(ConfigError::InvalidConfig(
                "high movement RSSI delta must be > 0",
            ));
        }
        Ok(())
    }

    pub fn connected_schedule(&self) -> ScanSchedule {
        resolve_schedule(
            &self.connected_scan_schedule_sec,
            &self.connected_scan_types,
            "connected_scan_schedule",
            &ScanSchedule::default(),
        )
    }

    pub fn disconnected_schedule(&self) -> ScanSchedule {
        resolve_schedule(
            &self.disconnected_scan_schedule_sec,
            &self.disconnected_scan_types,
            "disconnected_scan_schedule",
            &ScanSchedule::default(),
        )
    }

    pub fn single_saved_network_schedule(&self) -> ScanSchedule {
        resolve_schedule(
            &self.single_saved_network_scan_schedule_sec,
            &self.single_saved_network_scan_types,
            "single_saved_network_scan_schedule",
            &self.connected_schedule(),
        )
    }

    pub fn schedule_for(&self, kind: ScheduleKind) -> ScanSchedule {
        match kind {
            ScheduleKind::Disconnected => self.disconnected_schedule(),
            ScheduleKind::Connected => self.connected_schedule(),
            ScheduleKind::SingleSavedNetwork => self.single_saved_network_schedule(),
        }
    }

    pub fn initial_partial_scan_channel_age_ms(&self) -> u64 {
        self.initial_partial_scan_channel_age_mins * 60 * 1000
    }

    pub fn connected_high_rssi_scan_min_window_ms(&self) -> u64 {
        self.connected_high_rssi_scan_min_window_sec * 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.connected_schedule(), ScanSchedule::default());
        assert_eq!(config.disconnected_schedule(), ScanSchedule::default());
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_retired_keys_still_load() {
        // Older config files may still carry the connected background scan interval.
        let config =
            EngineConfig::from_json_str(r#"{ "connected_pno_interval_ms": 160000 }"#).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_schedule_override() {
        let config = EngineConfig::from_json_str(
            r#"{ "disconnected_scan_schedule_sec": [10, 30], "disconnected_scan_types": [1] }"#,
        )
        .unwrap();
        let schedule = config.disconnected_schedule();
        assert_eq!(schedule.intervals_sec(), &[10, 30]);
        assert_eq!(schedule.scan_types(), &[ScanType::LowPower]);
        assert_eq!(config.connected_schedule(), ScanSchedule::default());
    }

    #[test]
    fn test_malformed_schedule_falls_back() {
        let config = EngineConfig::from_json_str(
            r#"{ "connected_scan_schedule_sec": [20, 0, 40], "connected_scan_types": [7] }"#,
        )
        .unwrap();
        assert_eq!(config.connected_schedule(), ScanSchedule::default());
    }

    #[test]
    fn test_single_saved_falls_back_to_connected() {
        let config =
            EngineConfig::from_json_str(r#"{ "connected_scan_schedule_sec": [5, 50] }"#).unwrap();
        let single = config.single_saved_network_schedule();
        assert_eq!(single.intervals_sec(), &[5, 50]);
        assert_eq!(
            config.schedule_for(ScheduleKind::SingleSavedNetwork),
            config.schedule_for(ScheduleKind::Connected)
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "pno_moving_interval_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig(_)));

        let err = EngineConfig::from_json_str(
            r#"{ "low_rssi_retry_start_delay_sec": 80, "low_rssi_retry_max_delay_sec": 20 }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("failed to parse config"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load("/nonexistent/engine.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
