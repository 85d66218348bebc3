//! Temporary BSSID blocklist.
//!
//! Entries expire on their own; expiry is applied lazily whenever the
//! blocklist is consulted, so the map never holds stale blocks past the next
//! scan batch.

use crate::types::{Bssid, ScanDetail};
use std::collections::{HashMap, HashSet};

/// Why a BSSID was blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockReason {
    /// Blocked briefly so the supplicant does not immediately retry a BSSID
    /// the engine moved away from after a failure.
    FastReconnect,
    ConnectionFailure,
    AuthenticationFailure,
    Other,
}

#[derive(Debug, Clone)]
struct BlockEntry {
    ssid: String,
    expires_at_ms: u64,
    reason: BlockReason,
}

/// Map of blocked BSSIDs with expiry times.
#[derive(Debug, Clone, Default)]
pub struct BssidBlocklist {
    entries: HashMap<Bssid, BlockEntry>,
}

impl BssidBlocklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block `bssid` until `now_ms + duration_ms`. An existing longer block is kept.
    pub fn block_for(
        &mut self,
        bssid: Bssid,
        ssid: &str,
        duration_ms: u64,
        reason: BlockReason,
        now_ms: u64,
    ) {
        let expires_at_ms = now_ms.saturating_add(duration_ms);
        match self.entries.get_mut(&bssid) {
            Some(entry) if entry.expires_at_ms >= expires_at_ms => {}
            Some(entry) => {
                entry.expires_at_ms = expires_at_ms;
                entry.reason = reason;
                entry.ssid = ssid.to_string();
            }
            None => {
                self.entries.insert(
                    bssid,
                    BlockEntry {
                        ssid: ssid.to_string(),
                        expires_at_ms,
                        reason,
                    },
                );
            }
        }
    }

    pub fn is_blocked(&self, bssid: Bssid, now_ms: u64) -> bool {
        self.entries
            .get(&bssid)
            .map_or(false, |e| e.expires_at_ms > now_ms)
    }

    /// Whether any unexpired block remains for `ssid`.
    pub fn has_blocked_for_ssid(&self, ssid: &str, now_ms: u64) -> bool {
        self.entries
            .values()
            .any(|e| e.ssid == ssid && e.expires_at_ms > now_ms)
    }

    /// Lift expired blocks on BSSIDs seen in `batch`.
    ///
    /// Returns the scan details whose BSSID was released.
    pub fn try_enabling_blocked(&mut self, batch: &[ScanDetail], now_ms: u64) -> Vec<ScanDetail> {
        let mut released = Vec::new();
        for detail in batch {
            let expired = self
                .entries
                .get(&detail.bssid)
                .map_or(false, |e| e.expires_at_ms <= now_ms);
            if expired {
                self.entries.remove(&detail.bssid);
                released.push(detail.clone());
            }
        }
        released
    }

    /// Drop every expired entry and return what is still blocked.
    pub fn update_and_get(&mut self, now_ms: u64) -> HashSet<Bssid> {
        self.entries.retain(|_, e| e.expires_at_ms > now_ms);
        self.entries.keys().copied().collect()
    }

    pub fn clear_for_reason(&mut self, reason: BlockReason) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.reason != reason);
        before - self.entries.len()
    }

    pub fn clear_for_ssid(&mut self, ssid: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.ssid != ssid);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
