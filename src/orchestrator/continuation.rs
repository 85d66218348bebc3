//! Work parked while waiting for the radio role broker to grant a session.
//!
//! Each session request carries a [`RequestId`]; the grant comes back as an
//! event with the same id and is matched against the parked continuation.

use crate::scan::ScanOrigin;
use crate::types::{Bssid, NetworkConfig, ScanCandidate, SelectedNetwork};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request#{}", self.0)
    }
}

/// What to do once a requested session is granted.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingContinuation {
    /// Restricted (oem paid/private) network on a secondary session, with the
    /// primary independently connected to its own best candidate.
    RestrictedSecondary {
        scan_origin: ScanOrigin,
        primary_target: Option<SelectedNetwork>,
        secondary_target: SelectedNetwork,
        /// The whole batch, for a primary-only retry if the broker hands back
        /// the primary session.
        all_candidates: Vec<ScanCandidate>,
    },
    /// Second internet connection next to the primary.
    MultiInternetSecondary {
        scan_origin: ScanOrigin,
        target: NetworkConfig,
        bssid: Bssid,
        dbs_ap: bool,
    },
    /// Transient session for a make-before-break switch.
    MakeBeforeBreak { target: SelectedNetwork },
}

impl PendingContinuation {
    /// Origin of the scan that started the request, if it came from one.
    pub fn scan_origin(&self) -> Option<ScanOrigin> {
        match self {
            Self::RestrictedSecondary { scan_origin, .. }
            | Self::MultiInternetSecondary { scan_origin, .. } => Some(*scan_origin),
            Self::MakeBeforeBreak { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::RestrictedSecondary { .. } => "restricted-secondary",
            Self::MultiInternetSecondary { .. } => "multi-internet-secondary",
            Self::MakeBeforeBreak { .. } => "make-before-break",
        }
    }
}

/// Parked continuations by request id.
#[derive(Debug, Default)]
pub struct PendingRequests {
    next_id: u64,
    pending: HashMap<RequestId, PendingContinuation>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn park(&mut self, continuation: PendingContinuation) -> RequestId {
        self.next_id += 1;
        let id = RequestId(self.next_id);
        self.pending.insert(id, continuation);
        id
    }

    pub fn take(&mut self, id: RequestId) -> Option<PendingContinuation> {
        self.pending.remove(&id)
    }

    /// Drop everything (Wi-Fi off). Late grants are then ignored.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SecurityType;

    fn mbb(id: i32) -> PendingContinuation {
        PendingContinuation::MakeBeforeBreak {
            target: SelectedNetwork {
                config: NetworkConfig::new(id, "net", SecurityType::Sae),
                bssid: Some(Bssid::new([1; 6])),
            },
        }
    }

    #[test]
    fn test_park_and_take_once() {
        let mut pending = PendingRequests::new();
        let a = pending.park(mbb(1));
        let b = pending.park(mbb(2));
        assert_ne!(a, b);
        assert_eq!(pending.take(b), Some(mbb(2)));
        assert_eq!(pending.take(b), None);
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_clear_drops_late_grants() {
        let mut pending = PendingRequests::new();
        let id = pending.park(mbb(1));
        assert_eq!(pending.clear(), 1);
        assert_eq!(pending.take(id), None);
        assert_eq!(mbb(1).name(), "make-before-break");
        assert_eq!(mbb(1).scan_origin(), None);
    }

    #[test]
    fn test_scan_origin_carried() {
        let secondary = PendingContinuation::MultiInternetSecondary {
            scan_origin: ScanOrigin::Background,
            target: NetworkConfig::new(3, "cafe", SecurityType::Psk),
            bssid: Bssid::new([2; 6]),
            dbs_ap: false,
        };
        assert_eq!(secondary.scan_origin(), Some(ScanOrigin::Background));
        assert_eq!(secondary.name(), "multi-internet-secondary");
    }
}
