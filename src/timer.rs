//! One-shot timers with explicit handles.
//!
//! The engine never sleeps. It asks a [`TimerService`] to deliver a
//! [`TimerHandle`] back onto the serial event queue after a delay, and keeps
//! each pending handle in a [`TimerSlot`]. A fired handle that no longer
//! matches its slot is stale (cancelled after it was already queued) and is
//! dropped by [`TimerSlot::take_if_fired`].

use std::fmt;

/// What a timer is for. Each kind owns exactly one slot in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Next screen-on periodic single scan.
    PeriodicScan,
    /// Safety-net full scan while disconnected.
    Watchdog,
    /// Retry of a single scan whose submission failed.
    RestartSingleScan,
    /// Delayed connectivity scan (background scan failure, low-RSSI backoff).
    RestartConnectivityScan,
    /// Re-check of candidates seen while moving fast.
    HighMovementPartialScan,
    /// Re-check of carrier candidates held back by the delay policy.
    DelayedCarrierPartialScan,
    /// Debounce of configuration churn while the screen is off.
    NetworkChangeDebounce,
    /// One-shot deferred scan after the screen turns on.
    ScreenOnConnectivityScan,
}

impl TimerKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PeriodicScan => "periodic-scan",
            Self::Watchdog => "watchdog",
            Self::RestartSingleScan => "restart-single-scan",
            Self::RestartConnectivityScan => "restart-connectivity-scan",
            Self::HighMovementPartialScan => "high-movement-partial-scan",
            Self::DelayedCarrierPartialScan => "delayed-carrier-partial-scan",
            Self::NetworkChangeDebounce => "network-change-debounce",
            Self::ScreenOnConnectivityScan => "screen-on-connectivity-scan",
        }
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cancellable token for one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    id: u64,
    kind: TimerKind,
}

impl TimerHandle {
    pub fn new(id: u64, kind: TimerKind) -> Self {
        Self { id, kind }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }
}

/// Schedules one-shot callbacks onto the engine's event queue.
pub trait TimerService {
    /// Deliver `TimerFired(handle)` after `delay_ms`.
    fn arm(&mut self, kind: TimerKind, delay_ms: u64) -> TimerHandle;

    /// Best-effort cancel. A fire already queued may still arrive.
    fn cancel(&mut self, handle: TimerHandle);
}

/// Errors from timer slot operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// Arming a slot that already holds a pending timer.
    AlreadyArmed(TimerKind),
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyArmed(kind) => write!(f, "{} timer already armed", kind),
        }
    }
}

impl std::error::Error for TimerError {}

/// Holder for at most one pending timer of a given kind.
#[derive(Debug)]
pub struct TimerSlot {
    kind: TimerKind,
    armed: Option<TimerHandle>,
}

impl TimerSlot {
    pub fn new(kind: TimerKind) -> Self {
        Self { kind, armed: None }
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Arm the slot. Fails without touching the pending timer if already armed.
    pub fn arm(
        &mut self,
        timers: &mut dyn TimerService,
        delay_ms: u64,
    ) -> Result<TimerHandle, TimerError> {
        if self.armed.is_some() {
            return Err(TimerError::AlreadyArmed(self.kind));
        }
        let handle = timers.arm(self.kind, delay_ms);
        self.armed = Some(handle);
        Ok(handle)
    }

    /// Cancel any pending timer and arm a fresh one.
    pub fn rearm(&mut self, timers: &mut dyn TimerService, delay_ms: u64) -> TimerHandle {
        self.cancel(timers);
        let handle = timers.arm(self.kind, delay_ms);
        self.armed = Some(handle);
        handle
    }

    /// Cancel the pending timer. Returns whether one was armed.
    pub fn cancel(&mut self, timers: &mut dyn TimerService) -> bool {
        match self.armed.take() {
            Some(handle) => {
                timers.cancel(handle);
                true
            }
            None => false,
        }
    }

    /// Consume a fired handle. Returns `false` for a stale fire.
    pub fn take_if_fired(&mut self, handle: TimerHandle) -> bool {
        if self.armed == Some(handle) {
            self.armed = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingTimers {
        next_id: u64,
        cancelled: Vec<TimerHandle>,
    }

    impl TimerService for CountingTimers {
        fn arm(&mut self, kind: TimerKind, _delay_ms: u64) -> TimerHandle {
            self.next_id += 1;
            TimerHandle::new(self.next_id, kind)
        }

        fn cancel(&mut self, handle: TimerHandle) {
            self.cancelled.push(handle);
        }
    }

    #[test]
    fn test_arm_twice_is_error() {
        let mut timers = CountingTimers::default();
        let mut slot = TimerSlot::new(TimerKind::PeriodicScan);
        let first = slot.arm(&mut timers, 1_000).unwrap();
        assert_eq!(
            slot.arm(&mut timers, 2_000),
            Err(TimerError::AlreadyArmed(TimerKind::PeriodicScan))
        );
        // The original timer is still the pending one.
        assert!(slot.take_if_fired(first));
    }

    #[test]
    fn test_stale_fire_after_cancel_is_ignored() {
        let mut timers = CountingTimers::default();
        let mut slot = TimerSlot::new(TimerKind::Watchdog);
        let handle = slot.arm(&mut timers, 10).unwrap();
        assert!(slot.cancel(&mut timers));
        assert_eq!(timers.cancelled, vec![handle]);
        assert!(!slot.take_if_fired(handle));
    }

    #[test]
    fn test_rearm_replaces_pending() {
        let mut timers = CountingTimers::default();
        let mut slot = TimerSlot::new(TimerKind::RestartConnectivityScan);
        let old = slot.rearm(&mut timers, 10);
        let new = slot.rearm(&mut timers, 20);
        assert_ne!(old, new);
        assert!(!slot.take_if_fired(old));
        assert!(slot.take_if_fired(new));
        assert!(!slot.is_armed());
    }

    #[test]
    fn test_cancel_empty_slot() {
        let mut timers = CountingTimers::default();
        let mut slot = TimerSlot::new(TimerKind::NetworkChangeDebounce);
        assert!(!slot.cancel(&mut timers));
        assert!(timers.cancelled.is_empty());
    }

    #[test]
    fn test_error_display() {
        let err = TimerError::AlreadyArmed(TimerKind::PeriodicScan);
        assert_eq!(err.to_string(), "periodic-scan timer already armed");
    }
}
