//! Tokio host for [`ConnectivityEngine`].
//!
//! The engine is single-threaded state. [`EngineRunner`] owns it on one task
//! of a `current_thread` runtime and feeds it every input through one
//! unbounded queue. Other tasks (radio callbacks, timers, the policy layer)
//! post through a cloned [`EngineHandle`].
//!
//! ```text
//!  EngineHandle ──┐
//!  EngineHandle ──┼──► mpsc queue ──► EngineRunner ──► ConnectivityEngine
//!  timer tasks  ──┘                        │
//!                                          └──► EngineStats (optional)
//! ```

use crate::clock::Clock;
use crate::diagnostics::EngineStats;
use crate::engine::{ConnectivityEngine, EngineEvent};
use crate::timer::{TimerHandle, TimerKind, TimerService};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Errors from posting into the engine queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The runner is gone; the event was dropped.
    EngineStopped(&'static str),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EngineStopped(event) => write!(f, "engine stopped, dropped {} event", event),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Cloneable sender into the engine queue.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EngineHandle {
    pub fn send(&self, event: EngineEvent) -> Result<(), RuntimeError> {
        let name = event.name();
        self.tx
            .send(event)
            .map_err(|_| RuntimeError::EngineStopped(name))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving end of the engine queue, handed to [`EngineRunner::new`].
#[derive(Debug)]
pub struct EngineInbox {
    rx: mpsc::UnboundedReceiver<EngineEvent>,
}

/// Create the engine queue.
pub fn engine_channel() -> (EngineHandle, EngineInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EngineHandle { tx }, EngineInbox { rx })
}

/// Clock on tokio's time base, so paused test time drives the engine too.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    epoch: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            epoch: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

struct ArmedTimer {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// [`TimerService`] backed by tokio sleep tasks.
///
/// Each armed timer is a spawned task racing its own child of the shutdown
/// token. Holds the queue weakly, so it never keeps the runner alive on its
/// own. Must be used from within a tokio runtime.
pub struct TokioTimerService {
    queue: mpsc::WeakUnboundedSender<EngineEvent>,
    shutdown: CancellationToken,
    next_id: u64,
    armed: HashMap<TimerHandle, ArmedTimer>,
}

impl TokioTimerService {
    pub fn new(handle: &EngineHandle, shutdown: CancellationToken) -> Self {
        Self {
            queue: handle.tx.downgrade(),
            shutdown,
            next_id: 1,
            armed: HashMap::new(),
        }
    }

    /// Timers armed and neither fired nor cancelled.
    pub fn pending(&self) -> usize {
        self.armed.values().filter(|t| !t.task.is_finished()).count()
    }
}

impl TimerService for TokioTimerService {
    fn arm(&mut self, kind: TimerKind, delay_ms: u64) -> TimerHandle {
        self.armed.retain(|_, t| !t.task.is_finished());

        let timer = TimerHandle::new(self.next_id, kind);
        self.next_id += 1;

        let token = self.shutdown.child_token();
        let cancelled = token.clone();
        let queue = self.queue.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {
                    let sent = queue
                        .upgrade()
                        .map_or(false, |tx| tx.send(EngineEvent::TimerFired(timer)).is_ok());
                    if !sent {
                        debug!("{} timer fired after the engine stopped", kind);
                    }
                }
            }
        });
        self.armed.insert(timer, ArmedTimer { token, task });
        timer
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(timer) = self.armed.remove(&handle) {
            timer.token.cancel();
        }
    }
}

/// Owns the engine and drains its queue until shutdown.
pub struct EngineRunner {
    engine: ConnectivityEngine,
    inbox: EngineInbox,
    shutdown: CancellationToken,
    stats: Option<Arc<EngineStats>>,
}

impl EngineRunner {
    pub fn new(engine: ConnectivityEngine, inbox: EngineInbox, shutdown: CancellationToken) -> Self {
        Self {
            engine,
            inbox,
            shutdown,
            stats: None,
        }
    }

    /// Publish counters and the dump text to `stats` after every event.
    pub fn with_stats(mut self, stats: Arc<EngineStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Run until the shutdown token fires or every handle is dropped.
    /// Returns the engine for inspection.
    pub async fn run(mut self) -> ConnectivityEngine {
        info!("Engine runner started");
        self.publish();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Engine runner shutting down");
                    break;
                }
                event = self.inbox.rx.recv() => match event {
                    Some(event) => {
                        self.engine.handle_event(event);
                        if let Some(stats) = &self.stats {
                            stats.record_event(self.engine.is_running());
                        }
                        self.publish();
                    }
                    None => {
                        warn!("All engine handles dropped, stopping runner");
                        break;
                    }
                },
            }
        }

        // Queued events are dropped; timers die with the shutdown token.
        self.inbox.rx.close();
        self.engine
    }

    fn publish(&self) {
        if let Some(stats) = &self.stats {
            stats.publish_dump(self.engine.dump());
        }
    }
}
