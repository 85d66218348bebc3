//! Confirmation gate for switching away from a user-selected network.

use crate::types::{NetworkConfig, NetworkId, SelectedNetwork};
use std::fmt;

/// Identifier of one shown dialog, echoed back with the user's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DialogId(pub u64);

impl fmt::Display for DialogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dialog#{}", self.0)
    }
}

/// Inputs deciding whether a switch needs confirmation at all.
#[derive(Debug, Clone, Copy)]
pub struct SwitchContext<'a> {
    pub connected: Option<&'a NetworkConfig>,
    pub sufficiency_check_enabled: bool,
    pub ask_user_before_switching: bool,
}

impl SwitchContext<'_> {
    fn needs_confirmation(&self, target: NetworkId) -> bool {
        match self.connected {
            Some(connected) => {
                connected.user_selected
                    && self.sufficiency_check_enabled
                    && self.ask_user_before_switching
                    && connected.network_id != target
            }
            None => false,
        }
    }
}

/// Result of passing a connection through the gate.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum DialogGate {
    /// Continue connecting now.
    Proceed,
    /// Drop this connection attempt.
    Blocked(BlockedBy),
    /// A prompt must be shown; the attempt resumes on acceptance. `replaced`
    /// is an earlier dialog for another target that must be closed.
    Prompt {
        id: DialogId,
        replaced: Option<DialogId>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockedBy {
    UserRejected,
    Suppressed { until_ms: u64 },
    AlreadyPrompting(DialogId),
}

#[derive(Debug, Clone)]
struct ActiveDialog {
    id: DialogId,
    target: SelectedNetwork,
}

/// State of the network-switch confirmation dialog.
#[derive(Debug, Clone, Default)]
pub struct NetworkSwitchDialogState {
    next_id: u64,
    active: Option<ActiveDialog>,
    rejected: bool,
    reenable_at_ms: u64,
}

impl NetworkSwitchDialogState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether connecting to `target` may go ahead.
    ///
    /// On [`DialogGate::Prompt`] the previous dialog state has been reset and
    /// `target` is remembered until the answer arrives.
    pub fn evaluate(
        &mut self,
        ctx: SwitchContext<'_>,
        target: &SelectedNetwork,
        now_ms: u64,
    ) -> DialogGate {
        if !ctx.needs_confirmation(target.network_id()) {
            return DialogGate::Proceed;
        }
        if self.rejected {
            return DialogGate::Blocked(BlockedBy::UserRejected);
        }
        if now_ms < self.reenable_at_ms {
            return DialogGate::Blocked(BlockedBy::Suppressed {
                until_ms: self.reenable_at_ms,
            });
        }
        if let Some(active) = &self.active {
            if active.target.network_id() == target.network_id() {
                return DialogGate::Blocked(BlockedBy::AlreadyPrompting(active.id));
            }
        }
        let replaced = self.reset();
        self.next_id += 1;
        let id = DialogId(self.next_id);
        self.active = Some(ActiveDialog {
            id,
            target: target.clone(),
        });
        DialogGate::Prompt { id, replaced }
    }

    pub fn active(&self) -> Option<DialogId> {
        self.active.as_ref().map(|a| a.id)
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected
    }

    pub fn reenable_at_ms(&self) -> u64 {
        self.reenable_at_ms
    }

    /// Forget the active dialog. Returns its id so the sink can close it.
    pub fn dismiss(&mut self) -> Option<DialogId> {
        self.active.take().map(|a| a.id)
    }

    /// Dismiss and clear both the rejection and the suppression window.
    pub fn reset(&mut self) -> Option<DialogId> {
        self.rejected = false;
        self.reenable_at_ms = 0;
        self.dismiss()
    }

    /// Dismiss and suppress prompts until `now_ms + duration_ms`.
    pub fn disable_for(&mut self, duration_ms: u64, now_ms: u64) -> Option<DialogId> {
        let dismissed = self.dismiss();
        self.reenable_at_ms = now_ms.saturating_add(duration_ms);
        dismissed
    }

    /// The user accepted `id`. Returns the target to resume connecting to.
    pub fn accept(&mut self, id: DialogId) -> Option<SelectedNetwork> {
        if self.active.as_ref().map(|a| a.id) != Some(id) {
            return None;
        }
        let target = self.active.take().map(|a| a.target);
        self.reset();
        target
    }

    /// The user rejected (or cancelled) `id`. Returns the refused target.
    pub fn reject(&mut self, id: DialogId) -> Option<SelectedNetwork> {
        if self.active.as_ref().map(|a| a.id) != Some(id) {
            return None;
        }
        self.rejected = true;
        self.active.take().map(|a| a.target)
    }
}
