//! Server lifecycle state machine.
//!
//! ```text
//! Starting ──▶ Serving ──▶ Draining ──▶ Stopped
//!     └──────────────────────────────────▲
//!            (startup failure)
//! ```
//!
//! States only move forward. Observers subscribe through a watch channel
//! and always see the latest state.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Starting,
    Serving,
    Draining,
    Stopped,
}

impl LifecycleState {
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Starting, Serving) | (Starting, Stopped) | (Serving, Draining) | (Draining, Stopped)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Serving => "serving",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid lifecycle transition {from} -> {to}")]
pub struct TransitionError {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

/// Shared handle to one server's lifecycle. Cloning shares the state.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    tx: Arc<watch::Sender<LifecycleState>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Starting);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// Move to `next`, returning the previous state.
    ///
    /// The check and the write happen under the channel's lock, so two racing
    /// callers cannot both leave the same state.
    pub fn transition(&self, next: LifecycleState) -> Result<LifecycleState, TransitionError> {
        let mut outcome = Err(TransitionError {
            from: next,
            to: next,
        });

        self.tx.send_if_modified(|state| {
            let from = *state;
            if from.can_transition_to(next) {
                *state = next;
                outcome = Ok(from);
                true
            } else {
                outcome = Err(TransitionError { from, to: next });
                false
            }
        });

        if let Ok(from) = outcome {
            tracing::info!(from = %from, to = %next, "Lifecycle transition");
        }
        outcome
    }

    /// Resolve once the state is `target` or later.
    pub async fn wait_for(&self, target: LifecycleState) {
        let mut rx = self.subscribe();
        let _ = rx.wait_for(|state| rank(*state) >= rank(target)).await;
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

fn rank(state: LifecycleState) -> u8 {
    match state {
        LifecycleState::Starting => 0,
        LifecycleState::Serving => 1,
        LifecycleState::Draining => 2,
        LifecycleState::Stopped => 3,
    }
}
