// SPDX-FileCopyrightText: 2026 Satchel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Readiness gate between asynchronous session startup and early callers.
//!
//! Every public operation suspends on the gate before touching the engine,
//! so no caller ever observes a partially-initialized database. The gate is
//! a watch channel, not a polling loop: waiters yield until the state
//! changes.

use satchel_core::SatchelError;
use tokio::sync::watch;

/// Initialization state of a database session.
///
/// Transitions are monotonic: `Uninitialized` → `Initializing` → `Ready`,
/// or `Initializing` → `Failed`. `Ready` and `Failed` are terminal; the
/// state never regresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadyState {
    Uninitialized,
    Initializing,
    Ready,
    /// Initialization failed. Waiters receive an initialization error
    /// instead of suspending forever; the session never serves operations.
    Failed(String),
}

impl ReadyState {
    fn rank(&self) -> u8 {
        match self {
            Self::Uninitialized => 0,
            Self::Initializing => 1,
            // Both terminal states share a rank so neither can replace the
            // other.
            Self::Ready | Self::Failed(_) => 2,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed(_))
    }
}

#[derive(Debug)]
pub(crate) struct ReadinessGate {
    tx: watch::Sender<ReadyState>,
}

impl ReadinessGate {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(ReadyState::Uninitialized);
        Self { tx }
    }

    /// Advance to `next`. Backward or terminal-to-terminal transitions are
    /// ignored, keeping the state monotonic.
    pub(crate) fn advance(&self, next: ReadyState) {
        self.tx.send_if_modified(|state| {
            if next.rank() > state.rank() {
                *state = next;
                true
            } else {
                false
            }
        });
    }

    pub(crate) fn state(&self) -> ReadyState {
        self.tx.borrow().clone()
    }

    /// Suspend the caller until the session is ready.
    ///
    /// There is no deadline: a session that never finishes initializing
    /// keeps its callers suspended. A session whose initialization failed
    /// resolves every waiter with an initialization error instead.
    pub(crate) async fn wait_ready(&self) -> Result<(), SatchelError> {
        let mut rx = self.tx.subscribe();
        let state = rx
            .wait_for(ReadyState::is_terminal)
            .await
            .map_err(|e| SatchelError::Initialization {
                source: Box::new(e),
            })?;
        if let ReadyState::Failed(reason) = &*state {
            return Err(SatchelError::Initialization {
                source: reason.clone().into(),
            });
        }
        Ok(())
    }
}
