//! Cooperative pause barrier
//!
//! A manual-reset gate: closed while the run is paused, open otherwise.
//! Workers and the dispatcher await the gate at their suspension points;
//! closing and opening are idempotent so repeated pause/resume requests and
//! the signal handler's forced open cannot double-count.

use tokio::sync::watch;

/// Manual-reset gate toggled by pause/resume
#[derive(Debug)]
pub struct PauseGate {
    state: watch::Sender<bool>,
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PauseGate {
    /// Creates an open gate
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self { state }
    }

    /// Closes the gate; returns true if it was open
    pub fn close(&self) -> bool {
        self.state.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    /// Opens the gate, releasing all waiters; returns true if it was closed
    pub fn open(&self) -> bool {
        self.state.send_if_modified(|closed| {
            if *closed {
                *closed = false;
                true
            } else {
                false
            }
        })
    }

    /// Whether the gate is currently closed
    pub fn is_closed(&self) -> bool {
        *self.state.borrow()
    }

    /// Waits until the gate is open; returns immediately when it already is
    pub async fn wait(&self) {
        let mut rx = self.state.subscribe();
        while *rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}
