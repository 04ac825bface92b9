//! Observable status cell
//!
//! Backed by a `tokio::sync::watch` channel so waiters are woken on every
//! transition instead of polling.

use super::ConnectionStatus;
use thiserror::Error;
use tokio::sync::watch;

/// Errors raised while waiting on a status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StatusError {
    /// Only initial-login-cycle statuses can be awaited in order
    #[error("{0} is not part of the initial login cycle")]
    NotInitStatus(ConnectionStatus),

    /// The client shut down while waiting
    #[error("Client shut down while waiting for status")]
    Shutdown,

    /// A caller-named fail-fast status was reached
    #[error("Reached fail-fast status {0}")]
    FailFast(ConnectionStatus),
}

/// Single-writer status cell with blocking waiters
#[derive(Debug)]
pub struct StatusCell {
    tx: watch::Sender<ConnectionStatus>,
}

impl StatusCell {
    /// Create a cell holding `initial`
    #[must_use]
    pub fn new(initial: ConnectionStatus) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Current status
    pub fn get(&self) -> ConnectionStatus {
        *self.tx.borrow()
    }

    /// Transition to `status`, returning the previous value
    ///
    /// `Shutdown` is terminal: once reached, later transitions are ignored.
    pub fn set(&self, status: ConnectionStatus) -> ConnectionStatus {
        let mut previous = status;
        self.tx.send_if_modified(|current| {
            previous = *current;
            if *current == status || *current == ConnectionStatus::Shutdown {
                return false;
            }
            *current = status;
            true
        });

        if previous != status && previous != ConnectionStatus::Shutdown {
            tracing::debug!(from = %previous, to = %status, "Connection status changed");
        }
        previous
    }

    /// Subscribe to status transitions
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.tx.subscribe()
    }

    /// Wait until the status reaches `target` within the initial login cycle
    ///
    /// Returns immediately once `Connected`. Fails with
    /// [`StatusError::Shutdown`] if the client shuts down, or with
    /// [`StatusError::FailFast`] if any status in `fail_on` is observed.
    pub async fn await_status(
        &self,
        target: ConnectionStatus,
        fail_on: &[ConnectionStatus],
    ) -> Result<ConnectionStatus, StatusError> {
        if !target.is_init() {
            return Err(StatusError::NotInitStatus(target));
        }

        let mut rx = self.tx.subscribe();
        loop {
            let current = *rx.borrow_and_update();
            if current == ConnectionStatus::Connected {
                return Ok(current);
            }
            if current == ConnectionStatus::Shutdown {
                return Err(StatusError::Shutdown);
            }
            if fail_on.contains(&current) {
                return Err(StatusError::FailFast(current));
            }
            if current.is_init() && current >= target {
                return Ok(current);
            }

            if rx.changed().await.is_err() {
                return Err(StatusError::Shutdown);
            }
        }
    }

    /// Wait until the client is fully connected
    pub async fn await_ready(&self) -> Result<(), StatusError> {
        self.await_status(ConnectionStatus::Connected, &[]).await.map(|_| ())
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new(ConnectionStatus::Initializing)
    }
}
