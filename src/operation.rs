//! Per-operation deadlines and cancellation.
//!
//! Every registry operation runs under an [`Operation`]. It is checked
//! between network steps, and remote sessions cap their request timeout at
//! the time remaining, so an expired or canceled operation stops issuing
//! requests and returns [`RegistryError::Canceled`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{RegistryError, Result};

/// Shared flag used to cancel running operations from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not canceled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Deadline and cancellation state for one operation.
#[derive(Debug, Clone, Default)]
pub struct Operation {
    deadline: Option<Instant>,
    cancel: CancelToken,
}

impl Operation {
    /// An operation with no deadline.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// An operation that must finish within `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::unbounded().deadline(Instant::now() + timeout)
    }

    /// Set an absolute deadline.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach a cancellation token.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// The absolute deadline, if there is one.
    pub fn expires_at(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, if there is one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Fail with [`RegistryError::Canceled`] if the operation should stop.
    pub fn check(&self, step: &str) -> Result<()> {
        if self.cancel.is_canceled() {
            return Err(RegistryError::Canceled {
                message: format!("canceled before {}", step),
            });
        }

        if self.remaining() == Some(Duration::ZERO) {
            return Err(RegistryError::Canceled {
                message: format!("deadline expired before {}", step),
            });
        }

        Ok(())
    }
}
