//! Service lifecycle state machine
//!
//! Every Vaultline service moves through the same states:
//!
//! ```text
//! Created -> Initializing -> Initialized -> Closed
//!                 \-> Compromised (any configure/initialize failure)
//! ```
//!
//! Initialization is two-phase: [`ServiceLifecycle::begin_initialize`]
//! moves the service to `Initializing` and returns an [`InitScope`] guard.
//! Committing the scope completes the transition to `Initialized`;
//! dropping it uncommitted marks the service `Compromised`. A compromised
//! or closed service rejects every operation with a [`StateError`] naming
//! the current and required states.

use std::fmt;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{ErrorClassification, ErrorSeverity};

/// Service lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Service has been constructed but not initialized
    Created,
    /// Two-phase initialization is in progress
    Initializing,
    /// Service is operational
    Initialized,
    /// Initialization or configuration failed; the service is unusable
    Compromised,
    /// Service has been closed
    Closed,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::Initializing => write!(f, "INITIALIZING"),
            Self::Initialized => write!(f, "INITIALIZED"),
            Self::Compromised => write!(f, "COMPROMISED"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Lifecycle error type
#[derive(Debug, Clone, Error)]
pub enum StateError {
    #[error("invalid service state {current}, operation requires {required}")]
    InvalidState { current: ServiceState, required: String },
}

impl ErrorClassification for StateError {
    fn is_retryable(&self) -> bool {
        // A service stuck in the wrong state will not fix itself
        false
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidState { current: ServiceState::Compromised, .. } => ErrorSeverity::Critical,
            Self::InvalidState { .. } => ErrorSeverity::Error,
        }
    }
}

fn required_label(states: &[ServiceState]) -> String {
    states.iter().map(ServiceState::to_string).collect::<Vec<_>>().join(" or ")
}

/// Shared lifecycle state machine for Vaultline services
///
/// Transitions are guarded by a mutex so concurrent initialize-vs-query
/// attempts serialize; state-checking code never calls back into the
/// machine while holding the lock.
#[derive(Debug)]
pub struct ServiceLifecycle {
    state: Mutex<ServiceState>,
}

impl Default for ServiceLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceLifecycle {
    /// Create a lifecycle in the `Created` state
    pub fn new() -> Self {
        Self { state: Mutex::new(ServiceState::Created) }
    }

    /// Get the current state
    pub fn state(&self) -> ServiceState {
        *self.state.lock()
    }

    /// Begin two-phase initialization
    ///
    /// Transitions `Created -> Initializing` and returns the scope guard
    /// that completes (or poisons) the transition. A second initializer
    /// observes `Initializing` and fails, so concurrent attempts
    /// serialize on the first one's outcome.
    ///
    /// # Errors
    /// Fails with [`StateError::InvalidState`] unless the service is in
    /// `Created`.
    pub fn begin_initialize(&self) -> Result<InitScope<'_>, StateError> {
        let mut state = self.state.lock();
        if *state != ServiceState::Created {
            return Err(StateError::InvalidState {
                current: *state,
                required: ServiceState::Created.to_string(),
            });
        }
        *state = ServiceState::Initializing;
        debug!("service initializing");
        Ok(InitScope { lifecycle: self, committed: false })
    }

    /// Require the current state to be one of `expected`
    ///
    /// # Errors
    /// Fails with [`StateError::InvalidState`] naming the current and
    /// required states.
    pub fn require(&self, expected: &[ServiceState]) -> Result<(), StateError> {
        let current = *self.state.lock();
        if expected.contains(&current) {
            Ok(())
        } else {
            Err(StateError::InvalidState { current, required: required_label(expected) })
        }
    }

    /// Mark the service compromised
    ///
    /// Terminal: no further transitions are possible.
    pub fn compromise(&self) {
        let mut state = self.state.lock();
        warn!(previous = %*state, "service compromised");
        *state = ServiceState::Compromised;
    }

    /// Close the service
    ///
    /// # Errors
    /// Fails with [`StateError::InvalidState`] unless the service is
    /// `Initialized`.
    pub fn close(&self) -> Result<(), StateError> {
        let mut state = self.state.lock();
        if *state != ServiceState::Initialized {
            return Err(StateError::InvalidState {
                current: *state,
                required: ServiceState::Initialized.to_string(),
            });
        }
        *state = ServiceState::Closed;
        debug!("service closed");
        Ok(())
    }
}

/// Guard for the `Initializing` phase
///
/// [`InitScope::commit`] completes initialization; dropping the scope
/// without committing marks the service compromised. This makes "any
/// failure during configure transitions to COMPROMISED" a structural
/// guarantee rather than something every error path remembers to do.
#[must_use = "dropping an uncommitted InitScope compromises the service"]
pub struct InitScope<'a> {
    lifecycle: &'a ServiceLifecycle,
    committed: bool,
}

impl InitScope<'_> {
    /// Complete initialization, transitioning to `Initialized`
    pub fn commit(mut self) {
        let mut state = self.lifecycle.state.lock();
        *state = ServiceState::Initialized;
        self.committed = true;
        debug!("service initialized");
    }
}

impl Drop for InitScope<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.lifecycle.compromise();
        }
    }
}
