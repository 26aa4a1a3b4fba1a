//! Time abstraction for testability
//!
//! Cache expiry is measured against a [`Clock`] rather than
//! `Instant::now()` directly, so TTL behavior can be tested
//! deterministically with [`MockClock`] instead of sleeping.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Trait for monotonic time operations
pub trait Clock: Send + Sync {
    /// Get the current instant (monotonic time)
    fn now(&self) -> Instant;
}

/// Real system clock implementation
///
/// Use this in production code.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Mock clock for deterministic testing
///
/// Time only moves when [`MockClock::advance`] is called, so expiry
/// boundaries can be crossed exactly.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use vaultline_common::time::{Clock, MockClock};
///
/// let clock = MockClock::new();
/// let start = clock.now();
/// clock.advance(Duration::from_secs(5));
/// assert_eq!(clock.now().duration_since(start), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock anchored at the current real instant
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        // Test utility: panic on poisoned mutex to fail tests early
        let mut elapsed = self.elapsed.lock().expect("mutex poisoned");
        *elapsed += duration;
    }

    /// Get the simulated time elapsed since the clock was created
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        // Test utility: panic on poisoned mutex to fail tests early
        *self.elapsed.lock().expect("mutex poisoned")
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        // Test utility: panic on poisoned mutex to fail tests early
        self.start + *self.elapsed.lock().expect("mutex poisoned")
    }
}
