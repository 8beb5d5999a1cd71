//! Virtual clock for the simulated network.
//!
//! Time is a [`Duration`] since the simulation epoch. It never advances on
//! its own; only the network side moves it, and only forward.

use std::time::Duration;

/// Monotonic simulated clock.
///
/// Owned by the simulation state and advanced explicitly while the network
/// role is held. Attempting to move time backwards is a test-author error
/// and panics.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    now: Duration,
}

impl VirtualClock {
    /// Create a clock starting at the given epoch.
    pub fn new(epoch: Duration) -> Self {
        Self { now: epoch }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Advance to an absolute time.
    ///
    /// # Panics
    ///
    /// Panics if `to` is before the current time.
    pub fn advance_to(&mut self, to: Duration) {
        assert!(
            to >= self.now,
            "virtual time cannot move backwards ({:?} -> {:?})",
            self.now,
            to
        );
        if to > self.now {
            tracing::trace!(from_ms = self.now.as_millis() as u64, to_ms = to.as_millis() as u64, "advancing virtual time");
            self.now = to;
        }
    }

    /// Advance by a relative amount.
    pub fn advance_by(&mut self, delta: Duration) {
        self.now += delta;
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}
