//! Alert debouncing
//!
//! An [`AlertGate`] fires only when the tracked categorical state changes
//! and the cooldown since the last fired alert has elapsed. Changes that
//! arrive during cooldown are absorbed into the tracked state without
//! firing; they are never queued or replayed.

use std::time::{Duration, Instant};

/// Default cooldown between fired alerts
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

/// Two-state debouncer over a categorical condition
#[derive(Debug, Clone)]
pub struct AlertGate<T> {
    cooldown: Duration,
    last_fired: Option<Instant>,
    last_signalled: T,
}

impl<T: PartialEq + Clone> AlertGate<T> {
    /// Create a gate that starts quiet in `initial` state
    pub fn new(initial: T, cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_fired: None,
            last_signalled: initial,
        }
    }

    /// Record `state` observed at `now`; returns true if an alert fires
    pub fn check(&mut self, state: T, now: Instant) -> bool {
        if state == self.last_signalled {
            return false;
        }

        let cooled_down = match self.last_fired {
            None => true,
            Some(fired) => now.saturating_duration_since(fired) >= self.cooldown,
        };

        self.last_signalled = state;

        if cooled_down {
            self.last_fired = Some(now);
        }
        cooled_down
    }

    pub fn last_signalled(&self) -> &T {
        &self.last_signalled
    }

    pub fn last_fired(&self) -> Option<Instant> {
        self.last_fired
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Whether a state change at `now` would be absorbed
    pub fn in_cooldown(&self, now: Instant) -> bool {
        self.last_fired
            .map(|fired| now.saturating_duration_since(fired) < self.cooldown)
            .unwrap_or(false)
    }
}
