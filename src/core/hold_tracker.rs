// Hold tracking - continuous time the target pose is held above the confidence threshold

use crate::models::pose::YogaPose;
use crate::models::session::{HoldSnapshot, HoldState};
use std::time::{Duration, Instant};

/// Two-state hold timer fed with one target pose probability per tick
#[derive(Debug, Clone)]
pub struct HoldTracker {
    threshold: f32,
    hold_started_at: Option<Instant>,
    current_hold: Duration,
    best_hold: Duration,
}

impl HoldTracker {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            hold_started_at: None,
            current_hold: Duration::ZERO,
            best_hold: Duration::ZERO,
        }
    }

    /// Feed the probability of the target pose observed at `now`
    ///
    /// Entering `Holding` restarts the current hold from zero; leaving it
    /// freezes the current hold at its last value.
    pub fn update(&mut self, probability: f32, now: Instant) -> HoldState {
        if probability >= self.threshold {
            let started_at = *self.hold_started_at.get_or_insert(now);
            self.current_hold = now.saturating_duration_since(started_at);
            self.best_hold = self.best_hold.max(self.current_hold);
            HoldState::Holding
        } else {
            self.hold_started_at = None;
            HoldState::NotHolding
        }
    }

    /// Back to `NotHolding` with both durations cleared
    pub fn reset(&mut self) {
        self.hold_started_at = None;
        self.current_hold = Duration::ZERO;
        self.best_hold = Duration::ZERO;
    }

    pub fn state(&self) -> HoldState {
        if self.hold_started_at.is_some() {
            HoldState::Holding
        } else {
            HoldState::NotHolding
        }
    }

    pub fn is_holding(&self) -> bool {
        self.hold_started_at.is_some()
    }

    pub fn current_hold(&self) -> Duration {
        self.current_hold
    }

    pub fn best_hold(&self) -> Duration {
        self.best_hold
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn snapshot(&self, target: YogaPose) -> HoldSnapshot {
        HoldSnapshot {
            target,
            state: self.state(),
            current_hold: self.current_hold,
            best_hold: self.best_hold,
        }
    }
}
