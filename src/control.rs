//! Control logic implementing the factor steps and the flip-flop guard.
//!
//! This module contains the scalar performance factor and the state machine
//! that freezes the monitor once it has flipped too often.

/// Default initial performance factor.
pub const DEFAULT_FACTOR: f64 = 0.5;

/// Default factor increment per incline or decline.
pub const DEFAULT_STEP: f64 = 0.1;

/// Monitor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorState {
    /// Collecting windows and classifying batches
    #[default]
    Sampling,
    /// Flip limit exceeded; terminal
    Fallback,
}

/// Owns the performance factor, always within `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorController {
    factor: f64,
    step: f64,
}

impl FactorController {
    /// Create a controller starting at `factor` (clamped into `[0, 1]`).
    pub fn new(factor: f64, step: f64) -> Self {
        Self {
            factor: factor.clamp(0.0, 1.0),
            step,
        }
    }

    /// Current factor.
    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Step the factor up, saturating at 1.
    pub fn incline(&mut self) -> f64 {
        self.factor = (self.factor + self.step).min(1.0);
        self.factor
    }

    /// Step the factor down, saturating at 0.
    pub fn decline(&mut self) -> f64 {
        self.factor = (self.factor - self.step).max(0.0);
        self.factor
    }

    /// Overwrite the factor, clamped into `[0, 1]`. NaN is ignored.
    pub fn set(&mut self, factor: f64) {
        if !factor.is_nan() {
            self.factor = factor.clamp(0.0, 1.0);
        }
    }
}

/// Counts incline and decline flips and trips into fallback once the count
/// exceeds the configured limit.
#[derive(Debug, Clone, PartialEq)]
pub struct HysteresisGuard {
    /// Cumulative flips; never decreases
    flipped: u32,
    /// Allowed flips before fallback; `None` disables the guard
    limit: Option<u32>,
    state: MonitorState,
}

impl HysteresisGuard {
    pub fn new(limit: Option<u32>) -> Self {
        Self {
            flipped: 0,
            limit,
            state: MonitorState::Sampling,
        }
    }

    pub fn flipped(&self) -> u32 {
        self.flipped
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn is_fallback(&self) -> bool {
        self.state == MonitorState::Fallback
    }

    /// Record one incline or decline.
    pub fn record_flip(&mut self) {
        self.flipped = self.flipped.saturating_add(1);
    }

    /// Enter fallback if the flip count exceeds the limit.
    ///
    /// Returns `true` only on the call that performs the transition; once in
    /// fallback the guard never leaves it.
    pub fn check(&mut self) -> bool {
        if self.is_fallback() {
            return false;
        }

        match self.limit {
            Some(limit) if self.flipped > limit => {
                self.state = MonitorState::Fallback;
                true
            }
            _ => false,
        }
    }
}
