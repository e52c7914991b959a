//! Frame sampling for the performance monitor.
//!
//! Converts raw per-frame timestamps into one frames-per-second reading per
//! fixed time budget, and tracks the highest reading ever seen as an estimate
//! of the display's refresh rate.

use tracing::{trace, warn};

/// Default time budget of a sample window in milliseconds.
pub const DEFAULT_WINDOW_MS: f64 = 250.0;

/// Accumulates frame timestamps until the window's time budget has elapsed.
///
/// Windows are fixed-length in time, not in frame count: a slow renderer
/// closes a window with few frames, a fast one with many.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    /// Timestamps (milliseconds) of the frames seen in the open window.
    frames: Vec<f64>,
    /// Time budget in milliseconds.
    budget_ms: f64,
}

impl SampleWindow {
    /// Create an empty window with the given time budget in milliseconds.
    pub fn new(budget_ms: f64) -> Self {
        Self {
            frames: Vec::new(),
            budget_ms,
        }
    }

    /// Record a frame timestamp.
    ///
    /// Returns the rounded fps of the window once at least `budget_ms` have
    /// passed between its first and last frame; the window is then cleared.
    /// Non-finite timestamps are dropped. A timestamp earlier than the last
    /// one restarts the window at `now`.
    pub fn push(&mut self, now: f64) -> Option<f64> {
        if !now.is_finite() {
            warn!(now, "Ignoring non-finite frame timestamp");
            return None;
        }

        if let Some(&last) = self.frames.last() {
            if now < last {
                warn!(now, last, "Frame timestamp went backwards; restarting window");
                self.frames.clear();
            }
        }

        self.frames.push(now);

        let first = self.frames.first().copied().unwrap_or(now);
        let ms_passed = (now - first).max(0.0);
        if ms_passed < self.budget_ms {
            return None;
        }

        let fps = (self.frames.len() as f64 / ms_passed * 1000.0).round();
        trace!(frames = self.frames.len(), ms_passed, fps, "Sample window closed");
        self.frames.clear();
        Some(fps)
    }

    /// Number of frames in the open window.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if the open window holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Time budget in milliseconds.
    pub fn budget_ms(&self) -> f64 {
        self.budget_ms
    }
}

/// Running maximum of all observed fps values.
///
/// The highest fps a device ever reaches is used as a proxy for its display
/// refresh rate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RefreshRateEstimator {
    max_fps: f64,
}

impl RefreshRateEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a new fps reading into the estimate and return the updated value.
    pub fn observe(&mut self, fps: f64) -> f64 {
        self.max_fps = self.max_fps.max(fps);
        self.max_fps
    }

    /// Current refresh rate estimate; zero until the first window closes.
    pub fn current(&self) -> f64 {
        self.max_fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_frame_never_closes_window() {
        let mut window = SampleWindow::new(100.0);
        assert_eq!(window.push(0.0), None);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_window_closes_once_budget_reached() {
        let mut window = SampleWindow::new(100.0);

        // 10ms spacing: frames at 0, 10, ..., 90 stay open
        for i in 0..10 {
            assert_eq!(window.push(i as f64 * 10.0), None);
        }

        // The 11th frame lands exactly on the budget: 11 frames over 100ms
        assert_eq!(window.push(100.0), Some(110.0));
        assert!(window.is_empty());
    }

    #[test]
    fn test_fps_is_rounded() {
        let mut window = SampleWindow::new(250.0);
        window.push(0.0);
        window.push(100.0);
        // 3 frames over 260ms = 11.538... fps
        assert_eq!(window.push(260.0), Some(12.0));
    }

    #[test]
    fn test_backwards_timestamp_restarts_window() {
        let mut window = SampleWindow::new(100.0);
        window.push(50.0);
        window.push(60.0);
        assert_eq!(window.push(10.0), None);
        assert_eq!(window.len(), 1);

        // The restarted window closes relative to the new first frame
        for t in [30.0, 50.0, 70.0, 90.0] {
            assert_eq!(window.push(t), None);
        }
        assert_eq!(window.push(110.0), Some(60.0));
        assert!(window.is_empty());
    }

    #[test]
    fn test_backwards_jump_keeps_window_bounded() {
        let mut window = SampleWindow::new(100.0);
        window.push(1_000_000.0);

        let mut closed = 0;
        for i in 0..1_000 {
            if window.push(i as f64 * 10.0).is_some() {
                closed += 1;
            }
            assert!(window.len() <= 11);
        }
        assert!(closed > 0);
    }

    #[test]
    fn test_non_finite_timestamp_is_dropped() {
        let mut window = SampleWindow::new(100.0);
        assert_eq!(window.push(f64::NAN), None);
        assert_eq!(window.push(f64::INFINITY), None);
        assert!(window.is_empty());
    }

    #[test]
    fn test_refresh_rate_is_running_max() {
        let mut estimator = RefreshRateEstimator::new();
        assert_eq!(estimator.current(), 0.0);
        assert_eq!(estimator.observe(58.0), 58.0);
        assert_eq!(estimator.observe(120.0), 120.0);
        assert_eq!(estimator.observe(30.0), 120.0);
    }

    // For evenly spaced frames, the window closes on the first frame whose
    // distance from the opening frame reaches the budget, and the reading is
    // round(k / ms_passed * 1000) for the k frames seen so far.
    proptest! {
        #[test]
        fn prop_fps_matches_frame_count_over_elapsed(
            spacing in 1u32..=50u32,
            budget in 10u32..=500u32,
        ) {
            let spacing = spacing as f64;
            let budget = budget as f64;
            let mut window = SampleWindow::new(budget);

            let mut k = 0usize;
            let reading = loop {
                let now = k as f64 * spacing;
                k += 1;
                if let Some(fps) = window.push(now) {
                    break (fps, now);
                }
            };

            let (fps, ms_passed) = reading;
            prop_assert!(ms_passed >= budget);
            prop_assert!(ms_passed - spacing < budget);
            prop_assert_eq!(fps, (k as f64 / ms_passed * 1000.0).round());
            prop_assert!(window.is_empty());
        }

        #[test]
        fn prop_refresh_rate_never_decreases(
            readings in prop::collection::vec(0.0f64..500.0f64, 1..100)
        ) {
            let mut estimator = RefreshRateEstimator::new();
            let mut previous = 0.0;
            for fps in readings {
                let current = estimator.observe(fps);
                prop_assert!(current >= previous);
                prop_assert!(current >= fps);
                previous = current;
            }
        }
    }
}
