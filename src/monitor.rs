//! The adaptive performance monitor.
//!
//! The host calls [`Monitor::tick`] once per produced frame. Timestamps are
//! folded into fixed-duration sample windows; every `iterations` windows the
//! batch is classified against refresh-rate relative bounds, the factor is
//! stepped on sustained incline or decline, and listeners are notified.
//! Once the flip count exceeds `flipflops` the monitor falls back for good.

use crate::aggregate::IterationAggregator;
use crate::classify::BoundsClassifier;
use crate::config::MonitorConfig;
use crate::control::{FactorController, HysteresisGuard, MonitorState};
use crate::error::{ConfigError, ListenerError};
use crate::sampling::{RefreshRateEstimator, SampleWindow};
use crate::subscribers::{
    invoke, ListenerFailure, ListenerOrigin, MonitorEvent, PerformanceListener,
    SubscriberRegistry, SubscriptionHandle,
};
use serde::Serialize;
use tracing::{info, warn};

/// Read-only view of the monitor passed to every listener.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    /// Most recent windowed fps reading.
    pub fps: f64,
    /// Current performance factor in `[0, 1]`.
    pub factor: f64,
    /// Highest fps observed so far.
    pub refreshrate: f64,
    /// Frames in the open sample window.
    pub frames: usize,
    /// Cumulative incline and decline count.
    pub flipped: u32,
    /// Whether the monitor has permanently fallen back.
    pub fallback: bool,
}

/// Events and listener failures produced by one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Events in dispatch order.
    pub events: Vec<MonitorEvent>,
    pub failures: Vec<ListenerFailure>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.failures.is_empty()
    }

    pub fn contains(&self, event: MonitorEvent) -> bool {
        self.events.contains(&event)
    }
}

/// Adaptive performance monitor.
pub struct Monitor {
    window: SampleWindow,
    refresh: RefreshRateEstimator,
    iterations: IterationAggregator,
    classifier: BoundsClassifier,
    controller: FactorController,
    guard: HysteresisGuard,
    /// Handlers supplied at construction, always notified first.
    root: Option<Box<dyn PerformanceListener>>,
    subscribers: SubscriberRegistry,
    fps: f64,
    /// Factor value last announced through `on_change`.
    last_factor: f64,
}

impl Monitor {
    /// Create a monitor after validating `config`.
    pub fn new(config: MonitorConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let factor = config.factor;
        Ok(Self {
            window: SampleWindow::new(config.ms),
            refresh: RefreshRateEstimator::new(),
            iterations: IterationAggregator::new(config.iterations),
            classifier: BoundsClassifier::new(config.bounds, config.threshold),
            controller: FactorController::new(factor, config.step),
            guard: HysteresisGuard::new(config.flipflops),
            root: None,
            subscribers: SubscriberRegistry::new(),
            fps: 0.0,
            last_factor: factor,
        })
    }

    /// Create a monitor with root-level handlers.
    pub fn with_listener<L>(config: MonitorConfig, root: L) -> Result<Self, ConfigError>
    where
        L: PerformanceListener + 'static,
    {
        let mut monitor = Self::new(config)?;
        monitor.root = Some(Box::new(root));
        Ok(monitor)
    }

    /// Feed one frame timestamp in milliseconds.
    ///
    /// Timestamps must be non-decreasing. After fallback this is a no-op.
    pub fn tick(&mut self, now: f64) -> TickReport {
        let mut report = TickReport::default();

        if self.guard.is_fallback() || self.iterations.is_full() {
            return report;
        }

        let Some(fps) = self.window.push(now) else {
            return report;
        };

        self.fps = fps;
        self.refresh.observe(fps);
        if !self.iterations.push(fps) {
            return report;
        }

        let batch = self.iterations.take();
        let outcome = self.classifier.classify(self.refresh.current(), &batch);

        if outcome.incline {
            let factor = self.controller.incline();
            self.guard.record_flip();
            info!(factor, flipped = self.guard.flipped(), "Performance inclined");
            self.emit(MonitorEvent::Incline, &mut report);
        }

        if outcome.decline {
            let factor = self.controller.decline();
            self.guard.record_flip();
            info!(factor, flipped = self.guard.flipped(), "Performance declined");
            self.emit(MonitorEvent::Decline, &mut report);
        }

        let factor = self.controller.factor();
        if factor != self.last_factor {
            info!(from = self.last_factor, to = factor, "Performance factor changed");
            self.last_factor = factor;
            self.emit(MonitorEvent::Change, &mut report);
        }

        if self.guard.check() {
            warn!(
                flipped = self.guard.flipped(),
                limit = ?self.guard.limit(),
                factor,
                "Flip limit exceeded, monitor falling back"
            );
            self.emit(MonitorEvent::Fallback, &mut report);
        }

        report
    }

    /// Register a listener bundle, notified after the root handlers.
    pub fn subscribe<L>(&mut self, listener: L) -> SubscriptionHandle
    where
        L: PerformanceListener + 'static,
    {
        self.subscribers.subscribe(Box::new(listener))
    }

    /// Remove a subscription. Returns `false` if it was already removed.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        self.subscribers.unsubscribe(handle)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Overwrite the factor from outside the classifier, clamped into `[0, 1]`.
    ///
    /// The change is announced at the next classification.
    pub fn set_factor(&mut self, factor: f64) {
        self.controller.set(factor);
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn factor(&self) -> f64 {
        self.controller.factor()
    }

    pub fn refreshrate(&self) -> f64 {
        self.refresh.current()
    }

    /// Frames in the open sample window.
    pub fn frames(&self) -> usize {
        self.window.len()
    }

    /// Readings of the batch currently being collected.
    pub fn averages(&self) -> &[f64] {
        self.iterations.values()
    }

    /// Total number of completed windows.
    pub fn index(&self) -> u64 {
        self.iterations.index()
    }

    pub fn flipped(&self) -> u32 {
        self.guard.flipped()
    }

    pub fn fallback(&self) -> bool {
        self.guard.is_fallback()
    }

    pub fn state(&self) -> MonitorState {
        self.guard.state()
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            fps: self.fps,
            factor: self.controller.factor(),
            refreshrate: self.refresh.current(),
            frames: self.window.len(),
            flipped: self.guard.flipped(),
            fallback: self.guard.is_fallback(),
        }
    }

    /// Notify root handlers, then subscribers, collecting failures.
    fn emit(&mut self, event: MonitorEvent, report: &mut TickReport) {
        let snapshot = self.snapshot();

        if let Some(root) = self.root.as_mut() {
            if let Err(error) = invoke(root.as_mut(), event, &snapshot) {
                warn!(%event, %error, "Root handler failed, continuing fan-out");
                report.failures.push(root_failure(event, error));
            }
        }

        report
            .failures
            .extend(self.subscribers.notify(event, &snapshot));
        report.events.push(event);
    }
}

fn root_failure(event: MonitorEvent, error: ListenerError) -> ListenerFailure {
    ListenerFailure {
        origin: ListenerOrigin::Root,
        event,
        error,
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("snapshot", &self.snapshot())
            .field("averages", &self.iterations.values())
            .field("classifier", &self.classifier)
            .field("subscribers", &self.subscribers)
            .finish()
    }
}
