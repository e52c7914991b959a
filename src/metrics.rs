//! Metrics collection for monitor events.
//!
//! Tracks flip counts, factor changes and timing. Register an
//! `Arc<MetricsCollector>` as a subscriber and read it from anywhere.

use crate::error::ListenerError;
use crate::monitor::MonitorSnapshot;
use crate::subscribers::PerformanceListener;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

const HOUR: Duration = Duration::from_secs(3600);

/// Number of change intervals kept for the running mean.
const MAX_CHANGE_INTERVALS: usize = 100;

/// Metrics summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResponse {
    /// Inclines plus declines since start
    pub total_flips: u64,
    /// Flips in the last hour
    pub flips_per_hour: u64,
    pub incline_count: u64,
    pub decline_count: u64,
    /// Announced factor changes
    pub change_count: u64,
    /// Average time between factor changes (seconds)
    pub avg_time_between_changes_sec: f64,
    /// Factor from the most recent event
    pub last_factor: f64,
    /// Most recent fps reading seen with an event
    pub last_fps: f64,
    pub fallback: bool,
    /// Uptime in seconds
    pub uptime_sec: u64,
}

/// Metrics collector for monitor events.
pub struct MetricsCollector {
    start_time: Instant,
    incline_count: AtomicU64,
    decline_count: AtomicU64,
    change_count: AtomicU64,
    fallback: AtomicBool,
    /// Flip timestamps for the per-hour rate
    recent_flips: RwLock<Vec<Instant>>,
    /// Durations between consecutive factor changes
    change_intervals: RwLock<Vec<Duration>>,
    last_change: RwLock<Option<Instant>>,
    last_snapshot: RwLock<MonitorSnapshot>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            incline_count: AtomicU64::new(0),
            decline_count: AtomicU64::new(0),
            change_count: AtomicU64::new(0),
            fallback: AtomicBool::new(false),
            recent_flips: RwLock::new(Vec::new()),
            change_intervals: RwLock::new(Vec::new()),
            last_change: RwLock::new(None),
            last_snapshot: RwLock::new(MonitorSnapshot::default()),
        }
    }

    /// Record an incline (`true`) or a decline (`false`).
    pub fn record_flip(&self, incline: bool, snapshot: &MonitorSnapshot) {
        self.record_flip_at(incline, snapshot, Instant::now());
    }

    /// Record a flip with explicit timestamp (for testing).
    pub fn record_flip_at(&self, incline: bool, snapshot: &MonitorSnapshot, now: Instant) {
        if incline {
            self.incline_count.fetch_add(1, Ordering::SeqCst);
        } else {
            self.decline_count.fetch_add(1, Ordering::SeqCst);
        }

        if let Ok(mut flips) = self.recent_flips.write() {
            flips.push(now);
            flips.retain(|t| now.duration_since(*t) < HOUR);
        }

        self.remember(snapshot);
    }

    /// Record an announced factor change.
    pub fn record_change(&self, snapshot: &MonitorSnapshot) {
        self.record_change_at(snapshot, Instant::now());
    }

    /// Record a factor change with explicit timestamp (for testing).
    pub fn record_change_at(&self, snapshot: &MonitorSnapshot, now: Instant) {
        self.change_count.fetch_add(1, Ordering::SeqCst);

        if let Ok(mut last_change) = self.last_change.write() {
            if let Some(last) = *last_change {
                if let Ok(mut intervals) = self.change_intervals.write() {
                    intervals.push(now.duration_since(last));
                    if intervals.len() > MAX_CHANGE_INTERVALS {
                        intervals.remove(0);
                    }
                }
            }
            *last_change = Some(now);
        }

        self.remember(snapshot);
    }

    /// Record the terminal fallback.
    pub fn record_fallback(&self, snapshot: &MonitorSnapshot) {
        self.fallback.store(true, Ordering::SeqCst);
        self.remember(snapshot);
    }

    fn remember(&self, snapshot: &MonitorSnapshot) {
        if let Ok(mut last) = self.last_snapshot.write() {
            *last = *snapshot;
        }
    }

    /// Get current metrics
    pub fn get_metrics(&self) -> MetricsResponse {
        self.get_metrics_at(Instant::now())
    }

    /// Get metrics as of `now` (for testing).
    pub fn get_metrics_at(&self, now: Instant) -> MetricsResponse {
        let uptime = now.saturating_duration_since(self.start_time);

        let flips_per_hour = self
            .recent_flips
            .read()
            .map(|flips| {
                flips
                    .iter()
                    .filter(|t| now.saturating_duration_since(**t) < HOUR)
                    .count() as u64
            })
            .unwrap_or(0);

        let avg_time_between_changes = self
            .change_intervals
            .read()
            .map(|intervals| {
                if intervals.is_empty() {
                    0.0
                } else {
                    let total: Duration = intervals.iter().sum();
                    total.as_secs_f64() / intervals.len() as f64
                }
            })
            .unwrap_or(0.0);

        let last = self
            .last_snapshot
            .read()
            .map(|s| *s)
            .unwrap_or_default();

        let incline_count = self.incline_count.load(Ordering::SeqCst);
        let decline_count = self.decline_count.load(Ordering::SeqCst);

        MetricsResponse {
            total_flips: incline_count + decline_count,
            flips_per_hour,
            incline_count,
            decline_count,
            change_count: self.change_count.load(Ordering::SeqCst),
            avg_time_between_changes_sec: avg_time_between_changes,
            last_factor: last.factor,
            last_fps: last.fps,
            fallback: self.fallback.load(Ordering::SeqCst),
            uptime_sec: uptime.as_secs(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceListener for Arc<MetricsCollector> {
    fn on_incline(&mut self, snapshot: &MonitorSnapshot) -> Result<(), ListenerError> {
        self.record_flip(true, snapshot);
        Ok(())
    }

    fn on_decline(&mut self, snapshot: &MonitorSnapshot) -> Result<(), ListenerError> {
        self.record_flip(false, snapshot);
        Ok(())
    }

    fn on_change(&mut self, snapshot: &MonitorSnapshot) -> Result<(), ListenerError> {
        self.record_change(snapshot);
        Ok(())
    }

    fn on_fallback(&mut self, snapshot: &MonitorSnapshot) -> Result<(), ListenerError> {
        self.record_fallback(snapshot);
        Ok(())
    }
}
