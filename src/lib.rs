//! Adaptive performance monitor.
//!
//! Watches the frame rate of a host render loop, classifies sustained high
//! or low throughput against refresh-rate relative bounds, and steps a
//! performance factor in `[0, 1]` that consumers use to scale their workload.
//! Oscillation is capped by a flip counter that permanently freezes the
//! monitor once a configured limit is exceeded.
//!
//! ```
//! use adaptive_perf_monitor::{Handlers, Monitor, MonitorConfig};
//!
//! let mut monitor = Monitor::with_listener(
//!     MonitorConfig::default(),
//!     Handlers::new().on_change(|snapshot| println!("factor is now {}", snapshot.factor)),
//! )?;
//!
//! // Called once per frame with a millisecond timestamp
//! monitor.tick(0.0);
//! monitor.tick(16.7);
//! assert_eq!(monitor.frames(), 2);
//! # Ok::<(), adaptive_perf_monitor::ConfigError>(())
//! ```

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod control;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod monitor;
pub mod sampling;
pub mod subscribers;

pub use classify::{Bounds, BoundsClassifier, Classification};
pub use config::{Config, ConfigManager, HostConfig, LogConfig, MonitorConfig};
pub use control::MonitorState;
pub use error::{ConfigError, HostError, ListenerError, LoggingError};
pub use metrics::{MetricsCollector, MetricsResponse};
pub use monitor::{Monitor, MonitorSnapshot, TickReport};
pub use subscribers::{
    Handlers, ListenerFailure, ListenerOrigin, MonitorEvent, PerformanceListener,
    SubscriptionHandle,
};
