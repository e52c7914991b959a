//! Classification of a full batch of iterations into incline or decline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Default fraction of iterations that must sit outside a bound.
pub const DEFAULT_THRESHOLD: f64 = 0.75;

type BoundsFn = dyn Fn(f64) -> (f64, f64) + Send + Sync;

/// Maps the estimated refresh rate to a `(lower, upper)` fps threshold pair.
///
/// Bounds are evaluated fresh on every classification, so thresholds follow
/// the refresh rate estimate as it rises.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Bounds {
    /// `[60, 100]` above 100Hz, `[40, 60]` otherwise.
    #[default]
    Tiered,
    /// Same thresholds for every refresh rate.
    Fixed { lower: f64, upper: f64 },
    /// Arbitrary mapping supplied in code.
    #[serde(skip)]
    Custom(Arc<BoundsFn>),
}

impl Bounds {
    /// Wrap a closure as custom bounds.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(f64) -> (f64, f64) + Send + Sync + 'static,
    {
        Bounds::Custom(Arc::new(f))
    }

    /// Resolve the `(lower, upper)` pair for a refresh rate estimate.
    pub fn resolve(&self, refreshrate: f64) -> (f64, f64) {
        match self {
            Bounds::Tiered => tiered_bounds(refreshrate),
            Bounds::Fixed { lower, upper } => (*lower, *upper),
            Bounds::Custom(f) => f(refreshrate),
        }
    }
}

impl fmt::Debug for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bounds::Tiered => write!(f, "Tiered"),
            Bounds::Fixed { lower, upper } => f
                .debug_struct("Fixed")
                .field("lower", lower)
                .field("upper", upper)
                .finish(),
            Bounds::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl PartialEq for Bounds {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Bounds::Tiered, Bounds::Tiered) => true,
            (
                Bounds::Fixed { lower, upper },
                Bounds::Fixed {
                    lower: other_lower,
                    upper: other_upper,
                },
            ) => lower == other_lower && upper == other_upper,
            (Bounds::Custom(a), Bounds::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Default bounds: high refresh displays get a higher bar.
pub fn tiered_bounds(refreshrate: f64) -> (f64, f64) {
    if refreshrate > 100.0 {
        (60.0, 100.0)
    } else {
        (40.0, 60.0)
    }
}

/// Result of classifying one full batch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Classification {
    /// Bounds in effect for this batch.
    pub lower: f64,
    pub upper: f64,
    /// Readings at or above `upper`.
    pub upper_count: usize,
    /// Readings strictly below `lower`.
    pub lower_count: usize,
    /// Sustained high throughput.
    pub incline: bool,
    /// Sustained low throughput.
    pub decline: bool,
}

/// Decides whether a full batch shows sustained high or low throughput.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundsClassifier {
    bounds: Bounds,
    threshold: f64,
}

impl BoundsClassifier {
    pub fn new(bounds: Bounds, threshold: f64) -> Self {
        Self { bounds, threshold }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Classify a batch of `iterations` readings against the bounds for
    /// `refreshrate`.
    ///
    /// A transition needs strictly more than `iterations * threshold`
    /// readings outside the bound; a tie triggers nothing. Incline and
    /// decline are evaluated independently.
    pub fn classify(&self, refreshrate: f64, samples: &[f64]) -> Classification {
        let (lower, upper) = self.bounds.resolve(refreshrate);
        let required = samples.len() as f64 * self.threshold;

        let upper_count = samples.iter().filter(|&&fps| fps >= upper).count();
        let lower_count = samples.iter().filter(|&&fps| fps < lower).count();

        let classification = Classification {
            lower,
            upper,
            upper_count,
            lower_count,
            incline: upper_count as f64 > required,
            decline: lower_count as f64 > required,
        };

        debug!(
            refreshrate,
            lower,
            upper,
            upper_count,
            lower_count,
            incline = classification.incline,
            decline = classification.decline,
            "Classified iteration batch"
        );

        classification
    }
}
