//! Rolling buffer of completed sample windows ("iterations").

/// Default number of iterations collected before each classification.
pub const DEFAULT_ITERATIONS: usize = 10;

/// Largest batch size accepted from configuration.
pub const MAX_ITERATIONS: usize = 10_000;

/// Collects a fixed number of fps readings before they are classified.
///
/// Readings are written at `index mod capacity`; the write cursor keeps
/// counting across batches.
#[derive(Debug, Clone)]
pub struct IterationAggregator {
    averages: Vec<f64>,
    capacity: usize,
    index: u64,
}

impl IterationAggregator {
    /// Create an empty aggregator holding up to `capacity` readings.
    pub fn new(capacity: usize) -> Self {
        Self {
            averages: Vec::new(),
            capacity,
            index: 0,
        }
    }

    /// Store one fps reading. Returns `true` once the batch is full.
    pub fn push(&mut self, fps: f64) -> bool {
        if self.capacity == 0 {
            return false;
        }

        let slot = (self.index % self.capacity as u64) as usize;
        self.index += 1;

        match self.averages.get_mut(slot) {
            Some(existing) => *existing = fps,
            None => self.averages.push(fps),
        }

        self.is_full()
    }

    /// Check if the batch holds exactly `capacity` readings.
    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.averages.len() >= self.capacity
    }

    /// Drain the current batch, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<f64> {
        std::mem::take(&mut self.averages)
    }

    /// Readings of the in-progress batch.
    pub fn values(&self) -> &[f64] {
        &self.averages
    }

    pub fn len(&self) -> usize {
        self.averages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.averages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of readings ever written.
    pub fn index(&self) -> u64 {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fills_then_drains() {
        let mut aggregator = IterationAggregator::new(3);

        assert!(!aggregator.push(60.0));
        assert!(!aggregator.push(61.0));
        assert!(aggregator.push(62.0));
        assert_eq!(aggregator.values(), &[60.0, 61.0, 62.0]);

        let batch = aggregator.take();
        assert_eq!(batch, vec![60.0, 61.0, 62.0]);
        assert!(aggregator.is_empty());
        assert_eq!(aggregator.index(), 3);
    }

    #[test]
    fn test_cursor_wraps_without_drain() {
        let mut aggregator = IterationAggregator::new(2);
        aggregator.push(1.0);
        aggregator.push(2.0);
        aggregator.push(3.0);

        // Third reading overwrites slot 0
        assert_eq!(aggregator.values(), &[3.0, 2.0]);
        assert_eq!(aggregator.len(), 2);
    }

    #[test]
    fn test_huge_capacity_allocates_lazily() {
        let mut aggregator = IterationAggregator::new(usize::MAX);
        assert!(!aggregator.push(60.0));
        assert_eq!(aggregator.len(), 1);
        assert_eq!(aggregator.take(), vec![60.0]);
        assert!(aggregator.is_empty());
    }

    #[test]
    fn test_zero_capacity_never_fills() {
        let mut aggregator = IterationAggregator::new(0);
        assert!(!aggregator.push(60.0));
        assert!(aggregator.is_empty());
        assert!(!aggregator.is_full());
    }

    // The batch never holds more than `capacity` readings, and draining on
    // every full batch yields batches of exactly `capacity` readings in order.
    proptest! {
        #[test]
        fn prop_batches_are_exactly_capacity(
            capacity in 1usize..=16usize,
            readings in prop::collection::vec(0.0f64..240.0f64, 0..200),
        ) {
            let mut aggregator = IterationAggregator::new(capacity);
            let mut batches = Vec::new();

            for fps in readings.iter() {
                if aggregator.push(*fps) {
                    batches.push(aggregator.take());
                }
                prop_assert!(aggregator.len() < capacity);
            }

            prop_assert_eq!(batches.len(), readings.len() / capacity);
            for (i, batch) in batches.iter().enumerate() {
                prop_assert_eq!(batch.as_slice(), &readings[i * capacity..(i + 1) * capacity]);
            }
            prop_assert_eq!(aggregator.index(), readings.len() as u64);
        }
    }
}
