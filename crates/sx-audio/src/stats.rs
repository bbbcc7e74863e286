use std::collections::VecDeque;

use sx_core::stats::{NORMALIZED_FALLBACK, Statistics};

/// Rolling statistics over a bounded FIFO history of scalars.
///
/// One tracker per analyzer unit; never shared. Every derived field is a pure
/// function of the current history.
///
/// # Example
/// ```
/// use sx_audio::stats::StatsTracker;
/// let mut tracker = StatsTracker::new(3);
/// for v in [1.0, 2.0, 3.0, 4.0] {
///     tracker.push(v);
/// }
/// assert_eq!(tracker.history(), vec![2.0, 3.0, 4.0]);
/// ```
#[derive(Clone, Debug)]
pub struct StatsTracker {
    history: VecDeque<f64>,
    capacity: usize,
    /// Reused for median selection.
    scratch: Vec<f64>,
}

impl StatsTracker {
    /// Create a tracker retaining up to `capacity` values (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            scratch: Vec::with_capacity(capacity),
        }
    }

    /// Append `value`, evicting the oldest entry when full, and return the
    /// statistics over the updated history.
    ///
    /// Non-finite values are not recorded.
    pub fn push(&mut self, value: f64) -> Statistics {
        if !value.is_finite() {
            log::warn!("Ignoring non-finite value pushed to statistics tracker");
            return self.statistics();
        }
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(value);
        self.statistics()
    }

    /// Forget every recorded value.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Change the capacity. Shrinking keeps the newest `capacity` values.
    pub fn reconfigure(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        if self.history.len() > capacity {
            self.history.drain(..self.history.len() - capacity);
        }
        self.capacity = capacity;
    }

    /// Statistics over the current history; [`Statistics::EMPTY`] when empty.
    pub fn statistics(&mut self) -> Statistics {
        let Some(&current) = self.history.back() else {
            return Statistics::EMPTY;
        };
        let n = self.history.len() as f64;

        let (min, max) = self
            .history
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        let mean = if max > min {
            (self.history.iter().sum::<f64>() / n).clamp(min, max)
        } else {
            min
        };
        // two-pass; exact zero when every value is identical
        let variance = if max > min {
            self.history.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
        } else {
            0.0
        };
        let standard_deviation = variance.sqrt();

        Statistics {
            current,
            mean,
            median: self.median(),
            min,
            max,
            variance,
            standard_deviation,
            z_score: if standard_deviation > 0.0 {
                (current - mean) / standard_deviation
            } else {
                0.0
            },
            normalized: if max > min {
                ((current - min) / (max - min)).clamp(0.0, 1.0)
            } else {
                NORMALIZED_FALLBACK
            },
        }
    }

    fn median(&mut self) -> f64 {
        self.scratch.clear();
        self.scratch.extend(self.history.iter().copied());
        let len = self.scratch.len();
        if len == 0 {
            return 0.0;
        }
        let mid = len / 2;
        let (lower, upper, _) = self.scratch.select_nth_unstable_by(mid, f64::total_cmp);
        let upper = *upper;
        if len % 2 == 1 {
            upper
        } else {
            let lower = lower.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (lower + upper) / 2.0
        }
    }

    /// Copy of the raw history, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<f64> {
        self.history.iter().copied().collect()
    }

    /// Number of recorded values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// `true` if nothing has been recorded since creation or the last reset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Maximum number of values retained.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
