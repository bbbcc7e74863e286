use serde::{Deserialize, Serialize};

/// `normalized` reported when the history has no spread (min == max or empty).
pub const NORMALIZED_FALLBACK: f64 = 0.5;

/// Descriptive statistics over one analyzer's bounded history.
///
/// Produced by the statistics tracker on every push. All fields are finite.
/// `variance` is the population variance.
///
/// # Example
/// ```
/// use sx_core::stats::Statistics;
/// let s = Statistics::default();
/// assert_eq!(s.mean, 0.0);
/// assert_eq!(s.normalized, 0.5);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    /// Most recently pushed value.
    pub current: f64,
    /// Arithmetic mean of the history.
    pub mean: f64,
    /// Median of the history (mean of the two middle values for even lengths).
    pub median: f64,
    /// Smallest value in the history.
    pub min: f64,
    /// Largest value in the history.
    pub max: f64,
    /// Population variance, never negative.
    pub variance: f64,
    /// Square root of `variance`.
    pub standard_deviation: f64,
    /// `(current - mean) / standard_deviation`, 0 without spread.
    pub z_score: f64,
    /// `(current - min) / (max - min)` in [0, 1], 0.5 without spread.
    pub normalized: f64,
}

impl Statistics {
    /// Statistics over an empty history.
    pub const EMPTY: Statistics = Statistics {
        current: 0.0,
        mean: 0.0,
        median: 0.0,
        min: 0.0,
        max: 0.0,
        variance: 0.0,
        standard_deviation: 0.0,
        z_score: 0.0,
        normalized: NORMALIZED_FALLBACK,
    };

    /// Named fields in uniform-suffix order, paired with their value.
    ///
    /// `current` is omitted: it is exposed as the bare feature name.
    #[must_use]
    pub fn named_fields(&self) -> [(&'static str, f64); 8] {
        [
            ("Normalized", self.normalized),
            ("Mean", self.mean),
            ("Median", self.median),
            ("StandardDeviation", self.standard_deviation),
            ("Variance", self.variance),
            ("ZScore", self.z_score),
            ("Min", self.min),
            ("Max", self.max),
        ]
    }

    /// `true` if no field is NaN or infinite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.current.is_finite() && self.named_fields().iter().all(|(_, v)| v.is_finite())
    }
}

impl Default for Statistics {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_finite_with_fallback_normalized() {
        let s = Statistics::EMPTY;
        assert!(s.is_finite());
        assert!((s.normalized - NORMALIZED_FALLBACK).abs() < f64::EPSILON);
    }

    #[test]
    fn nan_field_is_detected() {
        let s = Statistics {
            variance: f64::NAN,
            ..Statistics::EMPTY
        };
        assert!(!s.is_finite());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_string(&Statistics::EMPTY).unwrap_or_default();
        assert!(json.contains("\"standardDeviation\""));
        assert!(json.contains("\"zScore\""));
    }
}
