use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::feature::FeatureKind;
use crate::stats::Statistics;

/// Identifier of one rendering frame's round of requests and responses.
///
/// Strictly increasing per aggregator. Responses carrying any other id than
/// the open frame's are discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CorrelationId(pub u64);

impl CorrelationId {
    /// The id following this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One spectral snapshot: non-negative magnitudes plus the sample rate they
/// were computed at. Immutable once built; shared between units behind an `Arc`.
///
/// # Example
/// ```
/// use sx_core::frame::FftFrame;
/// let frame = FftFrame::new(vec![0.0; 1025], 44100);
/// assert_eq!(frame.len(), 1025);
/// assert!((frame.bin_hz() - 44100.0 / 2048.0).abs() < 1e-9);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct FftFrame {
    bins: Vec<f32>,
    sample_rate: u32,
}

impl FftFrame {
    /// Wrap a magnitude spectrum (N/2 + 1 bins for an N-point real FFT).
    #[must_use]
    pub fn new(bins: Vec<f32>, sample_rate: u32) -> Self {
        Self { bins, sample_rate }
    }

    /// Magnitudes, DC first.
    #[must_use]
    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    /// Number of bins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// `true` if the frame has no bins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Sample rate of the analysed signal.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Width of one bin in Hz. The last bin sits on Nyquist.
    #[must_use]
    pub fn bin_hz(&self) -> f64 {
        if self.bins.len() < 2 {
            return 0.0;
        }
        f64::from(self.sample_rate) / ((self.bins.len() - 1) * 2) as f64
    }

    /// `true` if every magnitude is finite and the length matches `expected`.
    #[must_use]
    pub fn is_well_formed(&self, expected: usize) -> bool {
        self.bins.len() == expected && self.bins.iter().all(|m| m.is_finite())
    }
}

/// One feature's value for a frame, with the statistics of its stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct FeatureSample {
    /// Instantaneous scalar.
    pub value: f64,
    /// Rolling statistics including `value`.
    pub stats: Statistics,
}

impl FeatureSample {
    /// Sample reported for a kind that has never produced a value.
    #[must_use]
    pub fn default_for(kind: FeatureKind) -> Self {
        Self {
            value: kind.default_value(),
            stats: Statistics::EMPTY,
        }
    }
}

/// Feature name → value, produced once per aggregation cycle.
///
/// # Example
/// ```
/// use sx_core::feature::FeatureKind;
/// use sx_core::frame::{FeatureSample, FeatureVector};
///
/// let mut v = FeatureVector::default();
/// v.insert(FeatureKind::Bass, FeatureSample { value: 0.25, ..Default::default() });
/// assert_eq!(v.get("bass"), Some(0.25));
/// assert_eq!(v.uniforms()["bassNormalized"], 0.5);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureVector {
    samples: BTreeMap<FeatureKind, FeatureSample>,
}

impl FeatureVector {
    /// Record (or overwrite) one feature.
    pub fn insert(&mut self, kind: FeatureKind, sample: FeatureSample) {
        self.samples.insert(kind, sample);
    }

    /// Value by feature name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        let kind: FeatureKind = name.parse().ok()?;
        self.value(kind)
    }

    /// Value by kind.
    #[must_use]
    pub fn value(&self, kind: FeatureKind) -> Option<f64> {
        self.samples.get(&kind).map(|s| s.value)
    }

    /// Full sample (value + statistics) by kind.
    #[must_use]
    pub fn sample(&self, kind: FeatureKind) -> Option<&FeatureSample> {
        self.samples.get(&kind)
    }

    /// `true` if `kind` has an entry.
    #[must_use]
    pub fn contains(&self, kind: FeatureKind) -> bool {
        self.samples.contains_key(&kind)
    }

    /// Number of features present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// `true` if no feature is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterate in canonical kind order.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureKind, &FeatureSample)> {
        self.samples.iter().map(|(k, s)| (*k, s))
    }

    /// Flatten into shader-uniform names: `bass`, `bassNormalized`,
    /// `bassMean`, ... one entry per statistic per feature.
    #[must_use]
    pub fn uniforms(&self) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        for (kind, sample) in self.iter() {
            let name = kind.as_str();
            out.insert(name.to_string(), sample.value);
            for (suffix, v) in sample.stats.named_fields() {
                out.insert(format!("{name}{suffix}"), v);
            }
        }
        out
    }
}

/// How a frame closed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum FrameStatus {
    /// Every configured kind answered before the deadline.
    Complete,
    /// The deadline elapsed; `missing` kinds were carried forward.
    Partial {
        /// Kinds whose value was carried forward.
        missing: Vec<FeatureKind>,
    },
}

/// Finalized output of one aggregation cycle.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameReport {
    /// The frame this vector belongs to.
    pub id: CorrelationId,
    /// Complete or partial.
    #[serde(flatten)]
    pub status: FrameStatus,
    /// Full-shaped vector: one entry per configured kind.
    pub vector: FeatureVector,
}

impl FrameReport {
    /// `true` if no value had to be carried forward.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self.status, FrameStatus::Complete)
    }
}
