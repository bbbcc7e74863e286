use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One scalar feature stream. Each kind is served by exactly one analyzer unit.
///
/// The serialized name is the camelCase feature name exposed to renderers.
///
/// # Example
/// ```
/// use sx_core::feature::FeatureKind;
/// let kind: FeatureKind = "spectralFlux".parse().unwrap();
/// assert_eq!(kind, FeatureKind::SpectralFlux);
/// assert_eq!(kind.as_str(), "spectralFlux");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureKind {
    /// Mean power over the whole spectrum.
    Energy,
    /// Mean magnitude, 20–250 Hz.
    Bass,
    /// Mean magnitude, 250–4000 Hz.
    Mids,
    /// Mean magnitude, 4000–20000 Hz.
    Treble,
    /// Magnitude-weighted mean bin index.
    SpectralCentroid,
    /// Magnitude-weighted deviation around the centroid.
    SpectralSpread,
    /// Normalized bin below which 85% of the magnitude lies.
    SpectralRolloff,
    /// Summed magnitude difference between adjacent bins.
    SpectralRoughness,
    /// Excess kurtosis of the magnitude values.
    SpectralKurtosis,
    /// Normalized Shannon entropy of the power distribution.
    SpectralEntropy,
    /// Peak magnitude over summed magnitude.
    SpectralCrest,
    /// Skewness of the magnitude values.
    SpectralSkew,
    /// Positive magnitude change since the previous frame.
    SpectralFlux,
}

impl FeatureKind {
    /// Every kind, in canonical order.
    pub const ALL: [FeatureKind; 13] = [
        FeatureKind::Energy,
        FeatureKind::Bass,
        FeatureKind::Mids,
        FeatureKind::Treble,
        FeatureKind::SpectralCentroid,
        FeatureKind::SpectralSpread,
        FeatureKind::SpectralRolloff,
        FeatureKind::SpectralRoughness,
        FeatureKind::SpectralKurtosis,
        FeatureKind::SpectralEntropy,
        FeatureKind::SpectralCrest,
        FeatureKind::SpectralSkew,
        FeatureKind::SpectralFlux,
    ];

    /// Feature name as seen by renderers.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureKind::Energy => "energy",
            FeatureKind::Bass => "bass",
            FeatureKind::Mids => "mids",
            FeatureKind::Treble => "treble",
            FeatureKind::SpectralCentroid => "spectralCentroid",
            FeatureKind::SpectralSpread => "spectralSpread",
            FeatureKind::SpectralRolloff => "spectralRolloff",
            FeatureKind::SpectralRoughness => "spectralRoughness",
            FeatureKind::SpectralKurtosis => "spectralKurtosis",
            FeatureKind::SpectralEntropy => "spectralEntropy",
            FeatureKind::SpectralCrest => "spectralCrest",
            FeatureKind::SpectralSkew => "spectralSkew",
            FeatureKind::SpectralFlux => "spectralFlux",
        }
    }

    /// Scalar reported for silent, empty or malformed input.
    #[must_use]
    pub fn default_value(self) -> f64 {
        0.0
    }

    /// `true` for analyzers that keep the previous frame as private state.
    #[must_use]
    pub fn is_temporal(self) -> bool {
        matches!(self, FeatureKind::SpectralFlux)
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| CoreError::UnknownFeature { name: s.to_string() })
    }
}
