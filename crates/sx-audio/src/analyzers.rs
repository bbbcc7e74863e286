//! Scalar feature extraction from magnitude spectra.
//!
//! Each `fn` here is a pure reduction over one spectrum; [`SpectralAnalyzer`]
//! and [`FluxAnalyzer`] wrap them behind [`FeatureAnalyzer`] so they can be
//! moved into analyzer units.

use sx_core::error::AnalysisError;
use sx_core::feature::FeatureKind;
use sx_core::frame::FftFrame;
use sx_core::traits::FeatureAnalyzer;

/// Frequency range (Hz, half-open) of the bass band.
pub const BASS_HZ: (f64, f64) = (20.0, 250.0);
/// Frequency range (Hz, half-open) of the mids band.
pub const MIDS_HZ: (f64, f64) = (250.0, 4000.0);
/// Frequency range (Hz, half-open) of the treble band.
pub const TREBLE_HZ: (f64, f64) = (4000.0, 20000.0);

/// Fraction of total magnitude below the rolloff point.
const ROLLOFF_FRACTION: f64 = 0.85;

/// Mean power per bin.
///
/// # Example
/// ```
/// use sx_audio::analyzers::energy;
/// assert_eq!(energy(&[0.0; 8]), 0.0);
/// assert!((energy(&[1.0, 1.0]) - 1.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn energy(bins: &[f32]) -> f64 {
    if bins.is_empty() {
        return 0.0;
    }
    bins.iter().map(|&a| f64::from(a) * f64::from(a)).sum::<f64>() / bins.len() as f64
}

/// Mean magnitude of the bins whose centre frequency lies in `[low_hz, high_hz)`.
#[must_use]
pub fn band_mean(bins: &[f32], bin_hz: f64, low_hz: f64, high_hz: f64) -> f64 {
    if bin_hz <= 0.0 {
        return 0.0;
    }
    let (sum, count) = bins
        .iter()
        .enumerate()
        .filter(|(k, _)| {
            let centre = *k as f64 * bin_hz;
            centre >= low_hz && centre < high_hz
        })
        .fold((0.0, 0usize), |(s, c), (_, &a)| (s + f64::from(a), c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// First and second raw moments of the bin index weighted by magnitude.
fn index_moments(bins: &[f32]) -> Option<(f64, f64)> {
    let total: f64 = bins.iter().map(|&a| f64::from(a)).sum();
    if total <= 0.0 {
        return None;
    }
    let (m1, m2) = bins.iter().enumerate().fold((0.0, 0.0), |(m1, m2), (k, &a)| {
        let k = k as f64;
        let a = f64::from(a);
        (m1 + k * a, m2 + k * k * a)
    });
    Some((m1 / total, m2 / total))
}

/// Magnitude-weighted mean bin index.
///
/// # Example
/// ```
/// use sx_audio::analyzers::centroid;
/// let mut bins = vec![0.0; 32];
/// bins[10] = 0.7;
/// assert!((centroid(&bins) - 10.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn centroid(bins: &[f32]) -> f64 {
    index_moments(bins).map_or(0.0, |(m1, _)| m1)
}

/// Magnitude-weighted standard deviation of the bin index.
#[must_use]
pub fn spread(bins: &[f32]) -> f64 {
    index_moments(bins).map_or(0.0, |(m1, m2)| (m2 - m1 * m1).max(0.0).sqrt())
}

/// Relative position below which 85% of the total magnitude lies.
#[must_use]
pub fn rolloff(bins: &[f32]) -> f64 {
    let total: f64 = bins.iter().map(|&a| f64::from(a)).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let threshold = ROLLOFF_FRACTION * total;
    let mut cumulative = 0.0;
    for (k, &a) in bins.iter().enumerate() {
        cumulative += f64::from(a);
        if cumulative >= threshold {
            return k as f64 / bins.len() as f64;
        }
    }
    // rounding kept the sum just under the threshold
    (bins.len() - 1) as f64 / bins.len() as f64
}

/// Total absolute difference between neighbouring bins.
#[must_use]
pub fn roughness(bins: &[f32]) -> f64 {
    bins.windows(2)
        .map(|w| (f64::from(w[1]) - f64::from(w[0])).abs())
        .sum()
}

/// Mean, variance, third and fourth central moments of the magnitude values.
/// `None` when the values have no spread.
fn central_moments(bins: &[f32]) -> Option<(f64, f64, f64)> {
    if bins.is_empty() {
        return None;
    }
    let (min, max) = bins
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &a| {
            (lo.min(a), hi.max(a))
        });
    if max <= min {
        return None;
    }
    let n = bins.len() as f64;
    let mean = bins.iter().map(|&a| f64::from(a)).sum::<f64>() / n;
    let (m2, m3, m4) = bins.iter().fold((0.0, 0.0, 0.0), |(m2, m3, m4), &a| {
        let d = f64::from(a) - mean;
        let d2 = d * d;
        (m2 + d2, m3 + d2 * d, m4 + d2 * d2)
    });
    let variance = m2 / n;
    if variance <= 0.0 {
        return None;
    }
    Some((variance, m3 / n, m4 / n))
}

/// Excess kurtosis of the magnitude distribution.
#[must_use]
pub fn kurtosis(bins: &[f32]) -> f64 {
    central_moments(bins).map_or(0.0, |(var, _, m4)| m4 / (var * var) - 3.0)
}

/// Skewness of the magnitude distribution.
#[must_use]
pub fn skew(bins: &[f32]) -> f64 {
    central_moments(bins).map_or(0.0, |(var, m3, _)| m3 / (var * var.sqrt()))
}

/// Shannon entropy of the normalised power distribution, scaled to `[0, 1]`.
///
/// # Example
/// ```
/// use sx_audio::analyzers::entropy;
/// assert!((entropy(&[0.5; 64]) - 1.0).abs() < 1e-9);
/// assert_eq!(entropy(&[0.0; 64]), 0.0);
/// ```
#[must_use]
pub fn entropy(bins: &[f32]) -> f64 {
    if bins.len() < 2 {
        return 0.0;
    }
    let total: f64 = bins.iter().map(|&a| f64::from(a) * f64::from(a)).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let h: f64 = bins
        .iter()
        .map(|&a| f64::from(a) * f64::from(a) / total)
        .filter(|&p| p > 0.0)
        .map(|p| -p * p.ln())
        .sum();
    h / (bins.len() as f64).ln()
}

/// Peak magnitude relative to the total.
#[must_use]
pub fn crest(bins: &[f32]) -> f64 {
    let total: f64 = bins.iter().map(|&a| f64::from(a)).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let peak = bins.iter().copied().fold(0.0f32, f32::max);
    f64::from(peak) / total
}

/// Sum of positive magnitude changes from `previous` to `bins`.
/// Lengths must match; extra bins on either side are ignored.
#[must_use]
pub fn flux(previous: &[f32], bins: &[f32]) -> f64 {
    previous
        .iter()
        .zip(bins)
        .map(|(&p, &a)| (f64::from(a) - f64::from(p)).max(0.0))
        .sum()
}

fn finite(kind: FeatureKind, value: f64) -> Result<f64, AnalysisError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AnalysisError::NonFinite { kind })
    }
}

/// Stateless analyzer for every kind except [`FeatureKind::SpectralFlux`].
#[derive(Clone, Copy, Debug)]
pub struct SpectralAnalyzer {
    kind: FeatureKind,
}

impl SpectralAnalyzer {
    /// Analyzer for `kind`.
    #[must_use]
    pub fn new(kind: FeatureKind) -> Self {
        Self { kind }
    }
}

impl FeatureAnalyzer for SpectralAnalyzer {
    fn kind(&self) -> FeatureKind {
        self.kind
    }

    fn compute(&mut self, frame: &FftFrame) -> Result<f64, AnalysisError> {
        let bins = frame.bins();
        let value = match self.kind {
            FeatureKind::Energy => energy(bins),
            FeatureKind::Bass => band_mean(bins, frame.bin_hz(), BASS_HZ.0, BASS_HZ.1),
            FeatureKind::Mids => band_mean(bins, frame.bin_hz(), MIDS_HZ.0, MIDS_HZ.1),
            FeatureKind::Treble => band_mean(bins, frame.bin_hz(), TREBLE_HZ.0, TREBLE_HZ.1),
            FeatureKind::SpectralCentroid => centroid(bins),
            FeatureKind::SpectralSpread => spread(bins),
            FeatureKind::SpectralRolloff => rolloff(bins),
            FeatureKind::SpectralRoughness => roughness(bins),
            FeatureKind::SpectralKurtosis => kurtosis(bins),
            FeatureKind::SpectralEntropy => entropy(bins),
            FeatureKind::SpectralCrest => crest(bins),
            FeatureKind::SpectralSkew => skew(bins),
            // built through analyzer_for; a stateless flux has nothing to compare with
            FeatureKind::SpectralFlux => 0.0,
        };
        finite(self.kind, value)
    }
}

/// Spectral flux. Keeps the previous frame's magnitudes.
#[derive(Clone, Debug, Default)]
pub struct FluxAnalyzer {
    previous: Option<Vec<f32>>,
}

impl FluxAnalyzer {
    /// Analyzer with no previous frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeatureAnalyzer for FluxAnalyzer {
    fn kind(&self) -> FeatureKind {
        FeatureKind::SpectralFlux
    }

    fn compute(&mut self, frame: &FftFrame) -> Result<f64, AnalysisError> {
        let bins = frame.bins();
        let value = match &self.previous {
            Some(prev) if prev.len() == bins.len() => flux(prev, bins),
            _ => FeatureKind::SpectralFlux.default_value(),
        };
        let value = finite(FeatureKind::SpectralFlux, value)?;
        match &mut self.previous {
            Some(prev) => {
                prev.clear();
                prev.extend_from_slice(bins);
            }
            None => self.previous = Some(bins.to_vec()),
        }
        Ok(value)
    }

    fn reset(&mut self) {
        self.previous = None;
    }
}

/// Build the default analyzer for `kind`.
///
/// # Example
/// ```
/// use sx_audio::analyzers::analyzer_for;
/// use sx_core::feature::FeatureKind;
/// use sx_core::frame::FftFrame;
///
/// let mut a = analyzer_for(FeatureKind::Energy);
/// let frame = FftFrame::new(vec![0.0; 1025], 44100);
/// assert_eq!(a.compute(&frame).ok(), Some(0.0));
/// ```
#[must_use]
pub fn analyzer_for(kind: FeatureKind) -> Box<dyn FeatureAnalyzer> {
    if kind.is_temporal() {
        Box::new(FluxAnalyzer::new())
    } else {
        Box::new(SpectralAnalyzer::new(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 44_100;
    const BINS: usize = 1025;

    fn bin_for(frame: &FftFrame, hz: f64) -> usize {
        (hz / frame.bin_hz()).round() as usize
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn silence_yields_defaults_for_every_kind() {
        let frame = FftFrame::new(vec![0.0; BINS], SR);
        for kind in FeatureKind::ALL {
            let mut analyzer = analyzer_for(kind);
            assert_eq!(analyzer.kind(), kind);
            for _ in 0..2 {
                let value = analyzer.compute(&frame).unwrap();
                assert_eq!(value, kind.default_value(), "{kind}");
            }
        }
    }

    #[test]
    fn high_bin_moves_treble_only() {
        let silent = FftFrame::new(vec![0.0; BINS], SR);
        let mut bins = vec![0.0; BINS];
        bins[bin_for(&silent, 10_000.0)] = 1.0;
        let loud = FftFrame::new(bins, SR);

        let mut bass = analyzer_for(FeatureKind::Bass);
        let mut mids = analyzer_for(FeatureKind::Mids);
        let mut treble = analyzer_for(FeatureKind::Treble);
        assert_eq!(bass.compute(&loud).unwrap(), 0.0);
        assert_eq!(mids.compute(&loud).unwrap(), 0.0);
        assert!(treble.compute(&loud).unwrap() > 0.0);
    }

    #[test]
    fn band_edges_are_half_open() {
        // 10 Hz per bin: bin 25 sits exactly on 250 Hz and belongs to mids
        let mut bins = vec![0.0; 101];
        bins[25] = 1.0;
        assert_eq!(band_mean(&bins, 10.0, BASS_HZ.0, BASS_HZ.1), 0.0);
        assert!(band_mean(&bins, 10.0, MIDS_HZ.0, MIDS_HZ.1) > 0.0);
    }

    #[test]
    fn single_peak_shape_statistics() {
        let mut bins = vec![0.0; 64];
        bins[16] = 2.0;
        assert!(close(centroid(&bins), 16.0));
        assert!(close(spread(&bins), 0.0));
        assert!(close(rolloff(&bins), 16.0 / 64.0));
        assert!(close(roughness(&bins), 4.0));
        assert!(close(crest(&bins), 1.0));
        assert!(close(entropy(&bins), 0.0));
        assert!(skew(&bins) > 0.0);
        assert!(kurtosis(&bins) > 0.0);
    }

    #[test]
    fn flat_spectrum_statistics() {
        let bins = vec![0.25; 100];
        assert!(close(entropy(&bins), 1.0));
        assert!(close(crest(&bins), 0.01));
        assert_eq!(skew(&bins), 0.0);
        assert_eq!(kurtosis(&bins), 0.0);
        assert_eq!(roughness(&bins), 0.0);
        assert!(close(energy(&bins), 0.0625));
    }

    #[test]
    fn symmetric_two_level_spectrum_has_no_skew() {
        let bins: Vec<f32> = (0..10).map(|i| if i % 2 == 0 { 0.0 } else { 1.0 }).collect();
        assert!(close(skew(&bins), 0.0));
        assert!(close(kurtosis(&bins), -2.0));
    }

    #[test]
    fn flux_tracks_positive_change() {
        let mut flux = FluxAnalyzer::new();
        let quiet = FftFrame::new(vec![0.25; 8], SR);
        let loud = FftFrame::new(vec![0.75; 8], SR);

        assert_eq!(flux.compute(&quiet).unwrap(), 0.0);
        assert!(close(flux.compute(&loud).unwrap(), 4.0));
        // decreasing magnitudes contribute nothing
        assert_eq!(flux.compute(&quiet).unwrap(), 0.0);
        // nor does an unchanged frame
        assert_eq!(flux.compute(&quiet).unwrap(), 0.0);
    }

    #[test]
    fn flux_reseeds_on_length_change_and_reset() {
        let mut flux = FluxAnalyzer::new();
        flux.compute(&FftFrame::new(vec![0.0; 8], SR)).unwrap();
        assert_eq!(flux.compute(&FftFrame::new(vec![1.0; 16], SR)).unwrap(), 0.0);
        assert!(close(flux.compute(&FftFrame::new(vec![2.0; 16], SR)).unwrap(), 16.0));

        flux.reset();
        assert_eq!(flux.compute(&FftFrame::new(vec![5.0; 16], SR)).unwrap(), 0.0);
    }

    #[test]
    fn overflow_is_reported() {
        let mut roughness = SpectralAnalyzer::new(FeatureKind::SpectralRoughness);
        let inf = FftFrame::new(vec![0.0, f32::INFINITY], SR);
        assert_eq!(
            roughness.compute(&inf),
            Err(AnalysisError::NonFinite {
                kind: FeatureKind::SpectralRoughness
            })
        );
    }
}
