//! Amplitude tapers applied to a sample block before the FFT.

use sx_core::config::{DEFAULT_KAISER_BETA, MAX_KAISER_BETA, PipelineConfig, WindowMode};

/// Relative convergence threshold for the I0 power series.
const I0_TOLERANCE: f64 = 1e-6;
/// Hard stop for the series; convergence happens long before for β ≤ 40.
const I0_MAX_TERMS: u32 = 500;

/// Window taper with precomputable coefficients.
///
/// # Example
/// ```
/// use sx_audio::window::WindowKind;
/// let w = WindowKind::Kaiser { beta: 5.658 }.coefficients(5);
/// assert!((w[2] - 1.0).abs() < 1e-6);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WindowKind {
    /// No taper.
    Rectangular,
    /// Raised cosine.
    Hann,
    /// Kaiser–Bessel.
    Kaiser {
        /// Shape: larger β lowers side lobes and widens the main lobe.
        /// Used clamped to `0..=MAX_KAISER_BETA`.
        beta: f64,
    },
}

impl WindowKind {
    /// Window selected by a pipeline configuration.
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        match config.window {
            WindowMode::Rectangular => WindowKind::Rectangular,
            WindowMode::Hann => WindowKind::Hann,
            WindowMode::Kaiser => WindowKind::Kaiser {
                beta: config.kaiser_beta,
            },
        }
    }

    /// Weights for a block of `len` samples. A single-sample window is `[1.0]`.
    #[must_use]
    pub fn coefficients(self, len: usize) -> Vec<f32> {
        if len <= 1 {
            return vec![1.0; len];
        }
        match self {
            WindowKind::Rectangular => vec![1.0; len],
            WindowKind::Hann => {
                let denom = (len - 1) as f64;
                (0..len)
                    .map(|n| {
                        (0.5 - 0.5 * (std::f64::consts::TAU * n as f64 / denom).cos()) as f32
                    })
                    .collect()
            }
            WindowKind::Kaiser { beta } => {
                let beta = kaiser_beta(beta);
                let norm = bessel_i0(beta);
                (0..len).map(|n| kaiser_weight(n, len, beta, norm) as f32).collect()
            }
        }
    }

    /// Taper `buffer` in place.
    pub fn apply(self, buffer: &mut [f32]) {
        match self {
            WindowKind::Rectangular => {}
            WindowKind::Kaiser { beta } => apply_kaiser(buffer, beta),
            WindowKind::Hann => {
                let coeffs = self.coefficients(buffer.len());
                for (s, w) in buffer.iter_mut().zip(coeffs) {
                    *s *= w;
                }
            }
        }
    }
}

/// Zeroth-order modified Bessel function of the first kind.
///
/// Power series `Σ ((x/2)^k / k!)²`, summed until the added term drops below
/// `1e-6` of the running sum. Overflows to infinity past `x ≈ 710`.
///
/// # Example
/// ```
/// use sx_audio::window::bessel_i0;
/// assert_eq!(bessel_i0(0.0), 1.0);
/// assert!((bessel_i0(1.0) - 1.266_065_878).abs() < 1e-5);
/// ```
#[must_use]
pub fn bessel_i0(x: f64) -> f64 {
    let half = x / 2.0;
    let mut sum = 1.0;
    let mut term = 1.0;
    let mut k = 1;
    while term > I0_TOLERANCE * sum && k <= I0_MAX_TERMS {
        let ratio = half / f64::from(k);
        term *= ratio * ratio;
        sum += term;
        k += 1;
    }
    sum
}

/// β limited to the range where `bessel_i0` converges and stays finite.
/// NaN or infinite input falls back to the default shape.
fn kaiser_beta(beta: f64) -> f64 {
    if beta.is_finite() {
        beta.clamp(0.0, MAX_KAISER_BETA)
    } else {
        DEFAULT_KAISER_BETA
    }
}

/// Kaiser weight of sample `n` in a window of `len` samples, `norm = I0(β)`.
#[inline]
fn kaiser_weight(n: usize, len: usize, beta: f64, norm: f64) -> f64 {
    if len <= 1 {
        return 1.0;
    }
    let r = 2.0 * n as f64 / (len - 1) as f64 - 1.0;
    let arg = beta * (1.0 - r * r).max(0.0).sqrt();
    bessel_i0(arg) / norm
}

/// Apply a Kaiser window of shape `beta` to `buffer` in place.
///
/// `beta` is clamped to `0..=MAX_KAISER_BETA`; a NaN or infinite value
/// uses `DEFAULT_KAISER_BETA`.
///
/// # Example
/// ```
/// use sx_audio::window::apply_kaiser;
/// let mut block = vec![1.0f32; 7];
/// apply_kaiser(&mut block, 5.658);
/// assert!((block[3] - 1.0).abs() < 1e-6);
/// assert!(block[0] < 0.1);
/// ```
pub fn apply_kaiser(buffer: &mut [f32], beta: f64) {
    let len = buffer.len();
    let beta = kaiser_beta(beta);
    let norm = bessel_i0(beta);
    for (n, sample) in buffer.iter_mut().enumerate() {
        *sample = (f64::from(*sample) * kaiser_weight(n, len, beta, norm)) as f32;
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn out_of_range_beta_is_clamped() {
        for beta in [1e4, 800.0, f64::INFINITY, f64::NAN, -3.0] {
            let mut block = vec![1.0f32; 65];
            apply_kaiser(&mut block, beta);
            assert!(
                block.iter().all(|w| w.is_finite() && (0.0..=1.0).contains(w)),
                "beta {beta}: {block:?}"
            );
            assert_eq!(block, WindowKind::Kaiser { beta }.coefficients(65));
        }

        let mut huge = vec![1.0f32; 65];
        apply_kaiser(&mut huge, 1e4);
        assert_eq!(huge, WindowKind::Kaiser { beta: MAX_KAISER_BETA }.coefficients(65));
        let mut negative = vec![1.0f32; 65];
        apply_kaiser(&mut negative, -3.0);
        assert_eq!(negative, WindowKind::Rectangular.coefficients(65));
    }

    #[test]
    fn single_sample_window_is_identity() {
        let mut block = [0.75f32];
        apply_kaiser(&mut block, 5.658);
        assert!((block[0] - 0.75).abs() < f32::EPSILON);
        assert_eq!(WindowKind::Hann.coefficients(1), vec![1.0]);
    }

    #[test]
    fn empty_buffer_is_untouched() {
        let mut block: [f32; 0] = [];
        apply_kaiser(&mut block, 5.658);
        assert!(WindowKind::Kaiser { beta: 3.0 }.coefficients(0).is_empty());
    }

    #[test]
    fn zero_beta_is_rectangular() {
        let w = WindowKind::Kaiser { beta: 0.0 }.coefficients(16);
        assert!(w.iter().all(|&c| (c - 1.0).abs() < 1e-6));
    }

    #[test]
    fn hann_endpoints_are_zero() {
        let w = WindowKind::Hann.coefficients(9);
        assert!(w[0].abs() < 1e-6);
        assert!(w[8].abs() < 1e-6);
        assert!((w[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn kaiser_edges_match_closed_form() {
        let beta = 5.658;
        let w = WindowKind::Kaiser { beta }.coefficients(33);
        let expected = (1.0 / bessel_i0(beta)) as f32;
        assert!((w[0] - expected).abs() < 1e-6);
        assert!((w[32] - expected).abs() < 1e-6);
    }

    #[test]
    fn i0_matches_reference_values() {
        // I0(2) = 2.2795853, I0(5) = 27.239872
        assert!((bessel_i0(2.0) - 2.279_585_3).abs() < 1e-5);
        assert!((bessel_i0(5.0) - 27.239_872).abs() / 27.239_872 < 1e-5);
    }

    #[test]
    fn apply_matches_coefficients() {
        let kind = WindowKind::Kaiser { beta: 8.0 };
        let mut block = vec![2.0f32; 64];
        kind.apply(&mut block);
        for (s, w) in block.iter().zip(kind.coefficients(64)) {
            assert!((s - 2.0 * w).abs() < 1e-5);
        }
    }

    proptest! {
        #[test]
        fn kaiser_weights_stay_in_unit_range(beta in 0.01f64..20.0, len in 2usize..512) {
            let w = WindowKind::Kaiser { beta }.coefficients(len);
            let min = w.iter().copied().fold(f32::MAX, f32::min);
            for &c in &w {
                prop_assert!((0.0..=1.0 + 1e-6).contains(&c));
            }
            // edges sit at the taper minimum
            prop_assert!((w[0] - min).abs() < 1e-6);
            prop_assert!((w[len - 1] - min).abs() < 1e-6);
        }

        #[test]
        fn odd_kaiser_window_peaks_at_centre(beta in 0.01f64..20.0, half in 1usize..256) {
            let len = 2 * half + 1;
            let w = WindowKind::Kaiser { beta }.coefficients(len);
            prop_assert!((w[half] - 1.0).abs() < 1e-6);
        }

        #[test]
        fn kaiser_window_is_symmetric(beta in 0.01f64..20.0, len in 2usize..256) {
            let w = WindowKind::Kaiser { beta }.coefficients(len);
            for n in 0..len {
                prop_assert!((w[n] - w[len - 1 - n]).abs() < 1e-5);
            }
        }
    }
}
