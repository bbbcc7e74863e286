use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use sx_core::frame::FftFrame;

use crate::window::WindowKind;

/// Windowed real FFT producing magnitude spectra.
///
/// Plan, scratch buffers and window coefficients are allocated once; the hot
/// path only allocates the returned spectrum.
///
/// # Example
/// ```
/// use sx_audio::fft::FftPipeline;
/// use sx_audio::window::WindowKind;
/// let fft = FftPipeline::new(2048, WindowKind::Kaiser { beta: 5.658 });
/// assert_eq!(fft.bins(), 1025);
/// ```
pub struct FftPipeline {
    fft_size: usize,
    input_buf: Vec<f32>,
    spectrum_buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    plan: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
}

impl FftPipeline {
    /// Create a pipeline for blocks of `size` samples tapered by `window`.
    ///
    /// # Panics
    /// Panics if `size` is 0.
    #[must_use]
    pub fn new(size: usize, window: WindowKind) -> Self {
        assert!(size > 0, "FFT size must be > 0");

        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(size);

        Self {
            fft_size: size,
            input_buf: plan.make_input_vec(),
            spectrum_buf: plan.make_output_vec(),
            scratch: plan.make_scratch_vec(),
            plan,
            window: window.coefficients(size),
        }
    }

    /// Magnitude spectrum of `samples` (N/2 + 1 bins, scaled by 1/N).
    ///
    /// Short blocks are zero-padded, long ones truncated.
    ///
    /// # Example
    /// ```
    /// use sx_audio::fft::FftPipeline;
    /// use sx_audio::window::WindowKind;
    /// let mut fft = FftPipeline::new(256, WindowKind::Hann);
    /// let spectrum = fft.process(&[0.0; 256]);
    /// assert_eq!(spectrum.len(), 129);
    /// assert!(spectrum.iter().all(|&m| m == 0.0));
    /// ```
    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        let n = self.fft_size.min(samples.len());

        for (i, slot) in self.input_buf.iter_mut().enumerate() {
            *slot = if i < n {
                samples[i] * self.window[i]
            } else {
                0.0
            };
        }

        if self
            .plan
            .process_with_scratch(&mut self.input_buf, &mut self.spectrum_buf, &mut self.scratch)
            .is_err()
        {
            log::warn!("FFT failed on a {}-sample block", self.fft_size);
            return vec![0.0; self.spectrum_buf.len()];
        }

        let scale = self.fft_size as f32;
        self.spectrum_buf.iter().map(|c| c.norm() / scale).collect()
    }

    /// Transform `samples` straight into a frame tagged with `sample_rate`.
    pub fn frame(&mut self, samples: &[f32], sample_rate: u32) -> FftFrame {
        FftFrame::new(self.process(samples), sample_rate)
    }

    /// FFT window size.
    #[must_use]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of magnitude bins per spectrum.
    #[must_use]
    pub fn bins(&self) -> usize {
        self.fft_size / 2 + 1
    }
}
