use crate::error::AnalysisError;
use crate::feature::FeatureKind;
use crate::frame::FftFrame;

/// Reduces one spectral frame to one scalar.
///
/// Implementors own whatever private state they need (the flux analyzer keeps
/// the previous frame). An analyzer is moved into exactly one unit thread and
/// is never shared.
///
/// # Example
/// ```
/// use sx_core::error::AnalysisError;
/// use sx_core::feature::FeatureKind;
/// use sx_core::frame::FftFrame;
/// use sx_core::traits::FeatureAnalyzer;
///
/// struct Peak;
/// impl FeatureAnalyzer for Peak {
///     fn kind(&self) -> FeatureKind { FeatureKind::SpectralCrest }
///     fn compute(&mut self, frame: &FftFrame) -> Result<f64, AnalysisError> {
///         Ok(frame.bins().iter().copied().fold(0.0f32, f32::max).into())
///     }
/// }
/// ```
pub trait FeatureAnalyzer: Send + 'static {
    /// The stream this analyzer feeds.
    fn kind(&self) -> FeatureKind;

    /// Compute the scalar for `frame`.
    ///
    /// CONTRACT: silent or all-zero spectra yield `kind().default_value()`,
    /// never NaN or infinity.
    ///
    /// # Errors
    /// Returns [`AnalysisError::NonFinite`] when the math overflows.
    fn compute(&mut self, frame: &FftFrame) -> Result<f64, AnalysisError>;

    /// Drop any private per-frame state. Stateless analyzers keep the default.
    fn reset(&mut self) {}
}
