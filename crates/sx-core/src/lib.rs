/// Configuration, types, and shared structures for spectrex.
///
/// This crate contains the feature vocabulary, the statistics snapshot, the
/// message protocol spoken between the aggregator and its analyzer units, and
/// the TOML configuration shared across the spectrex workspace.

pub mod config;
pub mod error;
pub mod feature;
pub mod frame;
pub mod protocol;
pub mod stats;
pub mod traits;

pub use config::PipelineConfig;
pub use error::{AnalysisError, CoreError};
pub use feature::FeatureKind;
pub use frame::{CorrelationId, FeatureSample, FeatureVector, FftFrame, FrameReport, FrameStatus};
pub use protocol::{AnalyzerRequest, AnalyzerResponse, ControlMessage, ResponseOrigin};
pub use stats::Statistics;
