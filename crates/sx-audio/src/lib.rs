// Spectral analysis, analyzer units and per-frame aggregation for spectrex.

pub mod aggregator;
pub mod analyzers;
pub mod decode;
pub mod error;
pub mod fft;
pub mod pool;
pub mod stats;
pub mod window;

pub use aggregator::FrameAggregator;
pub use error::PipelineError;
pub use pool::{AnalyzerPool, DispatchOutcome, UnitSettings};
pub use stats::StatsTracker;
