use sx_core::feature::FeatureKind;
use thiserror::Error;

/// Structural failures surfaced to callers of the pool and the aggregator.
///
/// Per-analyzer failures never appear here: they are absorbed by the unit and
/// reported as substituted or fallback responses.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No unit is registered for the requested kind.
    #[error("no analyzer unit registered for {0}")]
    UnknownKind(FeatureKind),

    /// History capacity must be positive.
    #[error("invalid history size: {0}")]
    InvalidHistorySize(usize),

    /// The unit's thread has exited.
    #[error("analyzer unit {0} is no longer running")]
    UnitClosed(FeatureKind),

    /// The unit did not answer a diagnostic request in time.
    #[error("analyzer unit {0} did not answer in time")]
    Unresponsive(FeatureKind),

    /// `finalize` was called without a frame in flight.
    #[error("no frame is open")]
    NoOpenFrame,

    /// Spawning a unit thread failed.
    #[error("cannot spawn analyzer unit: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Errors originating from audio file decoding.
#[derive(Error, Debug)]
pub enum AudioError {
    /// The container holds no decodable audio track.
    #[error("no audio track found")]
    NoTrack,

    /// The file decoded to zero samples.
    #[error("audio file is empty")]
    Empty,
}
