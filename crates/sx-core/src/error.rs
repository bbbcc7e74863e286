use thiserror::Error;

use crate::feature::FeatureKind;

/// Errors originating from the core module.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A feature name that maps to no known kind.
    #[error("unknown feature: {name}")]
    UnknownFeature {
        /// The name that failed to resolve.
        name: String,
    },
}

/// Failure raised by an analyzer while reducing one frame to a scalar.
///
/// Never propagated past the unit that owns the analyzer: the unit converts it
/// into a fallback response carrying the last good value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// An intermediate or final quantity overflowed or became undefined.
    #[error("{kind} produced a non-finite value")]
    NonFinite {
        /// The analyzer that failed.
        kind: FeatureKind,
    },
}
