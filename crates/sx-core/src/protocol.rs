use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::feature::FeatureKind;
use crate::frame::{CorrelationId, FeatureSample, FftFrame};
use crate::stats::Statistics;

/// One frame handed to one analyzer unit.
#[derive(Clone, Debug)]
pub struct AnalyzerRequest {
    /// Frame this request belongs to.
    pub correlation_id: CorrelationId,
    /// Spectrum, shared by every unit dispatched for this frame.
    pub frame: Arc<FftFrame>,
    /// Target unit.
    pub kind: FeatureKind,
}

/// Where a response's value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseOrigin {
    /// Freshly computed from the request's frame.
    Computed,
    /// The frame was malformed; the kind's default scalar was used.
    Substituted,
    /// The computation failed; the unit's last good value was re-sent.
    Fallback,
}

/// A unit's answer to one request.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalyzerResponse {
    /// Echoed from the request.
    pub correlation_id: CorrelationId,
    /// Unit that answered.
    pub kind: FeatureKind,
    /// Scalar for this frame. Always finite.
    pub value: f64,
    /// Statistics of the unit's stream after this response.
    pub stats: Statistics,
    /// Fresh, substituted or fallback.
    pub origin: ResponseOrigin,
}

impl AnalyzerResponse {
    /// Value and statistics as stored in a feature vector.
    #[must_use]
    pub fn sample(&self) -> FeatureSample {
        FeatureSample {
            value: self.value,
            stats: self.stats,
        }
    }
}

/// Control messages accepted by analyzer units, in their external JSON form.
///
/// ```json
/// {"type": "config", "historySize": 200, "analyzerKind": "bass"}
/// {"type": "reset"}
/// {"type": "debug", "analyzerKind": "spectralFlux"}
/// ```
///
/// Omitting `analyzerKind` targets every unit.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlMessage {
    /// Change the history capacity of one or all trackers.
    #[serde(rename_all = "camelCase")]
    Config {
        /// New capacity, must be positive.
        history_size: usize,
        /// Single unit to target, or all when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        analyzer_kind: Option<FeatureKind>,
    },
    /// Clear tracker history (and the flux unit's previous frame).
    #[serde(rename_all = "camelCase")]
    Reset {
        /// Single unit to target, or all when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        analyzer_kind: Option<FeatureKind>,
    },
    /// Return raw tracker history. Diagnostic only.
    #[serde(rename_all = "camelCase")]
    Debug {
        /// Single unit to inspect, or all when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        analyzer_kind: Option<FeatureKind>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Option<ControlMessage> {
        serde_json::from_str(json).ok()
    }

    #[test]
    fn config_message_parses_with_and_without_kind() {
        assert_eq!(
            parse(r#"{"type":"config","historySize":64,"analyzerKind":"bass"}"#),
            Some(ControlMessage::Config {
                history_size: 64,
                analyzer_kind: Some(FeatureKind::Bass),
            })
        );
        assert_eq!(
            parse(r#"{"type":"config","historySize":64}"#),
            Some(ControlMessage::Config {
                history_size: 64,
                analyzer_kind: None,
            })
        );
    }

    #[test]
    fn bare_reset_targets_everything() {
        assert_eq!(
            parse(r#"{"type":"reset"}"#),
            Some(ControlMessage::Reset {
                analyzer_kind: None
            })
        );
    }

    #[test]
    fn bare_debug_inspects_every_unit() {
        assert_eq!(
            parse(r#"{"type":"debug"}"#),
            Some(ControlMessage::Debug {
                analyzer_kind: None
            })
        );
        assert_eq!(
            parse(r#"{"type":"debug","analyzerKind":"spectralFlux"}"#),
            Some(ControlMessage::Debug {
                analyzer_kind: Some(FeatureKind::SpectralFlux)
            })
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert_eq!(parse(r#"{"type":"fftData"}"#), None);
    }
}
