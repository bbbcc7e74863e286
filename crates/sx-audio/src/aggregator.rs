//! Per-frame fan-out and fan-in across analyzer units.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use sx_core::config::PipelineConfig;
use sx_core::feature::FeatureKind;
use sx_core::frame::{
    CorrelationId, FeatureSample, FeatureVector, FftFrame, FrameReport, FrameStatus,
};
use sx_core::protocol::{AnalyzerRequest, AnalyzerResponse};

use crate::error::PipelineError;
use crate::pool::{AnalyzerPool, DispatchOutcome};

struct OpenFrame {
    id: CorrelationId,
    pending: BTreeSet<FeatureKind>,
    vector: FeatureVector,
    started: Instant,
}

/// Collects one response per configured kind for each frame and emits a
/// complete feature vector by the frame deadline.
///
/// At most one frame is open at a time. A kind that has not answered by the
/// deadline is filled with the newest value any frame received for it (or
/// its default), so every emitted vector has the same shape. Responses that
/// arrive after their frame closed are kept for that fill even though they
/// never enter their own frame's vector.
///
/// # Example
/// ```
/// use std::time::{Duration, Instant};
/// use sx_audio::FrameAggregator;
/// use sx_core::config::PipelineConfig;
/// use sx_core::frame::FftFrame;
///
/// let config = PipelineConfig::default();
/// let mut aggregator = FrameAggregator::from_config(&config).unwrap();
/// let bins = vec![0.0; config.fft_size / 2 + 1];
/// aggregator.begin_frame(FftFrame::new(bins, 44100)).unwrap();
/// let report = aggregator.finalize(Instant::now() + Duration::from_secs(2)).unwrap();
/// assert_eq!(report.vector.len(), config.features.len());
/// assert_eq!(report.vector.get("bass"), Some(0.0));
/// ```
pub struct FrameAggregator {
    pool: AnalyzerPool,
    replies: flume::Receiver<AnalyzerResponse>,
    kinds: BTreeSet<FeatureKind>,
    last_id: CorrelationId,
    open: Option<OpenFrame>,
    carried: BTreeMap<FeatureKind, (CorrelationId, FeatureSample)>,
    discarded: u64,
}

impl FrameAggregator {
    /// Aggregate `kinds` over the units of `pool`.
    ///
    /// # Errors
    /// [`PipelineError::UnknownKind`] if the pool has no unit for a kind.
    pub fn new(pool: AnalyzerPool, kinds: &[FeatureKind]) -> Result<Self, PipelineError> {
        if let Some(&kind) = kinds.iter().find(|&&k| !pool.contains(k)) {
            return Err(PipelineError::UnknownKind(kind));
        }
        Ok(Self {
            replies: pool.responses().clone(),
            pool,
            kinds: kinds.iter().copied().collect(),
            last_id: CorrelationId(0),
            open: None,
            carried: BTreeMap::new(),
            discarded: 0,
        })
    }

    /// Spawn a pool for `config.features` and aggregate over it.
    ///
    /// # Errors
    /// Any error from [`AnalyzerPool::from_config`].
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let pool = AnalyzerPool::from_config(config)?;
        Self::new(pool, &config.features)
    }

    /// Open a new frame and dispatch it to every configured unit.
    ///
    /// A frame still open is abandoned; its late responses will be discarded.
    ///
    /// # Errors
    /// [`PipelineError::UnitClosed`] if a unit has exited.
    pub fn begin_frame(&mut self, frame: FftFrame) -> Result<CorrelationId, PipelineError> {
        if let Some(stale) = self.open.take() {
            log::debug!(
                "Frame {} superseded with {} kinds pending",
                stale.id,
                stale.pending.len()
            );
        }

        self.last_id = self.last_id.next();
        let id = self.last_id;
        let frame = Arc::new(frame);

        for &kind in &self.kinds {
            let outcome = self.pool.dispatch(AnalyzerRequest {
                correlation_id: id,
                frame: Arc::clone(&frame),
                kind,
            })?;
            if let DispatchOutcome::Superseded(dropped) = outcome {
                log::trace!("{kind}: request {dropped} replaced by {id}");
            }
        }

        self.open = Some(OpenFrame {
            id,
            pending: self.kinds.clone(),
            vector: FeatureVector::default(),
            started: Instant::now(),
        });
        Ok(id)
    }

    /// Record one response. Returns `false` (and counts it as discarded) if it
    /// belongs to no open frame or its kind already answered.
    ///
    /// A discarded response for an earlier frame still replaces the carried
    /// value of its kind when it is newer than the one held.
    pub fn accept(&mut self, response: AnalyzerResponse) -> bool {
        self.carry(&response);

        let Some(open) = self
            .open
            .as_mut()
            .filter(|o| o.id == response.correlation_id)
        else {
            self.discarded += 1;
            log::debug!(
                "Discarding {} response for stale frame {}",
                response.kind,
                response.correlation_id
            );
            return false;
        };

        if !open.pending.remove(&response.kind) {
            self.discarded += 1;
            log::debug!(
                "Discarding unexpected {} response for frame {}",
                response.kind,
                response.correlation_id
            );
            return false;
        }

        open.vector.insert(response.kind, response.sample());
        true
    }

    /// Keep `response` as its kind's carry-forward value if it answers a frame
    /// this aggregator issued and is newer than the value held.
    fn carry(&mut self, response: &AnalyzerResponse) {
        if !self.kinds.contains(&response.kind) || response.correlation_id > self.last_id {
            return;
        }
        let newer = self
            .carried
            .get(&response.kind)
            .is_none_or(|&(id, _)| response.correlation_id > id);
        if newer {
            self.carried
                .insert(response.kind, (response.correlation_id, response.sample()));
        }
    }

    /// Accept every response already waiting, without blocking.
    /// Returns how many were accepted.
    pub fn pump(&mut self) -> usize {
        let waiting: Vec<AnalyzerResponse> = self.replies.try_iter().collect();
        waiting
            .into_iter()
            .map(|r| self.accept(r))
            .filter(|&accepted| accepted)
            .count()
    }

    /// `true` if a frame is open and every kind has answered.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.open.as_ref().is_some_and(|o| o.pending.is_empty())
    }

    /// Close the open frame, waiting for responses until `deadline` at most.
    ///
    /// Kinds still pending at the deadline are carried forward from their last
    /// accepted sample, or their default when they never answered.
    ///
    /// # Errors
    /// [`PipelineError::NoOpenFrame`] if no frame has been begun since the
    /// last finalize.
    pub fn finalize(&mut self, deadline: Instant) -> Result<FrameReport, PipelineError> {
        if self.open.is_none() {
            return Err(PipelineError::NoOpenFrame);
        }
        self.pump();

        while !self.is_complete() {
            match self.replies.recv_deadline(deadline) {
                Ok(response) => {
                    self.accept(response);
                }
                Err(flume::RecvTimeoutError::Timeout) => break,
                Err(flume::RecvTimeoutError::Disconnected) => {
                    log::warn!("Every analyzer unit has exited");
                    break;
                }
            }
        }
        // replies that landed between the timeout and now still refresh `carried`
        self.pump();

        let mut open = self.open.take().ok_or(PipelineError::NoOpenFrame)?;
        let status = if open.pending.is_empty() {
            FrameStatus::Complete
        } else {
            let missing: Vec<FeatureKind> = open.pending.iter().copied().collect();
            for &kind in &missing {
                let sample = self
                    .carried
                    .get(&kind)
                    .map_or_else(|| FeatureSample::default_for(kind), |&(_, s)| s);
                open.vector.insert(kind, sample);
            }
            log::debug!("Frame {} partial, carried forward: {missing:?}", open.id);
            FrameStatus::Partial { missing }
        };

        log::trace!("Frame {} closed after {:?}", open.id, open.started.elapsed());
        Ok(FrameReport {
            id: open.id,
            status,
            vector: open.vector,
        })
    }

    /// Id of the frame currently open.
    #[must_use]
    pub fn open_frame(&self) -> Option<CorrelationId> {
        self.open.as_ref().map(|o| o.id)
    }

    /// Responses discarded since creation.
    #[must_use]
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Kinds every emitted vector contains.
    pub fn kinds(&self) -> impl Iterator<Item = FeatureKind> + '_ {
        self.kinds.iter().copied()
    }

    /// Units behind this aggregator, for control messages.
    #[must_use]
    pub fn pool(&self) -> &AnalyzerPool {
        &self.pool
    }
}
