//! Analyzer units: one thread per feature kind, driven by message passing.
//!
//! Each unit owns its analyzer and statistics tracker outright. Frames reach a
//! unit through a depth-1 mailbox: dispatching while a request is still waiting
//! evicts the waiting one, so a slow unit only ever works on the newest frame.
//! Control messages use a separate unbounded channel, are never dropped, and
//! are applied before the unit computes its next frame.

use std::collections::BTreeMap;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use sx_core::config::PipelineConfig;
use sx_core::feature::FeatureKind;
use sx_core::frame::{CorrelationId, FeatureSample};
use sx_core::protocol::{AnalyzerRequest, AnalyzerResponse, ControlMessage, ResponseOrigin};
use sx_core::traits::FeatureAnalyzer;

use crate::analyzers::analyzer_for;
use crate::error::PipelineError;
use crate::stats::StatsTracker;

/// How long [`AnalyzerPool::debug`] waits for a unit to answer.
const DEBUG_TIMEOUT: Duration = Duration::from_millis(250);

/// Parameters shared by every unit of a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnitSettings {
    /// Statistics history capacity.
    pub history_size: usize,
    /// Bin count of a well-formed frame.
    pub expected_bins: usize,
}

impl UnitSettings {
    /// Settings matching a pipeline configuration.
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            history_size: config.history_size,
            expected_bins: config.fft_size / 2 + 1,
        }
    }
}

/// Result of handing a request to a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The mailbox was free.
    Queued,
    /// The request with this id was still waiting and has been dropped.
    Superseded(CorrelationId),
}

enum Control {
    Configure(usize),
    Reset,
    Debug(flume::Sender<Vec<f64>>),
}

enum Event {
    Control(Control),
    Request(AnalyzerRequest),
    Closed,
}

struct UnitHandle {
    frames: flume::Sender<AnalyzerRequest>,
    /// Second receiver on the mailbox, used only to evict a waiting request.
    evict: flume::Receiver<AnalyzerRequest>,
    control: flume::Sender<Control>,
    thread: JoinHandle<()>,
}

/// The per-thread side of a unit.
struct Unit {
    analyzer: Box<dyn FeatureAnalyzer>,
    tracker: StatsTracker,
    expected_bins: usize,
    last_good: Option<FeatureSample>,
    replies: flume::Sender<AnalyzerResponse>,
}

impl Unit {
    fn run(
        mut self,
        frames: &flume::Receiver<AnalyzerRequest>,
        control: &flume::Receiver<Control>,
    ) {
        let kind = self.analyzer.kind();
        loop {
            let event = flume::Selector::new()
                .recv(control, |msg| msg.map_or(Event::Closed, Event::Control))
                .recv(frames, |msg| msg.map_or(Event::Closed, Event::Request))
                .wait();

            match event {
                Event::Control(msg) => self.apply(msg),
                Event::Request(request) => {
                    while let Ok(msg) = control.try_recv() {
                        self.apply(msg);
                    }
                    if self.answer(&request).is_err() {
                        break;
                    }
                }
                Event::Closed => break,
            }
        }
        log::debug!("Analyzer unit {kind} stopped");
    }

    fn apply(&mut self, msg: Control) {
        match msg {
            Control::Configure(capacity) => {
                self.tracker.reconfigure(capacity);
                log::debug!(
                    "Analyzer unit {}: history size {capacity}",
                    self.analyzer.kind()
                );
            }
            Control::Reset => {
                self.tracker.reset();
                self.analyzer.reset();
                self.last_good = None;
            }
            Control::Debug(reply) => {
                // the requester may have given up waiting
                let _ = reply.send(self.tracker.history());
            }
        }
    }

    fn answer(
        &mut self,
        request: &AnalyzerRequest,
    ) -> Result<(), flume::SendError<AnalyzerResponse>> {
        let kind = self.analyzer.kind();
        let id = request.correlation_id;

        let (value, stats, origin) = if request.frame.is_well_formed(self.expected_bins) {
            match self.analyzer.compute(&request.frame) {
                Ok(value) if value.is_finite() => {
                    let stats = self.tracker.push(value);
                    self.last_good = Some(FeatureSample { value, stats });
                    (value, stats, ResponseOrigin::Computed)
                }
                result => {
                    let reason =
                        result.map_or_else(|e| e.to_string(), |v| format!("non-finite value {v}"));
                    log::warn!("Analyzer unit {kind}: frame {id} failed ({reason}), re-sending last value");
                    let value = self.last_good.map_or(kind.default_value(), |s| s.value);
                    (value, self.tracker.statistics(), ResponseOrigin::Fallback)
                }
            }
        } else {
            log::warn!(
                "Analyzer unit {kind}: malformed frame {id} ({} bins, expected {}), using default",
                request.frame.len(),
                self.expected_bins
            );
            let value = kind.default_value();
            (value, self.tracker.push(value), ResponseOrigin::Substituted)
        };

        self.replies.send(AnalyzerResponse {
            correlation_id: id,
            kind,
            value,
            stats,
            origin,
        })
    }
}

/// Owner of every analyzer unit and of the shared reply channel.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use sx_audio::pool::{AnalyzerPool, UnitSettings};
/// use sx_core::feature::FeatureKind;
/// use sx_core::frame::{CorrelationId, FftFrame};
/// use sx_core::protocol::AnalyzerRequest;
///
/// let settings = UnitSettings { history_size: 16, expected_bins: 513 };
/// let mut pool = AnalyzerPool::spawn(&[FeatureKind::Energy], settings).unwrap();
/// pool.dispatch(AnalyzerRequest {
///     correlation_id: CorrelationId(1),
///     frame: Arc::new(FftFrame::new(vec![0.0; 513], 44100)),
///     kind: FeatureKind::Energy,
/// })
/// .unwrap();
/// let response = pool.responses().recv_timeout(Duration::from_secs(2)).unwrap();
/// assert_eq!(response.value, 0.0);
/// ```
pub struct AnalyzerPool {
    units: BTreeMap<FeatureKind, UnitHandle>,
    replies: flume::Receiver<AnalyzerResponse>,
}

impl AnalyzerPool {
    /// Spawn one unit per kind with the built-in analyzers.
    ///
    /// # Errors
    /// [`PipelineError::InvalidHistorySize`] for a zero history size, or
    /// [`PipelineError::Spawn`] if a thread cannot be started.
    pub fn spawn(kinds: &[FeatureKind], settings: UnitSettings) -> Result<Self, PipelineError> {
        Self::spawn_with(kinds.iter().map(|&k| analyzer_for(k)).collect(), settings)
    }

    /// Spawn the units described by a pipeline configuration.
    ///
    /// # Errors
    /// See [`AnalyzerPool::spawn`].
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        Self::spawn(&config.features, UnitSettings::from_config(config))
    }

    /// Spawn one unit per supplied analyzer. A second analyzer for an
    /// already-registered kind is ignored.
    ///
    /// # Errors
    /// See [`AnalyzerPool::spawn`].
    pub fn spawn_with(
        analyzers: Vec<Box<dyn FeatureAnalyzer>>,
        settings: UnitSettings,
    ) -> Result<Self, PipelineError> {
        if settings.history_size == 0 {
            return Err(PipelineError::InvalidHistorySize(0));
        }

        let (reply_tx, reply_rx) = flume::unbounded();
        let mut units = BTreeMap::new();

        for analyzer in analyzers {
            let kind = analyzer.kind();
            if units.contains_key(&kind) {
                log::warn!("Duplicate analyzer for {kind} ignored");
                continue;
            }

            let (frame_tx, frame_rx) = flume::bounded(1);
            let (control_tx, control_rx) = flume::unbounded();
            let evict = frame_rx.clone();

            let unit = Unit {
                analyzer,
                tracker: StatsTracker::new(settings.history_size),
                expected_bins: settings.expected_bins,
                last_good: None,
                replies: reply_tx.clone(),
            };

            let thread = thread::Builder::new()
                .name(format!("sx-{kind}"))
                .spawn(move || unit.run(&frame_rx, &control_rx))?;

            units.insert(
                kind,
                UnitHandle {
                    frames: frame_tx,
                    evict,
                    control: control_tx,
                    thread,
                },
            );
        }

        log::info!(
            "Spawned {} analyzer units (history {}, {} bins)",
            units.len(),
            settings.history_size,
            settings.expected_bins
        );

        Ok(Self {
            units,
            replies: reply_rx,
        })
    }

    fn unit(&self, kind: FeatureKind) -> Result<&UnitHandle, PipelineError> {
        self.units.get(&kind).ok_or(PipelineError::UnknownKind(kind))
    }

    /// Hand `request` to its unit, evicting a request still waiting there.
    ///
    /// # Errors
    /// [`PipelineError::UnknownKind`] if no unit serves the kind,
    /// [`PipelineError::UnitClosed`] if the unit has exited.
    pub fn dispatch(&mut self, request: AnalyzerRequest) -> Result<DispatchOutcome, PipelineError> {
        let kind = request.kind;
        let unit = self.unit(kind)?;

        match unit.frames.try_send(request) {
            Ok(()) => Ok(DispatchOutcome::Queued),
            Err(flume::TrySendError::Disconnected(_)) => Err(PipelineError::UnitClosed(kind)),
            Err(flume::TrySendError::Full(request)) => {
                // the unit may have taken the waiting request in the meantime
                let stale = unit.evict.try_recv().ok().map(|r| r.correlation_id);
                unit.frames
                    .send(request)
                    .map_err(|_| PipelineError::UnitClosed(kind))?;
                Ok(stale.map_or(DispatchOutcome::Queued, |id| {
                    log::debug!("Analyzer unit {kind}: request {id} superseded before processing");
                    DispatchOutcome::Superseded(id)
                }))
            }
        }
    }

    /// Channel every unit answers on.
    #[must_use]
    pub fn responses(&self) -> &flume::Receiver<AnalyzerResponse> {
        &self.replies
    }

    fn send_control(&self, kind: FeatureKind, msg: Control) -> Result<(), PipelineError> {
        self.unit(kind)?
            .control
            .send(msg)
            .map_err(|_| PipelineError::UnitClosed(kind))
    }

    /// Change one unit's history capacity.
    ///
    /// # Errors
    /// [`PipelineError::InvalidHistorySize`] for zero, or the unit lookup errors.
    pub fn reconfigure(&self, kind: FeatureKind, history_size: usize) -> Result<(), PipelineError> {
        if history_size == 0 {
            return Err(PipelineError::InvalidHistorySize(0));
        }
        self.send_control(kind, Control::Configure(history_size))
    }

    /// Change every unit's history capacity.
    ///
    /// # Errors
    /// See [`AnalyzerPool::reconfigure`].
    pub fn reconfigure_all(&self, history_size: usize) -> Result<(), PipelineError> {
        self.kinds()
            .try_for_each(|kind| self.reconfigure(kind, history_size))
    }

    /// Clear one unit's history and analyzer state.
    ///
    /// # Errors
    /// [`PipelineError::UnknownKind`] or [`PipelineError::UnitClosed`].
    pub fn reset(&self, kind: FeatureKind) -> Result<(), PipelineError> {
        self.send_control(kind, Control::Reset)
    }

    /// Clear every unit.
    ///
    /// # Errors
    /// See [`AnalyzerPool::reset`].
    pub fn reset_all(&self) -> Result<(), PipelineError> {
        self.kinds().try_for_each(|kind| self.reset(kind))
    }

    /// Raw history of one unit, oldest first.
    ///
    /// # Errors
    /// [`PipelineError::Unresponsive`] if the unit does not answer in time,
    /// or the unit lookup errors.
    pub fn debug(&self, kind: FeatureKind) -> Result<Vec<f64>, PipelineError> {
        let (tx, rx) = flume::bounded(1);
        self.send_control(kind, Control::Debug(tx))?;
        rx.recv_timeout(DEBUG_TIMEOUT)
            .map_err(|_| PipelineError::Unresponsive(kind))
    }

    /// Raw history of every unit, keyed by kind.
    ///
    /// # Errors
    /// The first error from [`AnalyzerPool::debug`].
    pub fn debug_all(&self) -> Result<BTreeMap<FeatureKind, Vec<f64>>, PipelineError> {
        self.kinds()
            .map(|kind| self.debug(kind).map(|history| (kind, history)))
            .collect()
    }

    /// Apply an external control message. `Debug` returns the histories of
    /// the targeted units.
    ///
    /// # Errors
    /// Whatever the targeted operation returns.
    pub fn handle_control(
        &self,
        msg: &ControlMessage,
    ) -> Result<Option<BTreeMap<FeatureKind, Vec<f64>>>, PipelineError> {
        match *msg {
            ControlMessage::Config {
                history_size,
                analyzer_kind: Some(kind),
            } => self.reconfigure(kind, history_size).map(|()| None),
            ControlMessage::Config {
                history_size,
                analyzer_kind: None,
            } => self.reconfigure_all(history_size).map(|()| None),
            ControlMessage::Reset {
                analyzer_kind: Some(kind),
            } => self.reset(kind).map(|()| None),
            ControlMessage::Reset { analyzer_kind: None } => self.reset_all().map(|()| None),
            ControlMessage::Debug {
                analyzer_kind: Some(kind),
            } => self
                .debug(kind)
                .map(|history| Some(BTreeMap::from([(kind, history)]))),
            ControlMessage::Debug { analyzer_kind: None } => self.debug_all().map(Some),
        }
    }

    /// Kinds served by this pool, in canonical order.
    pub fn kinds(&self) -> impl Iterator<Item = FeatureKind> + '_ {
        self.units.keys().copied()
    }

    /// `true` if a unit serves `kind`.
    #[must_use]
    pub fn contains(&self, kind: FeatureKind) -> bool {
        self.units.contains_key(&kind)
    }
}

impl Drop for AnalyzerPool {
    fn drop(&mut self) {
        // dropping the senders wakes every unit with a disconnect
        let threads: Vec<JoinHandle<()>> = std::mem::take(&mut self.units)
            .into_values()
            .map(|UnitHandle { thread, .. }| thread)
            .collect();
        for thread in threads {
            if thread.join().is_err() {
                log::warn!("An analyzer unit panicked");
            }
        }
    }
}
