use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use serde_json::json;
use sx_audio::FrameAggregator;
use sx_core::config::PipelineConfig;
use sx_core::frame::FrameReport;
use sx_core::protocol::ControlMessage;

use crate::source::SpectrumSource;

/// Render loop: one aggregation cycle per tick, one JSON line per frame.
pub struct App {
    config: Arc<ArcSwap<PipelineConfig>>,
    /// Snapshot the pipeline currently runs with.
    active: Arc<PipelineConfig>,
    aggregator: FrameAggregator,
    source: SpectrumSource,
    controls: Option<flume::Receiver<ControlMessage>>,
    frame_limit: Option<u64>,
}

impl App {
    /// Spawn the analyzer units for the current config.
    ///
    /// # Errors
    /// Returns an error if the analyzer units cannot be started.
    pub fn new(
        config: Arc<ArcSwap<PipelineConfig>>,
        source: SpectrumSource,
        controls: Option<flume::Receiver<ControlMessage>>,
        frame_limit: Option<u64>,
    ) -> Result<Self> {
        let active = config.load_full();
        let aggregator =
            FrameAggregator::from_config(&active).context("Cannot start analyzer units")?;
        Ok(Self {
            config,
            active,
            aggregator,
            source,
            controls,
            frame_limit,
        })
    }

    /// Run until the frame limit is reached or `out` is closed.
    ///
    /// # Errors
    /// Returns an error if a unit dies or `out` fails for a reason other than
    /// a closed pipe.
    pub fn run(&mut self, out: &mut impl Write) -> Result<()> {
        let mut emitted = 0u64;
        while self.frame_limit.is_none_or(|limit| emitted < limit) {
            let tick = Instant::now();
            self.apply_config_changes();
            self.apply_controls(out)?;

            let report = self.tick(tick)?;
            match write_report(out, &report) {
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    log::info!("Output closed, stopping");
                    return Ok(());
                }
                other => other.context("Cannot write frame")?,
            }
            emitted += 1;

            let period = Duration::from_secs_f64(1.0 / f64::from(self.active.target_fps.max(1)));
            std::thread::sleep(period.saturating_sub(tick.elapsed()));
        }
        log::info!(
            "Stopped after {emitted} frames ({} late responses discarded)",
            self.aggregator.discarded()
        );
        Ok(())
    }

    fn tick(&mut self, started: Instant) -> Result<FrameReport> {
        let frame = self.source.latest().clone();
        self.aggregator.begin_frame(frame)?;
        let report = self.aggregator.finalize(started + self.active.deadline())?;
        if !report.is_complete() {
            log::debug!("Frame {} missed its deadline", report.id);
        }
        Ok(report)
    }

    fn apply_config_changes(&mut self) {
        let latest = self.config.load_full();
        if Arc::ptr_eq(&latest, &self.active) {
            return;
        }

        if latest.history_size != self.active.history_size {
            match self.aggregator.pool().reconfigure_all(latest.history_size) {
                Ok(()) => log::info!("History size now {}", latest.history_size),
                Err(e) => log::warn!("Cannot apply history size: {e}"),
            }
        }
        if latest.fft_size != self.active.fft_size
            || latest.window != self.active.window
            || latest.kaiser_beta.to_bits() != self.active.kaiser_beta.to_bits()
            || latest.features != self.active.features
        {
            log::warn!("FFT and feature changes take effect on restart");
        }
        self.active = latest;
    }

    fn apply_controls(&mut self, out: &mut impl Write) -> Result<()> {
        let Some(controls) = &self.controls else {
            return Ok(());
        };
        for msg in controls.try_iter() {
            match self.aggregator.pool().handle_control(&msg) {
                Ok(Some(histories)) => writeln!(out, "{}", json!({ "debug": histories }))?,
                Ok(None) => log::info!("Applied control message {msg:?}"),
                Err(e) => log::warn!("Control message {msg:?} rejected: {e}"),
            }
        }
        Ok(())
    }
}

/// One line: `{"frame":n,"status":"complete"|"partial","missing"?:[..],"features":{..}}`.
fn write_report(out: &mut impl Write, report: &FrameReport) -> std::io::Result<()> {
    let mut line = serde_json::to_value(&report.status).unwrap_or_else(|_| json!({}));
    line["frame"] = json!(report.id.0);
    line["features"] = json!(report.vector.uniforms());
    writeln!(out, "{line}")
}
