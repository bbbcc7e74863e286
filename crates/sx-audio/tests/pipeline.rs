//! End-to-end behaviour of pool + aggregator under deadlines.

use std::time::{Duration, Instant};

use sx_audio::analyzers::analyzer_for;
use sx_audio::fft::FftPipeline;
use sx_audio::pool::{AnalyzerPool, UnitSettings};
use sx_audio::window::WindowKind;
use sx_audio::FrameAggregator;
use sx_core::error::AnalysisError;
use sx_core::feature::FeatureKind;
use sx_core::frame::{FftFrame, FrameStatus};
use sx_core::traits::FeatureAnalyzer;

const FFT_SIZE: usize = 1024;
const BINS: usize = FFT_SIZE / 2 + 1;
const SR: u32 = 44_100;

fn settings() -> UnitSettings {
    UnitSettings {
        history_size: 64,
        expected_bins: BINS,
    }
}

fn soon() -> Instant {
    Instant::now() + Duration::from_secs(2)
}

/// Treble analyzer whose second and later computations wait for a release.
struct SlowTreble {
    inner: Box<dyn FeatureAnalyzer>,
    calls: usize,
    release: flume::Receiver<()>,
}

impl FeatureAnalyzer for SlowTreble {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Treble
    }

    fn compute(&mut self, frame: &FftFrame) -> Result<f64, AnalysisError> {
        self.calls += 1;
        if self.calls > 1 {
            let _ = self.release.recv_timeout(Duration::from_secs(5));
        }
        self.inner.compute(frame)
    }
}

/// Treble analyzer that always takes longer than the frame deadline.
struct Sluggish;

impl FeatureAnalyzer for Sluggish {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Treble
    }

    fn compute(&mut self, _frame: &FftFrame) -> Result<f64, AnalysisError> {
        std::thread::sleep(Duration::from_millis(20));
        Ok(7.0)
    }
}

/// Always fails after its first frame.
struct Brittle {
    calls: usize,
}

impl FeatureAnalyzer for Brittle {
    fn kind(&self) -> FeatureKind {
        FeatureKind::SpectralCentroid
    }

    fn compute(&mut self, _frame: &FftFrame) -> Result<f64, AnalysisError> {
        self.calls += 1;
        if self.calls == 1 {
            Ok(3.0)
        } else {
            Err(AnalysisError::NonFinite {
                kind: FeatureKind::SpectralCentroid,
            })
        }
    }
}

fn high_tone_frame(fft: &mut FftPipeline) -> FftFrame {
    let samples: Vec<f32> = (0..FFT_SIZE)
        .map(|i| (std::f32::consts::TAU * 8000.0 * i as f32 / SR as f32).sin())
        .collect();
    fft.frame(&samples, SR)
}

#[test]
fn missed_deadline_carries_previous_value_forward() {
    let (release_tx, release_rx) = flume::unbounded();
    let kinds = [
        FeatureKind::Energy,
        FeatureKind::Bass,
        FeatureKind::Mids,
        FeatureKind::Treble,
    ];
    let analyzers: Vec<Box<dyn FeatureAnalyzer>> = vec![
        analyzer_for(FeatureKind::Energy),
        analyzer_for(FeatureKind::Bass),
        analyzer_for(FeatureKind::Mids),
        Box::new(SlowTreble {
            inner: analyzer_for(FeatureKind::Treble),
            calls: 0,
            release: release_rx,
        }),
    ];
    let pool = AnalyzerPool::spawn_with(analyzers, settings()).unwrap();
    let mut agg = FrameAggregator::new(pool, &kinds).unwrap();
    let mut fft = FftPipeline::new(FFT_SIZE, WindowKind::Hann);

    let first = agg.begin_frame(high_tone_frame(&mut fft)).unwrap();
    let report = agg.finalize(soon()).unwrap();
    assert_eq!(report.id, first);
    assert!(report.is_complete());
    let treble = report.vector.value(FeatureKind::Treble).unwrap();
    assert!(treble > 0.0);

    // second frame is silent, but treble stays stuck until the deadline
    agg.begin_frame(FftFrame::new(vec![0.0; BINS], SR)).unwrap();
    let report = agg
        .finalize(Instant::now() + Duration::from_millis(200))
        .unwrap();
    assert_eq!(
        report.status,
        FrameStatus::Partial {
            missing: vec![FeatureKind::Treble]
        }
    );
    assert_eq!(report.vector.len(), kinds.len());
    assert_eq!(report.vector.value(FeatureKind::Treble), Some(treble));
    assert_eq!(report.vector.value(FeatureKind::Energy), Some(0.0));

    // the late treble answer is for a closed frame and must be discarded
    release_tx.send(()).unwrap();
    let third = agg.begin_frame(FftFrame::new(vec![0.0; BINS], SR)).unwrap();
    release_tx.send(()).unwrap();
    let report = agg.finalize(soon()).unwrap();
    assert_eq!(report.id, third);
    assert!(report.is_complete());
    assert_eq!(report.vector.value(FeatureKind::Treble), Some(0.0));
    assert!(agg.discarded() >= 1);
}

#[test]
fn kind_slower_than_every_deadline_carries_its_latest_late_value() {
    let kinds = [FeatureKind::Bass, FeatureKind::Treble];
    let analyzers: Vec<Box<dyn FeatureAnalyzer>> =
        vec![analyzer_for(FeatureKind::Bass), Box::new(Sluggish)];
    let pool = AnalyzerPool::spawn_with(analyzers, settings()).unwrap();
    let mut agg = FrameAggregator::new(pool, &kinds).unwrap();

    let mut treble = Vec::new();
    for _ in 0..10 {
        agg.begin_frame(FftFrame::new(vec![0.0; BINS], SR)).unwrap();
        let report = agg
            .finalize(Instant::now() + Duration::from_millis(5))
            .unwrap();
        assert_eq!(
            report.status,
            FrameStatus::Partial {
                missing: vec![FeatureKind::Treble]
            }
        );
        treble.push(report.vector.value(FeatureKind::Treble).unwrap());
        std::thread::sleep(Duration::from_millis(60));
    }

    // nothing had answered yet for the first frame
    assert_eq!(treble[0], 0.0);
    assert!(treble[1..].iter().all(|&v| v == 7.0), "{treble:?}");
    assert_eq!(agg.pool().debug(FeatureKind::Treble).unwrap().len(), 10);
    // every late answer is still kept out of its own closed frame
    assert!(agg.discarded() >= 9);
}

#[test]
fn kind_that_never_answered_gets_default_sample() {
    let (release_tx, release_rx) = flume::unbounded::<()>();
    let slow = SlowTreble {
        inner: analyzer_for(FeatureKind::Treble),
        // block from the very first frame
        calls: 1,
        release: release_rx,
    };
    let kinds = [FeatureKind::Bass, FeatureKind::Treble];
    let analyzers: Vec<Box<dyn FeatureAnalyzer>> =
        vec![analyzer_for(FeatureKind::Bass), Box::new(slow)];
    let pool = AnalyzerPool::spawn_with(analyzers, settings()).unwrap();
    let mut agg = FrameAggregator::new(pool, &kinds).unwrap();

    agg.begin_frame(FftFrame::new(vec![0.0; BINS], SR)).unwrap();
    let report = agg
        .finalize(Instant::now() + Duration::from_millis(200))
        .unwrap();
    assert!(!report.is_complete());
    let sample = report.vector.sample(FeatureKind::Treble).unwrap();
    assert_eq!(sample.value, 0.0);
    assert_eq!(sample.stats.normalized, 0.5);
    // unblock the unit so the pool can join it
    drop(release_tx);
}

#[test]
fn high_frequency_tone_moves_only_treble() {
    let config = sx_core::config::PipelineConfig {
        fft_size: FFT_SIZE,
        features: vec![FeatureKind::Bass, FeatureKind::Mids, FeatureKind::Treble],
        ..Default::default()
    };
    let mut agg = FrameAggregator::from_config(&config).unwrap();
    let mut fft = FftPipeline::new(FFT_SIZE, WindowKind::from_config(&config));

    agg.begin_frame(FftFrame::new(vec![0.0; BINS], SR)).unwrap();
    let silent = agg.finalize(soon()).unwrap();
    agg.begin_frame(high_tone_frame(&mut fft)).unwrap();
    let tone = agg.finalize(soon()).unwrap();

    let treble = tone.vector.value(FeatureKind::Treble).unwrap();
    assert_eq!(silent.vector.value(FeatureKind::Treble), Some(0.0));
    assert!(treble > 0.0);
    // only window leakage reaches the lower bands
    assert!(tone.vector.value(FeatureKind::Bass).unwrap() < treble * 0.02);
    assert!(tone.vector.value(FeatureKind::Mids).unwrap() < treble * 0.02);
}

#[test]
fn failing_analyzer_falls_back_to_last_good_value() {
    let kinds = [FeatureKind::SpectralCentroid];
    let pool = AnalyzerPool::spawn_with(vec![Box::new(Brittle { calls: 0 })], settings()).unwrap();
    let mut agg = FrameAggregator::new(pool, &kinds).unwrap();

    for _ in 0..3 {
        agg.begin_frame(FftFrame::new(vec![0.0; BINS], SR)).unwrap();
        let report = agg.finalize(soon()).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.vector.value(FeatureKind::SpectralCentroid), Some(3.0));
    }
    assert_eq!(
        agg.pool().debug(FeatureKind::SpectralCentroid).unwrap(),
        vec![3.0]
    );
}

#[test]
fn uniforms_are_flattened_per_feature() {
    let config = sx_core::config::PipelineConfig {
        fft_size: FFT_SIZE,
        features: vec![FeatureKind::Energy, FeatureKind::SpectralFlux],
        ..Default::default()
    };
    let mut agg = FrameAggregator::from_config(&config).unwrap();
    agg.begin_frame(FftFrame::new(vec![0.0; BINS], SR)).unwrap();
    let uniforms = agg.finalize(soon()).unwrap().vector.uniforms();

    assert_eq!(uniforms.len(), 2 * 9);
    assert_eq!(uniforms["spectralFlux"], 0.0);
    assert_eq!(uniforms["energyNormalized"], 0.5);
    assert_eq!(uniforms["energyZScore"], 0.0);
}
