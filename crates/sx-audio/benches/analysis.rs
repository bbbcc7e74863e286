use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use sx_audio::StatsTracker;
use sx_audio::analyzers::analyzer_for;
use sx_audio::fft::FftPipeline;
use sx_audio::window::WindowKind;
use sx_core::feature::FeatureKind;
use sx_core::frame::FftFrame;

fn test_signal(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f32 / 44_100.0;
            (std::f32::consts::TAU * 440.0 * t).sin() * 0.6
                + (std::f32::consts::TAU * 6_000.0 * t).sin() * 0.2
        })
        .collect()
}

fn bench_window(c: &mut Criterion) {
    let kaiser = WindowKind::Kaiser { beta: 5.658 };
    c.bench_function("kaiser_coefficients_2048", |b| {
        b.iter(|| kaiser.coefficients(black_box(2048)));
    });
}

fn bench_fft(c: &mut Criterion) {
    let signal = test_signal(2048);
    let mut fft = FftPipeline::new(2048, WindowKind::Kaiser { beta: 5.658 });
    c.bench_function("fft_2048", |b| {
        b.iter(|| fft.process(black_box(&signal)));
    });
}

fn bench_analyzers(c: &mut Criterion) {
    let mut fft = FftPipeline::new(2048, WindowKind::Kaiser { beta: 5.658 });
    let frame: FftFrame = fft.frame(&test_signal(2048), 44_100);

    let mut group = c.benchmark_group("analyzers");
    for kind in FeatureKind::ALL {
        let mut analyzer = analyzer_for(kind);
        group.bench_function(kind.as_str(), |b| {
            b.iter(|| analyzer.compute(black_box(&frame)));
        });
    }
    group.finish();
}

fn bench_stats(c: &mut Criterion) {
    let mut tracker = StatsTracker::new(500);
    for i in 0..500 {
        tracker.push(f64::from(i).sin());
    }
    let mut x = 0.0f64;
    c.bench_function("stats_push_500", |b| {
        b.iter(|| {
            x += 0.1;
            tracker.push(black_box(x.sin()))
        });
    });
}

criterion_group!(benches, bench_window, bench_fft, bench_analyzers, bench_stats);
criterion_main!(benches);
