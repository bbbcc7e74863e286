use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use sx_audio::decode::DecodedAudio;
use sx_audio::fft::FftPipeline;
use sx_audio::window::WindowKind;
use sx_core::config::PipelineConfig;
use sx_core::frame::FftFrame;
use triple_buffer::TripleBuffer;

/// Sample rate of generated tones.
pub const TONE_SAMPLE_RATE: u32 = 44_100;

/// Where the analysed signal comes from.
pub enum Signal {
    /// A decoded file, played in a loop.
    File(DecodedAudio),
    /// A pure sine at `hz`, amplitude 0.5.
    Tone { hz: f32 },
}

impl Signal {
    fn sample_rate(&self) -> u32 {
        match self {
            Self::File(audio) => audio.sample_rate,
            Self::Tone { .. } => TONE_SAMPLE_RATE,
        }
    }

    /// Fill `out` with the samples ending just before position `end`.
    fn fill_window(&self, end: usize, out: &mut [f32]) {
        let start = end as i64 - out.len() as i64;
        match self {
            Self::File(audio) => {
                let total = audio.samples.len() as i64;
                for (i, slot) in out.iter_mut().enumerate() {
                    *slot = audio.samples[(start + i as i64).rem_euclid(total) as usize];
                }
            }
            Self::Tone { hz } => {
                let step = std::f64::consts::TAU * f64::from(*hz) / f64::from(TONE_SAMPLE_RATE);
                for (i, slot) in out.iter_mut().enumerate() {
                    *slot = (0.5 * ((start + i as i64) as f64 * step).sin()) as f32;
                }
            }
        }
    }

    fn len(&self) -> Option<usize> {
        match self {
            Self::File(audio) => Some(audio.samples.len()),
            Self::Tone { .. } => None,
        }
    }
}

/// Producer thread publishing the latest spectrum at the configured rate.
pub struct SpectrumSource {
    output: triple_buffer::Output<FftFrame>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SpectrumSource {
    /// Start analysing `signal` with the FFT settings of `config`.
    ///
    /// # Errors
    /// Returns an error if the thread cannot be spawned or the file is empty.
    pub fn spawn(signal: Signal, config: &PipelineConfig) -> anyhow::Result<Self> {
        if signal.len() == Some(0) {
            anyhow::bail!("Audio signal is empty");
        }

        let fft_size = config.fft_size;
        let window = WindowKind::from_config(config);
        let sample_rate = signal.sample_rate();
        let fps = config.target_fps.max(1);

        let (mut input, output) =
            TripleBuffer::new(&FftFrame::new(vec![0.0; fft_size / 2 + 1], sample_rate)).split();
        let running = Arc::new(AtomicBool::new(true));
        let running_thread = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name("sx-source".to_string())
            .spawn(move || {
                let mut fft = FftPipeline::new(fft_size, window);
                let mut buf = vec![0.0f32; fft_size];
                let hop = (sample_rate / fps).max(1) as usize;
                let period = Duration::from_secs_f64(1.0 / f64::from(fps));
                let mut pos = fft_size;

                while running_thread.load(Ordering::Relaxed) {
                    let tick = Instant::now();
                    signal.fill_window(pos, &mut buf);
                    input.write(fft.frame(&buf, sample_rate));

                    pos += hop;
                    if let Some(total) = signal.len() {
                        pos %= total.max(fft_size);
                    }
                    thread::sleep(period.saturating_sub(tick.elapsed()));
                }
                log::debug!("Spectrum source stopped");
            })?;

        log::info!("Spectrum source started @ {sample_rate}Hz, FFT {fft_size}, {fps} fps");

        Ok(Self {
            output,
            running,
            thread: Some(thread),
        })
    }

    /// Most recent spectrum published by the producer.
    pub fn latest(&mut self) -> &FftFrame {
        self.output.read()
    }
}

impl Drop for SpectrumSource {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            log::warn!("Spectrum source thread panicked");
        }
    }
}
