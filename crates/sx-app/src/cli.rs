use std::path::PathBuf;

use clap::Parser;
use sx_core::config::PipelineConfig;

/// spectrex: real-time spectral features for audio-reactive renderers.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Audio file to analyse (WAV, MP3, FLAC, OGG, AAC). Loops forever.
    #[arg(long)]
    pub audio: Option<PathBuf>,

    /// Analyse a generated sine tone at this frequency (Hz) instead of a file.
    #[arg(long)]
    pub tone: Option<f32>,

    /// TOML configuration file. Watched and hot-reloaded.
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Override `[output] target_fps`.
    #[arg(long)]
    pub fps: Option<u32>,

    /// Stop after this many frames (runs until interrupted otherwise).
    #[arg(long)]
    pub frames: Option<u64>,

    /// Read JSON control messages, one per line, from stdin.
    #[arg(long, default_value_t = false)]
    pub control_stdin: bool,

    /// Log level: error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

/// Command-line settings that win over the config file, on every reload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// `--fps`
    pub target_fps: Option<u32>,
}

impl ConfigOverrides {
    /// Write the overrides into `config` and re-clamp it.
    pub fn apply(self, config: &mut PipelineConfig) {
        if let Some(fps) = self.target_fps {
            config.target_fps = fps;
            config.clamp_all();
        }
    }
}

impl Cli {
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            target_fps: self.fps,
        }
    }

    /// Validate that exactly one signal source is provided.
    ///
    /// # Errors
    /// Returns an error if zero or both sources are specified, or the tone
    /// frequency is not a positive number.
    pub fn validate_source(&self) -> anyhow::Result<()> {
        match (&self.audio, self.tone) {
            (None, None) => anyhow::bail!("No signal source. Use --audio <file> or --tone <hz>."),
            (Some(_), Some(_)) => anyhow::bail!("Use either --audio or --tone, not both."),
            (None, Some(hz)) if !(hz.is_finite() && hz > 0.0) => {
                anyhow::bail!("Tone frequency must be a positive number, got {hz}")
            }
            _ => Ok(()),
        }
    }
}
