use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::feature::FeatureKind;

/// Reference Kaiser β: moderate side-lobe / main-lobe tradeoff.
pub const DEFAULT_KAISER_BETA: f64 = 5.658;
/// Largest accepted Kaiser β.
pub const MAX_KAISER_BETA: f64 = 40.0;

/// Complete pipeline configuration, hot-reloadable.
///
/// Serializable to TOML. Every field has a sane default.
///
/// # Example
/// ```
/// use sx_core::config::PipelineConfig;
/// let config = PipelineConfig::default();
/// assert_eq!(config.history_size, 500);
/// assert_eq!(config.features.len(), 13);
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PipelineConfig {
    // === Analysis ===
    /// Capacity of every statistics tracker.
    pub history_size: usize,
    /// Budget between `begin_frame` and `finalize`, in milliseconds.
    pub deadline_ms: u64,
    /// Feature kinds to spawn units for.
    pub features: Vec<FeatureKind>,

    // === FFT ===
    /// FFT window length in samples (power of two).
    pub fft_size: usize,
    /// Taper applied before the FFT.
    pub window: WindowMode,
    /// Kaiser shape parameter, used when `window` is `Kaiser`.
    pub kaiser_beta: f64,

    // === Output ===
    /// Render ticks per second.
    pub target_fps: u32,
}

/// Window taper selection.
///
/// # Example
/// ```
/// use sx_core::config::WindowMode;
/// assert!(matches!(WindowMode::default(), WindowMode::Kaiser));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum WindowMode {
    /// No taper.
    Rectangular,
    /// Raised cosine.
    Hann,
    /// Kaiser–Bessel, shaped by `kaiser_beta`.
    #[default]
    Kaiser,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_size: 500,
            deadline_ms: 8,
            features: FeatureKind::ALL.to_vec(),
            fft_size: 2048,
            window: WindowMode::Kaiser,
            kaiser_beta: DEFAULT_KAISER_BETA,
            target_fps: 60,
        }
    }
}

impl PipelineConfig {
    /// Clamp all numeric fields to their valid ranges.
    /// Called after TOML deserialization to prevent out-of-range values.
    pub fn clamp_all(&mut self) {
        self.history_size = self.history_size.clamp(1, 100_000);
        self.deadline_ms = self.deadline_ms.clamp(1, 1000);
        self.fft_size = self.fft_size.clamp(64, 16_384).next_power_of_two();
        self.kaiser_beta = if self.kaiser_beta.is_finite() {
            self.kaiser_beta.clamp(0.0, MAX_KAISER_BETA)
        } else {
            DEFAULT_KAISER_BETA
        };
        self.target_fps = self.target_fps.clamp(1, 240);

        self.features.sort_unstable();
        self.features.dedup();
        if self.features.is_empty() {
            log::warn!("No feature configured, falling back to every kind");
            self.features = FeatureKind::ALL.to_vec();
        }
    }

    /// Deadline as a `Duration`.
    #[must_use]
    pub fn deadline(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.deadline_ms)
    }
}

/// Intermediate TOML structure, every section optional.
#[derive(Deserialize)]
struct ConfigFile {
    analysis: Option<AnalysisSection>,
    fft: Option<FftSection>,
    output: Option<OutputSection>,
}

#[derive(Deserialize)]
struct AnalysisSection {
    history_size: Option<usize>,
    deadline_ms: Option<u64>,
    features: Option<Vec<FeatureKind>>,
}

#[derive(Deserialize)]
struct FftSection {
    size: Option<usize>,
    window: Option<WindowMode>,
    kaiser_beta: Option<f64>,
}

#[derive(Deserialize)]
struct OutputSection {
    target_fps: Option<u32>,
}

/// Parse TOML text and merge it over the defaults.
///
/// # Errors
/// Returns an error if the text is not valid TOML for this schema.
///
/// # Example
/// ```
/// use sx_core::config::parse_config;
/// let config = parse_config("[analysis]\nhistory_size = 64\n").unwrap();
/// assert_eq!(config.history_size, 64);
/// assert_eq!(config.fft_size, 2048);
/// ```
pub fn parse_config(content: &str) -> Result<PipelineConfig> {
    let file: ConfigFile = toml::from_str(content).context("TOML parse error")?;
    let mut config = PipelineConfig::default();

    if let Some(a) = file.analysis {
        if let Some(v) = a.history_size {
            config.history_size = v;
        }
        if let Some(v) = a.deadline_ms {
            config.deadline_ms = v;
        }
        if let Some(v) = a.features {
            config.features = v;
        }
    }
    if let Some(f) = file.fft {
        if let Some(v) = f.size {
            config.fft_size = v;
        }
        if let Some(v) = f.window {
            config.window = v;
        }
        if let Some(v) = f.kaiser_beta {
            config.kaiser_beta = v;
        }
    }
    if let Some(o) = file.output
        && let Some(v) = o.target_fps
    {
        config.target_fps = v;
    }

    config.clamp_all();
    Ok(config)
}

/// Load a TOML file and merge it over the defaults.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
///
/// # Example
/// ```no_run
/// use sx_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config in {}", path.display()))
}
