use std::sync::Arc;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use clap::Parser;
use sx_core::config::PipelineConfig;

pub mod app;
pub mod cli;
pub mod control;
pub mod hotreload;
pub mod source;

fn main() -> Result<()> {
    // 1. CLI
    let cli = cli::Cli::parse();

    // 2. Logging, to stderr so stdout stays pure JSON
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Source
    cli.validate_source()?;

    // 4. Config + CLI overrides
    let overrides = cli.overrides();
    let mut config = resolve_config(&cli)?;
    overrides.apply(&mut config);
    let config = Arc::new(ArcSwap::from_pointee(config));

    // 5. Hot reload; a missing file simply means no reloading
    let _watcher = if cli.config.exists() {
        Some(hotreload::spawn_config_watcher(&cli.config, &config, overrides)?)
    } else {
        None
    };

    // 6. Producer thread
    let signal = match (&cli.audio, cli.tone) {
        (Some(path), _) => source::Signal::File(sx_audio::decode::decode_file(path)?),
        (None, Some(hz)) => source::Signal::Tone { hz },
        (None, None) => anyhow::bail!("No signal source"),
    };
    let spectrum = source::SpectrumSource::spawn(signal, &config.load())
        .context("Cannot start spectrum source")?;

    // 7. Control input
    let controls = if cli.control_stdin {
        Some(control::spawn_stdin_reader()?)
    } else {
        None
    };

    // 8. Main loop
    let mut app_instance = app::App::new(config, spectrum, controls, cli.frames)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    app_instance.run(&mut out)
}

/// Load `--config` if present, defaults otherwise.
fn resolve_config(cli: &cli::Cli) -> Result<PipelineConfig> {
    if cli.config.exists() {
        sx_core::config::load_config(&cli.config)
    } else {
        log::warn!(
            "Config not found: {}. Using defaults.",
            cli.config.display()
        );
        Ok(PipelineConfig::default())
    }
}
