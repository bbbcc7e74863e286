use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use arc_swap::ArcSwap;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use sx_core::config::PipelineConfig;

use crate::cli::ConfigOverrides;

/// Watch the config file and publish every successfully parsed revision.
///
/// Returns the watcher, which must stay alive as long as reloading is wanted.
/// A revision that fails to parse is logged and the previous config kept.
/// `overrides` are applied on top of every revision.
///
/// # Errors
/// Returns an error if the watcher cannot be created or the path cannot be watched.
pub fn spawn_config_watcher(
    config_path: &Path,
    config: &Arc<ArcSwap<PipelineConfig>>,
    overrides: ConfigOverrides,
) -> Result<impl Watcher + use<>> {
    let config = Arc::clone(config);
    let path = config_path.to_path_buf();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        if let Ok(event) = res
            && matches!(event.kind, EventKind::Modify(_))
        {
            match reload_config(&path, overrides) {
                Ok(new_config) => {
                    config.store(Arc::new(new_config));
                    log::info!("Config reloaded from {}", path.display());
                }
                Err(e) => log::warn!("Config reload failed, keeping previous: {e:#}"),
            }
        }
    })?;

    watcher.watch(config_path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Load `path` and apply the command-line overrides.
///
/// # Errors
/// Any error from [`sx_core::config::load_config`].
pub fn reload_config(path: &Path, overrides: ConfigOverrides) -> Result<PipelineConfig> {
    let mut config = sx_core::config::load_config(path)?;
    overrides.apply(&mut config);
    Ok(config)
}
