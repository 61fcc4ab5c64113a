use std::path::Path;

use anyhow::{Context, Result};
use core_types::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Stderr-only logging at the default level.
pub fn init_tracing() -> Result<()> {
    init_tracing_with_config(&LoggingConfig::default()).map(drop)
}

/// Install the global subscriber described by `[logging]`.
///
/// `RUST_LOG` overrides the configured level. When a log file is configured
/// the returned guard must be held until exit or buffered lines are lost.
pub fn init_tracing_with_config(cfg: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .with_context(|| format!("invalid log level `{}`", cfg.level))?;

    let (file, guard) = match cfg.file.as_deref() {
        Some(path) => {
            let (layer, guard) = file_layer(Path::new(path), cfg.json)?;
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(file)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init()
        .context("install tracing subscriber")?;
    Ok(guard)
}

fn file_layer(path: &Path, json: bool) -> Result<(BoxedLayer, WorkerGuard)> {
    let name = path
        .file_name()
        .with_context(|| format!("log file `{}` has no file name", path.display()))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create log dir {}", dir.display()))?;

    let appender = tracing_appender::rolling::daily(dir, name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let base = fmt::layer().with_writer(writer).with_ansi(false);
    let layer = if json { base.json().boxed() } else { base.boxed() };
    Ok((layer, guard))
}
