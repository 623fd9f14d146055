use std::{path::Path, sync::LazyLock};

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;

/// Sets up daily rolling log files under `<data dir>/logs`. There is no
/// console attached to a menu bar process, so everything goes to files.
/// `RUST_LOG` overrides the default level.
pub fn enable_logging(application_data_path: &Path) -> Result<()> {
    let appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(5)
        .filename_prefix("deepwork")
        .build(application_data_path.join("logs"))?;

    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(format!(
            "{}={level}",
            env!("CARGO_PKG_NAME"),
        )))
        .with_writer(appender)
        .with_ansi(false)
        .init();
    Ok(())
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .pretty()
        .init()
});
