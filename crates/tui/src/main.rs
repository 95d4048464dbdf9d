mod picker;
mod shell;

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io,
    sync::Arc,
};

use railbook_core::{
    config::{self, AppConfig},
    CsvFileStore,
};
use tracing::info;
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};

use crate::shell::{Shell, Stores};

fn main() -> Result<()> {
    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    init_logging(&config)?;

    let timeout = config.lock_timeout();
    let stores = Stores {
        catalog: Arc::new(CsvFileStore::new(config.trains_path()).with_lock_timeout(timeout)),
        bookings: Arc::new(CsvFileStore::new(config.bookings_path()).with_lock_timeout(timeout)),
        users: Arc::new(CsvFileStore::new(config.users_path()).with_lock_timeout(timeout)),
    };
    let rich_input = picker::rich_input_available(config.rich_input);
    info!(
        data_dir = %config.data_dir.display(),
        rich_input,
        "Starting railbook"
    );

    let stdin = io::stdin();
    let mut shell = Shell::new(stdin.lock(), io::stdout(), &config, stores, rich_input);
    shell.run()
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let log_dir = config.data_dir.join("logs");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    let log_path = log_dir.join("railbook.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(io::stderr)
        .with_filter(LevelFilter::WARN);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}
