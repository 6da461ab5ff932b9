use crate::config::parse::{load_config, validate_config, ConfigError};
use crate::config::{expand_tilde, Config};
use crate::watcher::{self, EventBus, WatchContext, WatchError, WatchEvent, WatchSupervisor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Events buffered per subscriber before a slow printer starts losing them
const EVENT_BUFFER: usize = 1024;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("watcher error: {0}")]
    Watcher(#[from] WatchError),

    #[error("signal handler error: {0}")]
    Signal(#[from] std::io::Error),
}

/// Load the effective config: file if one was found, otherwise defaults,
/// then the `--path` override.
pub fn effective_config(
    config_path: Option<&Path>,
    path_override: Option<PathBuf>,
) -> Result<Config, ConfigError> {
    let mut config = match config_path {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            load_config(path)?
        }
        None => {
            info!("No config file found, using defaults");
            Config::default()
        }
    };

    if let Some(path) = path_override {
        config.watch.path = expand_tilde(&path);
    }

    validate_config(&config)?;
    Ok(config)
}

pub async fn run(
    config_path: Option<PathBuf>,
    path_override: Option<PathBuf>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    run_watcher(config_path.as_deref(), path_override, json)
        .await
        .map_err(|e| e.into())
}

async fn run_watcher(
    config_path: Option<&Path>,
    path_override: Option<PathBuf>,
    json: bool,
) -> Result<(), RunError> {
    let config = effective_config(config_path, path_override)?;

    let bus = EventBus::new(EVENT_BUFFER);
    let printer = tokio::spawn(print_events(bus.subscribe(), json));

    let supervisor = WatchSupervisor::new(&config, WatchContext::system(Arc::new(bus)));
    info!(
        watcher = %supervisor.id(),
        path = %config.watch.path.display(),
        max_lines = config.watch.max_lines,
        threshold_bytes = config.rotation.threshold_bytes,
        compression = config.rotation.compression,
        "Starting watcher, press Ctrl+C to shutdown"
    );

    let mut handle = watcher::spawn(supervisor);

    let finished = tokio::select! {
        signal = signal::ctrl_c() => {
            signal?;
            None
        }
        result = handle.finished() => Some(result),
    };

    let result = match finished {
        Some(result) => result,
        None => {
            info!("Shutdown signal received");
            handle.stop().await
        }
    };

    // The bus closes once the supervisor is dropped, which ends the printer
    if let Err(e) = printer.await {
        warn!(error = %e, "Event printer task failed");
    }

    match &result {
        Ok(()) => info!("Watcher shutdown complete"),
        // A watcher that cannot (re)start is fatal for the process
        Err(e) => error!(error = %e, "Watcher exited with error"),
    }

    Ok(result?)
}

async fn print_events(mut events: broadcast::Receiver<WatchEvent>, json: bool) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if json {
                    match serde_json::to_string(&event) {
                        Ok(line) => println!("{}", line),
                        Err(e) => warn!(error = %e, "Failed to serialize event"),
                    }
                } else {
                    println!("{}", describe(&event));
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event printer fell behind, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn describe(event: &WatchEvent) -> String {
    match event {
        WatchEvent::Snapshot { records, stats } | WatchEvent::Update { records, stats } => {
            let mut out = format!(
                "{}: {} record(s), total={} errors={} warnings={}",
                event.name(),
                records.len(),
                stats.total_lines,
                stats.error_count,
                stats.warning_count
            );
            for record in records {
                out.push_str(&format!("\n  {:<7} {}", record.severity, record.content));
            }
            out
        }
        WatchEvent::Rotated { path } => format!("rotated: {}", path.display()),
        WatchEvent::Error { message } => format!("error: {}", message),
        other => other.name().to_string(),
    }
}
