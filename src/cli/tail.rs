use crate::cli::run::effective_config;
use crate::source::{LineClassifier, LogRecord, WindowedTailReader};
use std::path::PathBuf;
use tracing::debug;

/// Print the last `lines` classified records of the watched file once, then exit.
pub async fn tail(
    config_path: Option<PathBuf>,
    path_override: Option<PathBuf>,
    lines: Option<usize>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = effective_config(config_path.as_deref(), path_override)?;
    let count = lines.unwrap_or(config.watch.max_lines);

    let reader = WindowedTailReader::new(&config.watch.path, config.watch.buffer_size);
    let records = read_records(&reader, count, chrono::Utc::now().timestamp_millis()).await?;

    for record in &records {
        if json {
            println!("{}", serde_json::to_string(record)?);
        } else {
            println!("{:<7} {}", record.severity, record.content);
        }
    }

    Ok(())
}

async fn read_records(
    reader: &WindowedTailReader,
    count: usize,
    now_millis: i64,
) -> Result<Vec<LogRecord>, crate::source::TailError> {
    let classifier = LineClassifier::new();
    let lines = reader.read_last_lines(count).await?;

    Ok(lines
        .iter()
        .filter_map(|line| match classifier.classify(line, now_millis) {
            Ok(record) => Some(record),
            Err(reason) => {
                debug!(reason = %reason, "Skipping malformed line");
                None
            }
        })
        .collect())
}
