use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RotationError {
    #[error("failed to stat '{}': {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to rename '{}' to '{}': {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("rotated to '{}' but failed to recreate '{}': {source}", rotated.display(), path.display())]
    Recreate {
        path: PathBuf,
        rotated: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `<original>.<unix-millis>`
pub fn rotated_path(path: &Path, millis: i64) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{}", millis));
    PathBuf::from(name)
}

/// Rotate `path` if it has reached `threshold_bytes`, using the current time
/// for the rotated file's suffix.
pub async fn check_and_rotate(
    path: &Path,
    threshold_bytes: u64,
) -> Result<Option<PathBuf>, RotationError> {
    check_and_rotate_at(path, threshold_bytes, chrono::Utc::now().timestamp_millis()).await
}

/// Rotate `path` if its size is at least `threshold_bytes`.
///
/// The file is renamed to `<path>.<millis>` and an empty file is created in
/// its place. Returns the rotated path, or `None` when under the threshold.
/// A failed rename leaves the original untouched for the next attempt.
pub async fn check_and_rotate_at(
    path: &Path,
    threshold_bytes: u64,
    millis: i64,
) -> Result<Option<PathBuf>, RotationError> {
    let size = tokio::fs::metadata(path)
        .await
        .map_err(|source| RotationError::Stat {
            path: path.to_path_buf(),
            source,
        })?
        .len();

    if size < threshold_bytes {
        return Ok(None);
    }

    let rotated = rotated_path(path, millis);
    tokio::fs::rename(path, &rotated)
        .await
        .map_err(|source| RotationError::Rename {
            from: path.to_path_buf(),
            to: rotated.clone(),
            source,
        })?;

    tokio::fs::File::create(path)
        .await
        .map_err(|source| RotationError::Recreate {
            path: path.to_path_buf(),
            rotated: rotated.clone(),
            source,
        })?;

    info!(
        path = %path.display(),
        rotated = %rotated.display(),
        size,
        threshold_bytes,
        "Rotated log file"
    );

    Ok(Some(rotated))
}
