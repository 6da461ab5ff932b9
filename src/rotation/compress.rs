use flate2::write::GzEncoder;
use flate2::Compression;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("failed to open '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to compress '{}' into '{}': {source}", path.display(), destination.display())]
    Stream {
        path: PathBuf,
        destination: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("compressed '{}' but failed to remove it: {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("compression task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// `<rotated>.gz`
pub fn compressed_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".gz");
    PathBuf::from(name)
}

/// Gzip a rotated file into its `.gz` sibling, then delete the original.
///
/// The original is removed only after the compressed stream has been
/// finished and synced to disk. On any stream failure the original is kept.
/// Runs on the blocking pool; callers spawn it and do not wait.
pub async fn compress_file(path: &Path) -> Result<PathBuf, CompressionError> {
    let source = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        compress_with(&source, |destination| {
            let file = File::create(destination)?;
            Ok(SyncedFile(BufWriter::new(file)))
        })
    })
    .await?
}

/// Writer that syncs the underlying file to disk when flushed.
struct SyncedFile(BufWriter<File>);

impl Write for SyncedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()?;
        self.0.get_ref().sync_all()
    }
}

fn compress_with<W, F>(path: &Path, open_destination: F) -> Result<PathBuf, CompressionError>
where
    W: Write,
    F: FnOnce(&Path) -> io::Result<W>,
{
    let destination = compressed_path(path);

    let input = File::open(path).map_err(|source| CompressionError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let stream_error = |source| CompressionError::Stream {
        path: path.to_path_buf(),
        destination: destination.clone(),
        source,
    };

    let result = open_destination(&destination).and_then(|output| {
        let mut encoder = GzEncoder::new(output, Compression::default());
        io::copy(&mut BufReader::new(input), &mut encoder)?;
        let mut output = encoder.finish()?;
        output.flush()
    });

    if let Err(source) = result {
        warn!(
            path = %path.display(),
            error = %source,
            "Compression failed, keeping uncompressed file"
        );
        if let Err(e) = std::fs::remove_file(&destination) {
            debug!(destination = %destination.display(), error = %e, "No partial archive to clean up");
        }
        return Err(stream_error(source));
    }

    std::fs::remove_file(path).map_err(|source| CompressionError::Remove {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        path = %path.display(),
        destination = %destination.display(),
        "Compressed rotated log file"
    );

    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    /// Accepts a few bytes, then fails every write.
    struct FailingWriter {
        accepted: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.accepted > 8 {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.accepted += buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn rotated_file(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("app.log.1700000000000");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_compressed_path() {
        assert_eq!(
            compressed_path(Path::new("/tmp/app.log.17")),
            PathBuf::from("/tmp/app.log.17.gz")
        );
    }

    #[tokio::test]
    async fn test_compress_replaces_file_with_archive() {
        let dir = TempDir::new().unwrap();
        let content = "100 [INFO] a\n200 [ERROR] b\n".repeat(50);
        let path = rotated_file(&dir, &content);

        let archive = compress_file(&path).await.unwrap();

        assert_eq!(archive, compressed_path(&path));
        assert!(!path.exists());

        let mut decoded = String::new();
        GzDecoder::new(File::open(&archive).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, content);
    }

    #[test]
    fn test_stream_error_keeps_uncompressed_file() {
        let dir = TempDir::new().unwrap();
        let content = "300 [WARNING] c\n".repeat(4096);
        let path = rotated_file(&dir, &content);

        let result = compress_with(&path, |_| Ok(FailingWriter { accepted: 0 }));

        assert!(matches!(result, Err(CompressionError::Stream { .. })));
        assert!(path.exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
    }

    #[tokio::test]
    async fn test_unwritable_destination_keeps_uncompressed_file() {
        let dir = TempDir::new().unwrap();
        let path = rotated_file(&dir, "1 [INFO] x\n");
        std::fs::create_dir(compressed_path(&path)).unwrap();

        let result = compress_file(&path).await;

        assert!(matches!(result, Err(CompressionError::Stream { .. })));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_missing_source_is_open_error() {
        let dir = TempDir::new().unwrap();
        let result = compress_file(&dir.path().join("gone.log.1")).await;
        assert!(matches!(result, Err(CompressionError::Open { .. })));
    }
}
