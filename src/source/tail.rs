use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

#[derive(Debug, Error)]
pub enum TailError {
    #[error("io error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TailError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        TailError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Reads the last lines of a file through a bounded trailing byte window.
///
/// Only the final `buffer_size` bytes are ever read, so cost does not grow
/// with the file. This is a sampler: if more than `buffer_size` bytes are
/// appended between two reads, the older part of that burst is never seen.
/// The first line of a window may also be the tail end of a longer line.
///
/// No read position is kept between calls. Two reads of an unchanged file
/// return the same lines, so callers see a line again for as long as it
/// stays inside the window.
#[derive(Debug, Clone)]
pub struct WindowedTailReader {
    path: PathBuf,
    buffer_size: u64,
}

impl WindowedTailReader {
    pub fn new(path: impl Into<PathBuf>, buffer_size: u64) -> Self {
        Self {
            path: path.into(),
            buffer_size: buffer_size.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn buffer_size(&self) -> u64 {
        self.buffer_size
    }

    /// Return at most `count` trailing non-empty lines, in file order.
    pub async fn read_last_lines(&self, count: usize) -> Result<Vec<String>, TailError> {
        let window = self.read_window().await?;
        Ok(last_lines(&window, count))
    }

    /// Read the trailing window of raw bytes and decode it as text.
    ///
    /// Undecodable bytes become U+FFFD; the classifier rejects such lines.
    async fn read_window(&self) -> Result<String, TailError> {
        let mut file = File::open(&self.path)
            .await
            .map_err(|e| TailError::io(&self.path, e))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| TailError::io(&self.path, e))?
            .len();

        let start = size.saturating_sub(self.buffer_size);
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|e| TailError::io(&self.path, e))?;

        // The file may keep growing while we read; never take more than the window
        let mut bytes = Vec::with_capacity((size - start) as usize);
        file.take(self.buffer_size)
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| TailError::io(&self.path, e))?;

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Current size of the file in bytes.
pub async fn file_size(path: &Path) -> Result<u64, TailError> {
    tokio::fs::metadata(path)
        .await
        .map(|metadata| metadata.len())
        .map_err(|e| TailError::io(path, e))
}

fn last_lines(text: &str, count: usize) -> Vec<String> {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty())
        .collect();

    let skip = lines.len().saturating_sub(count);
    lines[skip..].iter().map(|line| line.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_lines(lines: &[&str]) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(temp_file, "{}", line).unwrap();
        }
        temp_file.flush().unwrap();
        temp_file
    }

    #[tokio::test]
    async fn test_reads_last_k_lines_in_file_order() {
        let temp_file = write_lines(&["1 a", "2 b", "3 c", "4 d"]);
        let reader = WindowedTailReader::new(temp_file.path(), 16384);

        let lines = reader.read_last_lines(2).await.unwrap();
        assert_eq!(lines, vec!["3 c", "4 d"]);
    }

    #[tokio::test]
    async fn test_fewer_lines_than_requested() {
        let temp_file = write_lines(&["1 a", "2 b"]);
        let reader = WindowedTailReader::new(temp_file.path(), 16384);

        let lines = reader.read_last_lines(10).await.unwrap();
        assert_eq!(lines, vec!["1 a", "2 b"]);
    }

    #[tokio::test]
    async fn test_empty_lines_are_discarded() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "1 a\n\n\r\n2 b\n\n").unwrap();
        temp_file.flush().unwrap();
        let reader = WindowedTailReader::new(temp_file.path(), 16384);

        let lines = reader.read_last_lines(10).await.unwrap();
        assert_eq!(lines, vec!["1 a", "2 b"]);
    }

    #[tokio::test]
    async fn test_window_bounds_what_is_seen() {
        // Each line is 6 bytes including the newline
        let temp_file = write_lines(&["10 aa", "20 bb", "30 cc", "40 dd"]);
        let reader = WindowedTailReader::new(temp_file.path(), 12);

        let lines = reader.read_last_lines(10).await.unwrap();
        assert_eq!(lines, vec!["30 cc", "40 dd"]);
    }

    #[tokio::test]
    async fn test_window_can_start_mid_line() {
        let temp_file = write_lines(&["100 first", "200 second"]);
        let reader = WindowedTailReader::new(temp_file.path(), 14);

        let lines = reader.read_last_lines(10).await.unwrap();
        assert_eq!(lines, vec!["st", "200 second"]);
    }

    #[tokio::test]
    async fn test_unterminated_last_line_is_returned() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "1 a\n2 b").unwrap();
        temp_file.flush().unwrap();
        let reader = WindowedTailReader::new(temp_file.path(), 16384);

        let lines = reader.read_last_lines(10).await.unwrap();
        assert_eq!(lines, vec!["1 a", "2 b"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let reader = WindowedTailReader::new("/nonexistent/tailwatch/test.log", 16384);
        let result = reader.read_last_lines(10).await;
        assert!(matches!(result, Err(TailError::Io { .. })));
    }

    #[tokio::test]
    async fn test_file_size() {
        let temp_file = write_lines(&["1 a"]);
        assert_eq!(file_size(temp_file.path()).await.unwrap(), 4);
    }
}
