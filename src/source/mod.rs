pub mod classifier;
pub mod tail;

pub use classifier::{LineClassifier, LogRecord, MalformedLine, Severity};
pub use tail::{file_size, TailError, WindowedTailReader};
