pub mod compress;
pub mod monitor;

pub use compress::{compress_file, compressed_path, CompressionError};
pub use monitor::{check_and_rotate, check_and_rotate_at, rotated_path, RotationError};
