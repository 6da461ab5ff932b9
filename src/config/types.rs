use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PATH: &str = "test.log";
pub const DEFAULT_MAX_LINES: usize = 1000;
pub const DEFAULT_BUFFER_SIZE: u64 = 16 * 1024;
pub const DEFAULT_CYCLE_LINES: usize = 10;
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_ROTATION_THRESHOLD: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub rotation: RotationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Records retained in the history
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    /// Trailing byte window read per tail
    #[serde(default = "default_buffer_size")]
    pub buffer_size: u64,
    /// Lines read per watch cycle
    #[serde(default = "default_cycle_lines")]
    pub cycle_lines: usize,
    #[serde(default = "default_heartbeat_interval", with = "humantime_serde")]
    pub heartbeat_interval: Duration,
}

fn default_path() -> PathBuf {
    PathBuf::from(DEFAULT_PATH)
}

fn default_max_lines() -> usize {
    DEFAULT_MAX_LINES
}

fn default_buffer_size() -> u64 {
    DEFAULT_BUFFER_SIZE
}

fn default_cycle_lines() -> usize {
    DEFAULT_CYCLE_LINES
}

fn default_heartbeat_interval() -> Duration {
    DEFAULT_HEARTBEAT_INTERVAL
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            max_lines: DEFAULT_MAX_LINES,
            buffer_size: DEFAULT_BUFFER_SIZE,
            cycle_lines: DEFAULT_CYCLE_LINES,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RotationConfig {
    #[serde(default = "default_threshold_bytes")]
    pub threshold_bytes: u64,
    /// Gzip rotated files in the background
    #[serde(default)]
    pub compression: bool,
}

fn default_threshold_bytes() -> u64 {
    DEFAULT_ROTATION_THRESHOLD
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            threshold_bytes: DEFAULT_ROTATION_THRESHOLD,
            compression: false,
        }
    }
}
