pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# TAILWATCH CONFIGURATION
# =============================================================================
# Every setting is optional; the values below are the built-in defaults.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/tailwatch/config.yml
#   3. /etc/tailwatch/config.yml
#
# Environment variables can be referenced as $env{NAME}.

# =============================================================================
# WATCH
# =============================================================================
watch:
  # Log file to follow. Lines may start with a numeric timestamp and carry an
  # [ERROR] or [WARNING] tag, e.g. "1700000000000 [ERROR] Database query failed"
  path: test.log

  # Number of recent records kept in memory
  max_lines: 1000

  # Only the last buffer_size bytes are read on each pass. Lines appended
  # faster than this between two passes are skipped, not queued.
  buffer_size: 16384

  # Trailing lines read on each file change
  cycle_lines: 10

  # Liveness check period. With no completed read for 3 intervals the
  # watcher reports a stall and restarts itself.
  heartbeat_interval: 1s

# =============================================================================
# ROTATION
# =============================================================================
rotation:
  # Once the file reaches this size it is renamed to <path>.<unix-millis>
  # and an empty file is created in its place
  threshold_bytes: 5242880

  # Gzip rotated files to <path>.<unix-millis>.gz in the background
  compression: false
"#
    .to_string()
}
