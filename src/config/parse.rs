use super::types::*;
use crate::config::{expand_env_vars, expand_tilde, is_comment_line, ENV_VAR_PATTERN};
use regex::Regex;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })
}

/// Parse and validate a config document.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    // Expand environment variables in the YAML string before parsing
    let yaml = expand_env_vars(yaml)?;
    check_unexpanded_vars(&yaml)?;

    let mut config: Config = if yaml.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml::from_str(&yaml)?
    };

    config.watch.path = expand_tilde(&config.watch.path);

    validate_config(&config)?;

    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml: &str) -> Result<(), ConfigError> {
    let re = Regex::new(ENV_VAR_PATTERN)?;
    let mut unexpanded: Vec<String> = yaml
        .lines()
        .filter(|line| !is_comment_line(line))
        .flat_map(|line| re.captures_iter(line))
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if unexpanded.is_empty() {
        return Ok(());
    }

    unexpanded.sort();
    unexpanded.dedup();

    Err(ConfigError::Validation(format!(
        "environment variables are not set: {}\n\
         \n\
         Set them (e.g. export {}=/var/log/app.log) or replace them in the config file",
        unexpanded.join(", "),
        unexpanded[0]
    )))
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.watch.path.as_os_str().is_empty() {
        errors.push("watch.path must not be empty".to_string());
    }
    if config.watch.max_lines == 0 {
        errors.push("watch.max_lines must be at least 1".to_string());
    }
    if config.watch.buffer_size == 0 {
        errors.push("watch.buffer_size must be at least 1".to_string());
    }
    if config.watch.cycle_lines == 0 {
        errors.push("watch.cycle_lines must be at least 1".to_string());
    }
    if config.watch.heartbeat_interval.is_zero() {
        errors.push("watch.heartbeat_interval must be greater than zero".to_string());
    }
    if config.rotation.threshold_bytes == 0 {
        errors.push("rotation.threshold_bytes must be at least 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}
