use std::path::{Path, PathBuf};

use crate::config::schema::{Config, LogFormat};
use crate::error::ConfigError;

pub const ENV_HOST: &str = "PRINTHUB_HOST";
pub const ENV_PORT: &str = "PRINTHUB_PORT";
pub const ENV_DATABASE: &str = "PRINTHUB_DATABASE";
pub const ENV_UPLOAD_DIR: &str = "PRINTHUB_UPLOAD_DIR";
pub const ENV_ENFORCE_TRANSITIONS: &str = "PRINTHUB_ENFORCE_TRANSITIONS";
pub const ENV_LOG_FORMAT: &str = "PRINTHUB_LOG_FORMAT";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

/// Applies `PRINTHUB_*` environment variables on top of `config`.
pub fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    apply_overrides_from(config, |name| std::env::var(name).ok())
}

fn apply_overrides_from<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
{
    if let Some(host) = lookup(ENV_HOST) {
        config.server.host = host;
    }
    if let Some(port) = lookup(ENV_PORT) {
        config.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            name: ENV_PORT,
            value: port.clone(),
        })?;
    }
    if let Some(path) = lookup(ENV_DATABASE) {
        config.database.path = Some(PathBuf::from(path));
    }
    if let Some(dir) = lookup(ENV_UPLOAD_DIR) {
        config.storage.upload_dir = PathBuf::from(dir);
    }
    if let Some(flag) = lookup(ENV_ENFORCE_TRANSITIONS) {
        config.dispatch.enforce_transitions = parse_bool(&flag).ok_or(ConfigError::InvalidEnv {
            name: ENV_ENFORCE_TRANSITIONS,
            value: flag.clone(),
        })?;
    }
    if let Some(format) = lookup(ENV_LOG_FORMAT) {
        config.logging.format = match format.trim().to_ascii_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            _ => {
                return Err(ConfigError::InvalidEnv {
                    name: ENV_LOG_FORMAT,
                    value: format,
                })
            }
        };
    }
    Ok(())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    }

    if config.server.max_upload_bytes == 0 {
        return Err(ConfigError::Validation {
            message: "server.maxUploadBytes must be greater than zero".to_string(),
        });
    }

    if config.storage.upload_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation {
            message: "storage.uploadDir must not be empty".to_string(),
        });
    }

    if let Some(path) = &config.database.path {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation {
                message: "database.path must not be empty".to_string(),
            });
        }
    }

    if config.logging.filter.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "logging.filter must not be empty".to_string(),
        });
    }

    Ok(())
}
