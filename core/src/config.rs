//! Process configuration, loaded from an optional YAML file with environment
//! overrides, in the shape of the teacher's `ServerConfig::load`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

fn default_cache_limit_bytes() -> u64 {
    2 * 1024 * 1024 * 1024
}

fn default_auto_disconnect_delay_secs() -> u64 {
    30
}

fn default_queue_page_size() -> usize {
    10
}

/// Process-wide configuration. Per-guild overrides live in [`crate::settings::GuildSettings`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Discord bot token. Override: `DISCORD_TOKEN`.
    pub discord_token: String,

    /// Directory the on-disk file cache is rooted at. Override: `CACHE_DIR`.
    pub cache_dir: PathBuf,

    /// Byte budget for the file cache, accepted as a human size string
    /// (e.g. `"2GB"`) in YAML and parsed via [`parse_byte_size`].
    /// Override: `CACHE_LIMIT`.
    #[serde(default = "default_cache_limit_bytes")]
    pub cache_limit_bytes: u64,

    /// Activity text shown in the bot's presence, if any. Override: `BOT_ACTIVITY_TYPE`.
    pub bot_activity_type: Option<String>,

    /// Default delay before an idle player disconnects, in seconds.
    #[serde(default = "default_auto_disconnect_delay_secs")]
    pub auto_disconnect_delay_secs: u64,

    /// Default number of upcoming tracks shown per queue page.
    #[serde(default = "default_queue_page_size")]
    pub queue_page_size: usize,

    /// Port the health/metrics HTTP surface binds to.
    pub health_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            cache_dir: PathBuf::from("./cache"),
            cache_limit_bytes: default_cache_limit_bytes(),
            bot_activity_type: None,
            auto_disconnect_delay_secs: default_auto_disconnect_delay_secs(),
            queue_page_size: default_queue_page_size(),
            health_port: 8090,
        }
    }
}

impl Config {
    /// Loads configuration from a YAML file (if given), then applies
    /// environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
            serde_yaml::from_str(&contents).map_err(ConfigError::Yaml)?
        } else {
            Self::default()
        };

        if let Ok(token) = std::env::var("DISCORD_TOKEN") {
            config.discord_token = token;
        }
        if let Ok(dir) = std::env::var("CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Ok(limit) = std::env::var("CACHE_LIMIT") {
            config.cache_limit_bytes = parse_byte_size(&limit)
                .map_err(|e| ConfigError::InvalidByteSize(limit.clone(), e))?;
        }
        if let Ok(activity) = std::env::var("BOT_ACTIVITY_TYPE") {
            config.bot_activity_type = Some(activity);
        }
        if let Ok(port) = std::env::var("HEALTH_PORT") {
            config.health_port = port
                .parse()
                .map_err(|_| ConfigError::InvalidByteSize(port.clone(), "not a valid port".into()))?;
        }

        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0:?}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("invalid config YAML: {0}")]
    Yaml(serde_yaml::Error),
    #[error("invalid byte size '{0}': {1}")]
    InvalidByteSize(String, String),
}

/// Parses a human byte-size string (`"2GB"`, `"512MB"`, `"1024"`) into bytes.
pub fn parse_byte_size(input: &str) -> Result<u64, String> {
    let input = input.trim();
    let (digits, unit) = input.split_at(
        input
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(input.len()),
    );
    let value: f64 = digits
        .parse()
        .map_err(|_| format!("'{digits}' is not a number"))?;
    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "KB" => 1024,
        "MB" => 1024 * 1024,
        "GB" => 1024 * 1024 * 1024,
        "TB" => 1024_u64.pow(4),
        other => return Err(format!("unrecognized unit '{other}'")),
    };
    Ok((value * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_bytes() {
        assert_eq!(parse_byte_size("1024").unwrap(), 1024);
    }

    #[test]
    fn parses_gb_suffix() {
        assert_eq!(parse_byte_size("2GB").unwrap(), 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn parses_fractional_mb() {
        assert_eq!(parse_byte_size("1.5MB").unwrap(), (1.5 * 1024.0 * 1024.0) as u64);
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(parse_byte_size("5XB").is_err());
    }

    #[test]
    fn default_config_has_sane_values() {
        let config = Config::default();
        assert_eq!(config.auto_disconnect_delay_secs, 30);
        assert_eq!(config.queue_page_size, 10);
    }
}
