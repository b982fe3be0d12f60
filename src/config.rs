//! Configuration loader and validator for the message sweeper.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::fetcher::MAX_PAGE_SIZE;

/// Environment variable that overrides `gateway.token`.
pub const TOKEN_ENV: &str = "TG_SWEEPER_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub gateway: Gateway,
    #[serde(default)]
    pub cleaner: Cleaner,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    #[serde(default = "default_cutoff_days")]
    pub default_cutoff_days: u32,
}

/// HTTP gateway fronting the user's Telegram session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Gateway {
    pub base_url: String,
    #[serde(default)]
    pub token: String,
}

/// Paging and chunking knobs for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cleaner {
    #[serde(default = "default_chunk_size")]
    pub search_chunk_size: usize,
    #[serde(default = "default_chunk_size")]
    pub delete_chunk_size: usize,
}

impl Default for Cleaner {
    fn default() -> Self {
        Self {
            search_chunk_size: default_chunk_size(),
            delete_chunk_size: default_chunk_size(),
        }
    }
}

fn default_cutoff_days() -> u32 {
    7
}

fn default_chunk_size() -> usize {
    100
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    /// SQLite URL of the deletion journal inside `app.data_dir`.
    pub fn journal_url(&self) -> String {
        format!(
            "sqlite://{}/sweeper.db",
            self.app.data_dir.trim_end_matches('/')
        )
    }

    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.trim().is_empty() {
                self.gateway.token = token;
            }
        }
    }
}

/// Load configuration from a YAML file, apply environment overrides and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    cfg.apply_env();
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.default_cutoff_days == 0 {
        return Err(ConfigError::Invalid("app.default_cutoff_days must be > 0"));
    }

    let base = cfg.gateway.base_url.trim();
    if base.is_empty() {
        return Err(ConfigError::Invalid("gateway.base_url must be non-empty"));
    }
    if reqwest::Url::parse(base).is_err() {
        return Err(ConfigError::Invalid("gateway.base_url must be an absolute URL"));
    }
    if cfg.gateway.token.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "gateway.token must be non-empty (or set TG_SWEEPER_TOKEN)",
        ));
    }

    if cfg.cleaner.search_chunk_size == 0 || cfg.cleaner.search_chunk_size > MAX_PAGE_SIZE {
        return Err(ConfigError::Invalid(
            "cleaner.search_chunk_size must be between 1 and 100",
        ));
    }
    if cfg.cleaner.delete_chunk_size == 0 {
        return Err(ConfigError::Invalid("cleaner.delete_chunk_size must be > 0"));
    }

    Ok(())
}

/// Returns the example YAML content shipped with the tool.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  default_cutoff_days: 7

gateway:
  base_url: "http://127.0.0.1:8081/"
  token: "YOUR_USER_SESSION_TOKEN"

cleaner:
  search_chunk_size: 100
  delete_chunk_size: 100
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.cleaner.search_chunk_size, 100);
        assert_eq!(cfg.app.default_cutoff_days, 7);
    }

    #[test]
    fn cleaner_section_defaults_when_missing() {
        let yaml = r#"app:
  data_dir: "./data"
gateway:
  base_url: "http://localhost:8081/"
  token: "t"
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.cleaner, Cleaner::default());
        assert_eq!(cfg.app.default_cutoff_days, 7);
    }

    #[test]
    fn search_chunk_size_above_window_is_rejected() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.cleaner.search_chunk_size = 150;
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("search_chunk_size")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_gateway_settings() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.gateway.token = "  ".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("gateway.token")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.gateway.base_url = "not a url".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.cleaner.delete_chunk_size = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.default_cutoff_days = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn journal_url_lives_in_data_dir() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = "/tmp/sweep/".into();
        assert_eq!(cfg.journal_url(), "sqlite:///tmp/sweep/sweeper.db");
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.gateway.base_url, "http://127.0.0.1:8081/");
    }
}
