//! Configuration loading from TOML files

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global configuration for halvest
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub paths: PathsConfig,
    pub download: DownloadSection,
    pub pack: PackSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub query: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.archives-ouvertes.fr".to_string(),
            query: "*".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub response_dir: PathBuf,
    pub pdf_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Zip of GROBID extractions, needed by `pack`.
    #[serde(deserialize_with = "deserialize_env_var")]
    pub fulltext_zip: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            response_dir: PathBuf::from("./data/responses"),
            pdf_dir: PathBuf::from("./data/pdfs"),
            output_dir: PathBuf::from("./data/corpus"),
            fulltext_zip: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct DownloadSection {
    pub concurrency: usize,
}

impl Default for DownloadSection {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PackSection {
    pub version: String,
    pub shard_threshold: u64,
}

impl Default for PackSection {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            shard_threshold: halvest_pack::SHARD_THRESHOLD,
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./halvest.toml (current directory)
    /// 2. ~/.config/halvest/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("halvest.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "halvest") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "https://api.archives-ouvertes.fr");
        assert_eq!(config.download.concurrency, 8);
        assert_eq!(config.pack.shard_threshold, 2_000);
    }

    #[test]
    fn expand_env_var_simple() {
        std::env::set_var("HALVEST_TEST_VAR", "/mnt/texts.zip");
        assert_eq!(
            expand_env_var("${HALVEST_TEST_VAR}"),
            Some("/mnt/texts.zip".to_string())
        );
        std::env::remove_var("HALVEST_TEST_VAR");
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("literal"), Some("literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[api]
query = "text_fulltext:*"

[paths]
response_dir = "/tmp/responses"
fulltext_zip = "/tmp/texts.zip"

[download]
concurrency = 4

[pack]
version = "2"
shard_threshold = 500
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.api.query, "text_fulltext:*");
        assert_eq!(config.paths.response_dir, PathBuf::from("/tmp/responses"));
        assert_eq!(config.paths.fulltext_zip.as_deref(), Some("/tmp/texts.zip"));
        assert_eq!(config.download.concurrency, 4);
        assert_eq!(config.pack.version, "2");
        assert_eq!(config.pack.shard_threshold, 500);
    }
}
