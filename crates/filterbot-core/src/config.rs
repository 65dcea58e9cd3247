//! Configuration: YAML file plus env var overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bot token env vars, checked in order (teloxide's own name first)
const TOKEN_ENV_VARS: &[&str] = &["TELOXIDE_TOKEN", "TELEGRAM_BOT_TOKEN"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Telegram bot token (set here or via env var)
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Directory holding the filter file and staged images
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Filter snapshot file name, relative to data_dir
    #[serde(default = "default_filters_file")]
    pub filters_file: String,

    /// Image directory name, relative to data_dir
    #[serde(default = "default_images_dir")]
    pub images_dir: String,

    /// Authoring commands admitted per user per window
    #[serde(default = "default_rate_limit")]
    pub rate_limit: usize,

    /// Sliding window length for the rate limit
    #[serde(default = "default_rate_window")]
    pub rate_window_seconds: u64,

    /// How long the form waits for an image before giving up
    #[serde(default = "default_image_timeout")]
    pub image_timeout_seconds: u64,

    /// Resolved project root (set at load time, not serialized from YAML)
    #[serde(skip)]
    pub project_root: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_filters_file() -> String {
    "filters.json".into()
}
fn default_images_dir() -> String {
    "images".into()
}
fn default_rate_limit() -> usize {
    5
}
fn default_rate_window() -> u64 {
    60
}
fn default_image_timeout() -> u64 {
    60
}

impl Config {
    /// Load config from a YAML file with env var overrides.
    pub fn load(config_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config: {}", config_path.display()))?;

        let mut config: Config =
            serde_yaml::from_str(&content).context("Failed to parse config.yaml")?;

        config.project_root = config_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf()
            .canonicalize()
            .unwrap_or_else(|_| {
                config_path
                    .parent()
                    .unwrap_or(Path::new("."))
                    .to_path_buf()
            });

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load `config.yaml` if present, otherwise defaults; env overrides apply either way.
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.is_file() {
            return Self::load(config_path);
        }
        let mut config = Config {
            project_root: config_path
                .parent()
                .unwrap_or(Path::new("."))
                .to_path_buf(),
            ..Config::default()
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(token) = TOKEN_ENV_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok())
            .filter(|t| !t.trim().is_empty())
        {
            self.bot_token = Some(token);
        }

        if let Ok(dir) = std::env::var("FILTERBOT_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Ok(limit) = std::env::var("FILTERBOT_RATE_LIMIT") {
            self.rate_limit = limit
                .trim()
                .parse()
                .with_context(|| format!("FILTERBOT_RATE_LIMIT is not a number: {limit}"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.rate_limit == 0 {
            anyhow::bail!("rate_limit must be at least 1");
        }
        if self.rate_window_seconds == 0 {
            anyhow::bail!("rate_window_seconds must be at least 1");
        }
        if self.image_timeout_seconds == 0 {
            anyhow::bail!("image_timeout_seconds must be at least 1");
        }
        Ok(())
    }

    /// Data directory, resolved against the project root when relative
    pub fn data_path(&self) -> PathBuf {
        if self.data_dir.is_absolute() {
            self.data_dir.clone()
        } else {
            self.project_root.join(&self.data_dir)
        }
    }

    pub fn filters_path(&self) -> PathBuf {
        self.data_path().join(&self.filters_file)
    }

    pub fn images_path(&self) -> PathBuf {
        self.data_path().join(&self.images_dir)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_seconds)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_seconds)
    }

    /// Create the data and image directories.
    pub fn ensure_dirs(&self) -> Result<()> {
        let images = self.images_path();
        std::fs::create_dir_all(&images)
            .with_context(|| format!("Failed to create {}", images.display()))?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: None,
            data_dir: default_data_dir(),
            filters_file: default_filters_file(),
            images_dir: default_images_dir(),
            rate_limit: default_rate_limit(),
            rate_window_seconds: default_rate_window(),
            image_timeout_seconds: default_image_timeout(),
            project_root: PathBuf::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_defaults() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "images_dir: images").unwrap();

        let config = Config::load(tmp.path()).unwrap();
        assert_eq!(config.filters_file, "filters.json");
        assert_eq!(config.rate_limit, 5);
        assert_eq!(config.rate_window(), Duration::from_secs(60));
        assert_eq!(config.image_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_load_config_custom_values() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            "data_dir: /var/lib/filterbot\nrate_window_seconds: 30\nimage_timeout_seconds: 90"
        )
        .unwrap();

        let config = Config::load(tmp.path()).unwrap();
        assert_eq!(config.data_path(), PathBuf::from("/var/lib/filterbot"));
        assert_eq!(
            config.filters_path(),
            PathBuf::from("/var/lib/filterbot/filters.json")
        );
        assert_eq!(config.rate_window_seconds, 30);
        assert_eq!(config.image_timeout_seconds, 90);
    }

    #[test]
    fn test_relative_data_dir_resolves_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "images_dir: pics\n").unwrap();

        let config = Config::load(&path).unwrap();
        let root = dir.path().canonicalize().unwrap();
        assert_eq!(config.images_path(), root.join("data").join("pics"));
    }

    #[test]
    fn test_window_of_zero_fails() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "rate_window_seconds: 0").unwrap();
        assert!(Config::load(tmp.path()).is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("config.yaml")).unwrap();
        assert_eq!(config.images_path(), dir.path().join("data").join("images"));
    }
}
