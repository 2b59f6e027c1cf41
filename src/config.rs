//! Configuration types for download operations.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Catalog location that bare album names are resolved against.
pub const DEFAULT_BASE_URL: &str = "https://downloads.khinsider.com/game-soundtracks/album/";

const DEFAULT_USER_AGENT: &str = concat!("ripvgm/", env!("CARGO_PKG_VERSION"));

/// How the tracks of one album are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// One track at a time, in listing order.
    Sequential,
    /// Every track of the album at once, joined before the next album.
    #[default]
    FanOut,
}

/// Exponential backoff settings for idempotent GET requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(with = "duration_secs")]
    pub initial_delay: Duration,
    /// Factor applied to the delay after every retry.
    pub backoff_multiplier: f64,
    /// Upper bound for the (unjittered) delay.
    #[serde(with = "duration_secs")]
    pub max_delay: Duration,
    /// Upper bound of the random amount added to every delay.
    #[serde(with = "duration_secs")]
    pub jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            jitter: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }
}

/// Configuration for download operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Pick FLAC over MP3 when a track offers both.
    pub prefer_flac: bool,
    /// Track scheduling policy, applied to every album of the run.
    pub mode: FetchMode,
    /// Base URL for bare album names.
    pub base_url: Url,
    /// Timeout applied to every single request.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Retry policy for page and asset requests.
    pub retry: RetryConfig,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            prefer_flac: false,
            mode: FetchMode::default(),
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"),
            timeout: Duration::from_secs(120),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl DownloadConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether FLAC is preferred over MP3.
    #[must_use]
    pub const fn with_prefer_flac(mut self, prefer: bool) -> Self {
        self.prefer_flac = prefer;
        self
    }

    /// Sets the track scheduling policy.
    #[must_use]
    pub const fn with_mode(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the base URL used for bare album names.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Path configuration for output and configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Directory album folders are created in.
    pub output_dir: PathBuf,
    /// Where the configuration was (or would have been) read from.
    #[serde(skip)]
    pub config_file: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            config_file: default_config_file(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Download configuration.
    pub download: DownloadConfig,
    /// Path configuration.
    pub paths: PathConfig,
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// With `path == None` the default location is tried and a missing file
    /// yields the defaults. An explicitly given file must exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (file, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_config_file(), false),
        };

        let contents = match std::fs::read_to_string(&file) {
            Ok(s) => s,
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config file at {}, using defaults", file.display());
                let mut config = Self::default();
                config.paths.config_file = file;
                return Ok(config);
            }
            Err(e) => {
                return Err(Error::Config(format!("{}: {e}", file.display())));
            }
        };

        let mut config = Self::from_toml(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", file.display())))?;
        log::info!("Loaded config from {}", file.display());
        config.paths.config_file = file;
        Ok(config)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML error if the document does not match the schema.
    pub fn from_toml(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

fn default_config_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ripvgm")
        .join("config.toml")
}

/// Durations are stored as (fractional) seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn default_download_config() {
        let config = DownloadConfig::default();
        assert!(!config.prefer_flac);
        assert_eq!(config.mode, FetchMode::FanOut);
        assert_eq!(config.base_url.as_str(), DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn download_config_builder_pattern() {
        let config = DownloadConfig::new()
            .with_prefer_flac(true)
            .with_mode(FetchMode::Sequential)
            .with_timeout(Duration::from_secs(5))
            .with_retry(RetryConfig::disabled());

        assert!(config.prefer_flac);
        assert_eq!(config.mode, FetchMode::Sequential);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_attempts, 0);
    }

    #[test]
    fn download_config_serializes_to_toml() {
        let config = DownloadConfig::default().with_mode(FetchMode::Sequential);
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("mode = \"sequential\""));
        let deserialized: DownloadConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.mode, FetchMode::Sequential);
        assert_eq!(deserialized.timeout, config.timeout);
        assert_eq!(deserialized.retry, config.retry);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            "[download]\nprefer_flac = true\n\n[download.retry]\ninitial_delay = 0.5\n",
        )
        .unwrap();
        assert!(config.download.prefer_flac);
        assert_eq!(config.download.mode, FetchMode::FanOut);
        assert_eq!(config.download.retry.initial_delay, Duration::from_millis(500));
        assert_eq!(config.download.retry.max_attempts, 5);
        assert_eq!(config.paths.output_dir, PathBuf::from("."));
    }

    #[test]
    fn load_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[paths]\noutput_dir = \"/music\"").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.paths.output_dir, PathBuf::from("/music"));
        assert_eq!(config.paths.config_file, path);
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = AppConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn load_rejects_bad_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[download]\nmode = \"sideways\"\n").unwrap();
        assert!(matches!(AppConfig::load(Some(&path)), Err(Error::Config(_))));
    }
}
