use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::{Result, SubtradError};

/// Environment variable holding a JSON array of model names
pub const MODELS_ENV: &str = "SUBTRAD_MODELS";
/// Environment variable holding a JSON array of API keys
pub const API_KEYS_ENV: &str = "SUBTRAD_API_KEYS";

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_batch_size() -> usize {
    50
}

fn default_pause_seconds() -> u64 {
    10
}

fn default_cooldown_seconds() -> u64 {
    3600
}

fn default_empty_retry_delay_seconds() -> u64 {
    10
}

fn default_request_timeout_seconds() -> u64 {
    300
}

fn default_reset_time() -> String {
    "11:05".to_string()
}

fn default_timezone() -> String {
    "Europe/Paris".to_string()
}

fn default_watch_interval_seconds() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

fn default_converter_path() -> String {
    "ffmpeg".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".subtrad/log")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub translate: TranslateConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Gemini API base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Models in priority order; the first one is always tried first
    #[serde(default)]
    pub models: Vec<String>,
    /// API keys in rotation order
    #[serde(default)]
    pub api_keys: Vec<String>,
    /// Number of cues sent per request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between two batches
    #[serde(default = "default_pause_seconds")]
    pub pause_seconds: u64,
    /// How long a failing (model, key) cell stays unused
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
    /// Delay before the single retry of an empty response
    #[serde(default = "default_empty_retry_delay_seconds")]
    pub empty_retry_delay_seconds: u64,
    /// HTTP timeout for one request
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

// Keys stay out of Debug output and therefore out of the logs.
impl std::fmt::Debug for TranslateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslateConfig")
            .field("endpoint", &self.endpoint)
            .field("models", &self.models)
            .field("api_keys", &format!("<{} redacted>", self.api_keys.len()))
            .field("batch_size", &self.batch_size)
            .field("pause_seconds", &self.pause_seconds)
            .field("cooldown_seconds", &self.cooldown_seconds)
            .field("empty_retry_delay_seconds", &self.empty_retry_delay_seconds)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Daily wall-clock time ("HH:MM") at which the provider replenishes quota
    #[serde(default = "default_reset_time")]
    pub reset_time: String,
    /// IANA timezone the reset time is expressed in
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Wait for the quota reset when exhausted and rescan folders periodically
    Continuous,
    /// Scan once and stop as soon as every credential is exhausted
    SinglePass,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_run_mode")]
    pub mode: RunMode,
    /// Library folders scanned for videos
    #[serde(default)]
    pub source_folders: Vec<PathBuf>,
    /// Delay between two scans in continuous mode
    #[serde(default = "default_watch_interval_seconds")]
    pub watch_interval_seconds: u64,
}

fn default_run_mode() -> RunMode {
    RunMode::Continuous
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Remove the progress file once a job completes
    #[serde(default = "default_true")]
    pub delete_checkpoint: bool,
    /// Remove the converted SRT produced from ASS/SSA/WebVTT sources
    #[serde(default)]
    pub delete_converted: bool,
    /// Remove the `.en.<ext>.tmp` track extracted from the container
    #[serde(default)]
    pub delete_extracted_source: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to the ffmpeg binary used for subtitle conversion
    #[serde(default = "default_converter_path")]
    pub converter_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory receiving the daily rotated log file
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            models: Vec::new(),
            api_keys: Vec::new(),
            batch_size: default_batch_size(),
            pause_seconds: default_pause_seconds(),
            cooldown_seconds: default_cooldown_seconds(),
            empty_retry_delay_seconds: default_empty_retry_delay_seconds(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            reset_time: default_reset_time(),
            timezone: default_timezone(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: default_run_mode(),
            source_folders: Vec::new(),
            watch_interval_seconds: default_watch_interval_seconds(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            delete_checkpoint: true,
            delete_converted: false,
            delete_extracted_source: false,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            converter_path: default_converter_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
        }
    }
}

impl TranslateConfig {
    pub fn pause(&self) -> Duration {
        Duration::from_secs(self.pause_seconds)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    pub fn empty_retry_delay(&self) -> Duration {
        Duration::from_secs(self.empty_retry_delay_seconds)
    }
}

impl QuotaConfig {
    pub fn parsed_reset_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.reset_time, "%H:%M")
            .map_err(|e| SubtradError::Config(format!("Invalid reset_time '{}': {}", self.reset_time, e)))
    }

    pub fn parsed_timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| SubtradError::Config(format!("Invalid timezone '{}': {}", self.timezone, e)))
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SubtradError::Config(format!("Failed to read config file: {}", e)))?;

        Ok(toml::from_str(&content)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SubtradError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SubtradError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Replace models and keys with the JSON arrays found in the environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(raw) = std::env::var(MODELS_ENV) {
            self.translate.models = parse_json_list(MODELS_ENV, &raw)?;
            info!("Loaded {} model(s) from {}", self.translate.models.len(), MODELS_ENV);
        }
        if let Ok(raw) = std::env::var(API_KEYS_ENV) {
            self.translate.api_keys = parse_json_list(API_KEYS_ENV, &raw)?;
            info!("Loaded {} API key(s) from {}", self.translate.api_keys.len(), API_KEYS_ENV);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.translate.models.is_empty() {
            return Err(SubtradError::Config(format!(
                "No model configured (set translate.models or {})",
                MODELS_ENV
            )));
        }
        if self.translate.api_keys.is_empty() {
            return Err(SubtradError::Config(format!(
                "No API key configured (set translate.api_keys or {})",
                API_KEYS_ENV
            )));
        }
        if self.translate.batch_size == 0 {
            return Err(SubtradError::Config("translate.batch_size must be at least 1".to_string()));
        }
        self.quota.parsed_reset_time()?;
        self.quota.parsed_timezone()?;
        Ok(())
    }
}

fn parse_json_list(name: &str, raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw)
        .map_err(|e| SubtradError::Config(format!("{} must be a JSON array of strings: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_file_is_a_toml_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subtrad.toml");
        std::fs::write(&path, "[translate\nbatch_size = ").unwrap();

        assert!(matches!(Config::from_file(&path), Err(SubtradError::Toml(_))));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [translate]
            models = ["gemini-2.0-flash"]
            api_keys = ["k1", "k2"]
            batch_size = 20

            [run]
            mode = "single_pass"
            "#,
        )
        .unwrap();

        assert_eq!(config.translate.batch_size, 20);
        assert_eq!(config.translate.pause_seconds, 10);
        assert_eq!(config.translate.cooldown_seconds, 3600);
        assert_eq!(config.run.mode, RunMode::SinglePass);
        assert_eq!(config.quota.reset_time, "11:05");
        assert!(config.cleanup.delete_checkpoint);
        assert!(!config.cleanup.delete_converted);
        assert!(!config.cleanup.delete_extracted_source);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_credentials() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(SubtradError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_quota_settings() {
        let mut config = Config::default();
        config.translate.models = vec!["m".to_string()];
        config.translate.api_keys = vec!["k".to_string()];

        config.quota.reset_time = "25:99".to_string();
        assert!(config.validate().is_err());

        config.quota.reset_time = "11:05".to_string();
        config.quota.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let mut config = TranslateConfig::default();
        config.api_keys = vec!["super-secret".to_string()];
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subtrad.toml");
        let mut config = Config::default();
        config.translate.models = vec!["gemini-2.0-flash".to_string()];
        config.save_to_file(&path).unwrap();

        let reloaded = Config::from_file(&path).unwrap();
        assert_eq!(reloaded.translate.models, config.translate.models);
        assert_eq!(reloaded.run.mode, RunMode::Continuous);
    }
}
