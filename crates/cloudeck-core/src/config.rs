use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;

/// Environment variable that overrides `[remote] api_key`.
pub const ENV_API_KEY: &str = "CLOUDECK_API_KEY";
/// Environment variable that overrides `[remote] worker_url`.
pub const ENV_WORKER_URL: &str = "CLOUDECK_WORKER_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// The folder-listing worker that fronts the remote Drive store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL; the client appends `?mode=folders`.  Empty disables browsing.
    #[serde(default)]
    pub worker_url: String,
    /// Sent as `X-API-Key` on every request.
    #[serde(default)]
    pub api_key: String,
    /// Ceiling over the whole fetch, retries included.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First retry delay; doubled on each further attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Volume (0-100) used when no preferences have been saved yet.
    #[serde(default = "default_volume")]
    pub default_volume: u8,
    /// "Previous" restarts the current track once it has played this long.
    #[serde(default = "default_restart_threshold_secs")]
    pub restart_threshold_secs: f64,
    #[serde(default = "default_seek_step_secs")]
    pub seek_step_secs: f64,
    #[serde(default = "default_volume_step")]
    pub volume_step: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON key/value file holding session, preferences and analytics.
    #[serde(default = "default_store_file")]
    pub store_file: PathBuf,
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: usize,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,
    /// Remote tracks kept when a session save has to shrink to fit the quota.
    #[serde(default = "default_reduced_track_limit")]
    pub reduced_track_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Minimum spacing between repeated next/previous key presses.
    #[serde(default = "default_key_repeat_ms")]
    pub key_repeat_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Where exported state files are written.
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            worker_url: String::new(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            restart_threshold_secs: default_restart_threshold_secs(),
            seek_step_secs: default_seek_step_secs(),
            volume_step: default_volume_step(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_file: default_store_file(),
            quota_bytes: default_quota_bytes(),
            session_ttl_hours: default_session_ttl_hours(),
            save_debounce_ms: default_save_debounce_ms(),
            reduced_track_limit: default_reduced_track_limit(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            search_debounce_ms: default_search_debounce_ms(),
            page_size: default_page_size(),
            key_repeat_ms: default_key_repeat_ms(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            export_dir: default_export_dir(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_volume() -> u8 {
    100
}

fn default_restart_threshold_secs() -> f64 {
    3.0
}

fn default_seek_step_secs() -> f64 {
    10.0
}

fn default_volume_step() -> u8 {
    5
}

fn default_store_file() -> PathBuf {
    platform::data_dir().join("store.json")
}

fn default_quota_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_session_ttl_hours() -> i64 {
    24
}

fn default_save_debounce_ms() -> u64 {
    500
}

fn default_reduced_track_limit() -> usize {
    100
}

fn default_search_debounce_ms() -> u64 {
    300
}

fn default_page_size() -> usize {
    50
}

fn default_key_repeat_ms() -> u64 {
    150
}

fn default_export_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn is_configured(&self) -> bool {
        !self.worker_url.trim().is_empty()
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        let mut config = if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            config
        } else {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// Environment values replace the file's remote credentials so the API key
    /// does not have to live on disk.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.is_empty()) {
            self.remote.api_key = key;
        }
        if let Some(url) = lookup(ENV_WORKER_URL).filter(|v| !v.is_empty()) {
            self.remote.worker_url = url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.remote.timeout_secs, 300);
        assert_eq!(config.remote.max_retries, 3);
        assert_eq!(config.storage.session_ttl_hours, 24);
        assert_eq!(config.ui.page_size, 50);
        assert_eq!(config.ui.search_debounce_ms, 300);
        assert_eq!(config.player.default_volume, 100);
        assert!(config.storage.store_file.ends_with("cloudeck/store.json"));
        assert!(!config.remote.is_configured());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [remote]
            worker_url = "https://worker.example"
            [ui]
            page_size = 20
            "#,
        )
        .unwrap();
        assert!(config.remote.is_configured());
        assert_eq!(config.remote.backoff_base_ms, 1000);
        assert_eq!(config.ui.page_size, 20);
        assert_eq!(config.ui.key_repeat_ms, 150);
        assert_eq!(config.storage.quota_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_env_overrides_remote() {
        let mut config = Config::default();
        config.remote.api_key = "from-file".into();
        config.apply_env_overrides(|key| match key {
            ENV_API_KEY => Some("from-env".into()),
            ENV_WORKER_URL => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.remote.api_key, "from-env");
        assert!(config.remote.worker_url.is_empty());
    }
}
