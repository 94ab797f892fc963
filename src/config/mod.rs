//! Application configuration management
//!
//! Configuration is a YAML file. `${VAR}` and `$VAR` references are expanded
//! from the environment before parsing; unset variables are left as written.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;

use crate::services::traits::WantedSource;

/// Environment variable pointing at the config file
pub const CONFIG_ENV: &str = "SEEKARR_CONFIG";

static ENV_VAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([^}]+)\}|\$([A-Za-z_][A-Za-z0-9_]*)").expect("valid env var regex")
});

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Application configuration loaded from YAML
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub lidarr: LidarrConfig,
    pub slskd: SlskdConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LidarrConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub host_url: String,
    /// Where Lidarr sees the finished downloads
    #[serde(default)]
    pub download_dir: String,
    #[serde(default)]
    pub disable_sync: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlskdConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub host_url: String,
    #[serde(default = "default_url_base")]
    pub url_base: String,
    /// Where slskd writes downloads; also holds seekarr's state files
    #[serde(default)]
    pub download_dir: String,
    #[serde(default)]
    pub delete_searches: bool,
    /// Seconds before the transfer monitor gives up
    #[serde(default = "default_stalled_timeout")]
    pub stalled_timeout: u64,
}

/// How the wanted list is paged through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    FirstPage,
    #[default]
    IncrementingPage,
    All,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Milliseconds, forwarded to the peer search
    pub search_timeout: u64,
    pub maximum_peer_queue: u32,
    pub minimum_peer_upload_speed: u64,
    pub minimum_filename_match_ratio: f64,
    pub allowed_filetypes: Vec<String>,
    pub ignored_users: Vec<String>,
    pub title_blacklist: Vec<String>,
    pub search_type: SearchType,
    pub search_source: WantedSource,
    pub number_of_albums_to_grab: u32,
    pub enable_search_denylist: bool,
    pub max_search_failures: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_timeout: 5000,
            maximum_peer_queue: 50,
            minimum_peer_upload_speed: 0,
            minimum_filename_match_ratio: 0.8,
            allowed_filetypes: Vec::new(),
            ignored_users: Vec::new(),
            title_blacklist: Vec::new(),
            search_type: SearchType::default(),
            search_source: WantedSource::default(),
            number_of_albums_to_grab: 10,
            enable_search_denylist: true,
            max_search_failures: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub search_wait_seconds: u64,
    pub search_poll_millis: u64,
    pub download_poll_seconds: u64,
    pub import_poll_seconds: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            search_wait_seconds: 5,
            search_poll_millis: 500,
            download_poll_seconds: 10,
            import_poll_seconds: 2,
        }
    }
}

impl TimingConfig {
    pub fn search_wait(&self) -> Duration {
        Duration::from_secs(self.search_wait_seconds)
    }

    pub fn search_poll(&self) -> Duration {
        Duration::from_millis(self.search_poll_millis)
    }

    pub fn download_poll(&self) -> Duration {
        Duration::from_secs(self.download_poll_seconds)
    }

    pub fn import_poll(&self) -> Duration {
        Duration::from_secs(self.import_poll_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub enabled: bool,
    pub interval_minutes: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `json`, `compact`, anything else is plain text
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

fn default_url_base() -> String {
    "/".to_string()
}

fn default_stalled_timeout() -> u64 {
    3600
}

impl Config {
    /// Read, expand, parse and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&expand_env_vars(&raw))
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse and validate already-expanded YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(yaml).context("Failed to parse config")?;
        config.logging.level = config.logging.level.to_lowercase();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        require("lidarr.api_key", &self.lidarr.api_key)?;
        require("lidarr.host_url", &self.lidarr.host_url)?;
        require_url("lidarr.host_url", &self.lidarr.host_url)?;
        require("lidarr.download_dir", &self.lidarr.download_dir)?;

        require("slskd.api_key", &self.slskd.api_key)?;
        require("slskd.host_url", &self.slskd.host_url)?;
        require_url("slskd.host_url", &self.slskd.host_url)?;
        require("slskd.download_dir", &self.slskd.download_dir)?;
        if self.slskd.stalled_timeout < 1 {
            bail!("slskd.stalled_timeout must be at least 1");
        }

        let ratio = self.search.minimum_filename_match_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            bail!("search.minimum_filename_match_ratio must be between 0 and 1, got {}", ratio);
        }
        if self.search.number_of_albums_to_grab < 1 {
            bail!("search.number_of_albums_to_grab must be at least 1");
        }
        if self.search.max_search_failures < 1 {
            bail!("search.max_search_failures must be at least 1");
        }

        if self.timing.search_poll_millis < 1 {
            bail!("timing.search_poll_millis must be at least 1");
        }
        if self.timing.download_poll_seconds < 1 {
            bail!("timing.download_poll_seconds must be at least 1");
        }
        if self.timing.import_poll_seconds < 1 {
            bail!("timing.import_poll_seconds must be at least 1");
        }

        if self.daemon.enabled && self.daemon.interval_minutes < 1 {
            bail!("daemon.interval_minutes must be at least 1");
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            bail!(
                "logging.level must be one of {} (got {:?})",
                LOG_LEVELS.join(", "),
                self.logging.level
            );
        }

        Ok(())
    }

    pub fn slskd_download_dir(&self) -> PathBuf {
        PathBuf::from(&self.slskd.download_dir)
    }

    pub fn lidarr_download_dir(&self) -> PathBuf {
        PathBuf::from(&self.lidarr.download_dir)
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{} is required", field);
    }
    Ok(())
}

fn require_url(field: &str, value: &str) -> Result<()> {
    url::Url::parse(value).with_context(|| format!("{} must be a valid URL: {:?}", field, value))?;
    Ok(())
}

/// Expand `${VAR}` / `$VAR` from the process environment
pub fn expand_env_vars(input: &str) -> String {
    expand_with(input, |name| env::var(name).ok())
}

/// Expand variables through `lookup`; unknown or empty values stay verbatim
pub fn expand_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ENV_VAR_RE
        .replace_all(input, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match lookup(name) {
                Some(value) if !value.is_empty() => value,
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Find the config file.
///
/// Order: explicit path, `SEEKARR_CONFIG`, `./config.yaml`, `./config.yml`,
/// `/etc/seekarr/config.yaml`, then the user config directory.
pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Ok(path) = env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    let candidates = candidate_paths();
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .with_context(|| {
            format!(
                "No config file found; looked in {}",
                candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("config.yaml"),
        PathBuf::from("config.yml"),
        PathBuf::from("/etc/seekarr/config.yaml"),
    ];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("seekarr").join("config.yaml"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
lidarr:
  api_key: lkey
  host_url: http://lidarr:8686
  download_dir: /downloads
slskd:
  api_key: skey
  host_url: http://slskd:5030
  download_dir: /data/slskd
"#;

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_yaml_str(MINIMAL).unwrap();

        assert_eq!(config.slskd.url_base, "/");
        assert_eq!(config.slskd.stalled_timeout, 3600);
        assert!(!config.slskd.delete_searches);
        assert!(!config.lidarr.disable_sync);
        assert_eq!(config.search.search_timeout, 5000);
        assert_eq!(config.search.maximum_peer_queue, 50);
        assert_eq!(config.search.minimum_filename_match_ratio, 0.8);
        assert_eq!(config.search.search_type, SearchType::IncrementingPage);
        assert_eq!(config.search.search_source, WantedSource::Missing);
        assert_eq!(config.search.number_of_albums_to_grab, 10);
        assert!(config.search.enable_search_denylist);
        assert_eq!(config.search.max_search_failures, 3);
        assert_eq!(config.timing.search_wait(), Duration::from_secs(5));
        assert_eq!(config.timing.search_poll(), Duration::from_millis(500));
        assert_eq!(config.timing.download_poll_seconds, 10);
        assert_eq!(config.timing.import_poll_seconds, 2);
        assert!(!config.daemon.enabled);
        assert_eq!(config.daemon.interval_minutes, 60);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_full_search_section() {
        let yaml = format!(
            "{}\nsearch:\n  search_type: all\n  search_source: cutoff_unmet\n  allowed_filetypes: [\"flac 24/192\", mp3]\n  ignored_users: [bob]\nlogging:\n  level: DEBUG\n  format: json\n",
            MINIMAL
        );

        let config = Config::from_yaml_str(&yaml).unwrap();

        assert_eq!(config.search.search_type, SearchType::All);
        assert_eq!(config.search.search_source, WantedSource::CutoffUnmet);
        assert_eq!(config.search.allowed_filetypes, vec!["flac 24/192", "mp3"]);
        assert_eq!(config.search.ignored_users, vec!["bob"]);
        // Unset fields in a present section keep their defaults
        assert_eq!(config.search.number_of_albums_to_grab, 10);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_invalid_search_type_rejected() {
        let yaml = format!("{}\nsearch:\n  search_type: sometimes\n", MINIMAL);
        assert!(Config::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let yaml = format!("{}\nsearch:\n  minimum_filename_match_ratio: 1.5\n", MINIMAL);
        let err = Config::from_yaml_str(&yaml).unwrap_err();
        assert!(format!("{:#}", err).contains("minimum_filename_match_ratio"));
    }

    #[test]
    fn test_zero_stalled_timeout_rejected() {
        let yaml = MINIMAL.replace(
            "  download_dir: /data/slskd\n",
            "  download_dir: /data/slskd\n  stalled_timeout: 0\n",
        );
        let err = Config::from_yaml_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("slskd.stalled_timeout"));
    }

    #[test]
    fn test_missing_required_field() {
        let yaml = MINIMAL.replace("  api_key: skey\n", "");
        let err = Config::from_yaml_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("slskd.api_key"));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let yaml = MINIMAL.replace("http://lidarr:8686", "not a url");
        assert!(Config::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn test_expand_with() {
        let lookup = |name: &str| match name {
            "LIDARR_API_KEY" => Some("secret".to_string()),
            "HOST" => Some("lidarr".to_string()),
            "EMPTY" => Some(String::new()),
            _ => None,
        };

        assert_eq!(expand_with("api_key: ${LIDARR_API_KEY}", lookup), "api_key: secret");
        assert_eq!(expand_with("http://$HOST:8686", lookup), "http://lidarr:8686");
        assert_eq!(expand_with("${UNSET_VAR} $EMPTY", lookup), "${UNSET_VAR} $EMPTY");
        assert_eq!(expand_with("price: 5$", lookup), "price: 5$");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = Config::load(&path).unwrap();

        assert_eq!(config.slskd_download_dir(), PathBuf::from("/data/slskd"));
        assert_eq!(locate(Some(&path)).unwrap(), path);
    }
}
