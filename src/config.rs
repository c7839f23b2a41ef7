use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub plex: PlexConfig,

    pub anilist: AniListConfig,

    pub sync: SyncConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    #[serde(default)]
    pub suppress_connection_errors: bool,

    /// Tokio worker threads; 0 lets the runtime pick based on core count.
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), suppress_connection_errors: false, worker_threads: 0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlexConfig {
    pub base_url: String,

    pub token: String,
}

impl Default for PlexConfig {
    fn default() -> Self {
        Self { base_url: "http://localhost:32400".to_string(), token: String::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AniListConfig {
    pub token: String,

    /// Requests per minute the token-bucket limiter paces outgoing
    /// GraphQL calls to (AniList's own published degraded-mode limit).
    pub requests_per_minute: u32,
}

impl Default for AniListConfig {
    fn default() -> Self {
        Self { token: String::new(), requests_per_minute: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub days_until_paused: u32,

    pub days_until_dropped: u32,

    /// Per-series cap on `AniList.getAnimeDetails` calls while walking
    /// the relation graph (spec §9 "bound fetches with a per-series budget").
    pub max_detail_fetches_per_series: usize,

    /// Concurrent series mapped at once by `SyncOrchestrator`.
    pub concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { days_until_paused: 14, days_until_dropped: 31, max_detail_fetches_per_series: 50, concurrency: 8 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub metrics_port: Option<u16>,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "plex-anilist-sync".to_string());

        Self {
            metrics_enabled: true,
            metrics_port: None,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            plex: PlexConfig::default(),
            anilist: AniListConfig::default(),
            sync: SyncConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_config_path();
        self.save_to_path(&path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("plex-anilist-sync").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".plex-anilist-sync").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.plex.token.is_empty() {
            anyhow::bail!("plex.token must be set");
        }

        if self.anilist.token.is_empty() {
            anyhow::bail!("anilist.token must be set");
        }

        if self.sync.days_until_dropped < self.sync.days_until_paused {
            anyhow::bail!("sync.days_until_dropped must be >= sync.days_until_paused");
        }

        if self.sync.concurrency == 0 {
            anyhow::bail!("sync.concurrency must be > 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.sync.days_until_paused, 14);
        assert_eq!(config.sync.days_until_dropped, 31);
        assert_eq!(config.anilist.requests_per_minute, 30);
    }

    #[test]
    fn serialization_round_trip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[plex]"));
        assert!(toml_str.contains("[anilist]"));
        assert!(toml_str.contains("[sync]"));

        let round_tripped: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(round_tripped.sync.concurrency, config.sync.concurrency);
    }

    #[test]
    fn rejects_dropped_threshold_below_paused_threshold() {
        let mut config = Config::default();
        config.plex.token = "t".into();
        config.anilist.token = "t".into();
        config.sync.days_until_paused = 30;
        config.sync.days_until_dropped = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_concurrency() {
        let mut config = Config::default();
        config.plex.token = "t".into();
        config.anilist.token = "t".into();
        config.sync.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_valid_config() {
        let mut config = Config::default();
        config.plex.token = "t".into();
        config.anilist.token = "t".into();
        assert!(config.validate().is_ok());
    }
}
