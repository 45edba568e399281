use media_sync_models::{Facet, LibraryKind, PlaybackThresholds};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub trakt: Option<TraktConfig>,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub sync: SyncOptions,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub playback: PlaybackThresholds,
    #[serde(default)]
    pub scheduler: Option<SchedulerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraktConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_api_url() -> String {
    "https://api.trakt.tv".to_string()
}

/// Local library sources. Several may be configured; removal-style cleanup
/// only runs when exactly one of them is enabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryConfig {
    #[serde(default)]
    pub sources: Vec<LibrarySourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibrarySourceConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// JSON library file
    pub path: PathBuf,
}

impl LibraryConfig {
    pub fn active_sources(&self) -> Vec<&LibrarySourceConfig> {
        self.sources.iter().filter(|s| s.enabled).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOptions {
    #[serde(default = "default_true")]
    pub sync_movies: bool,
    #[serde(default = "default_true")]
    pub sync_shows: bool,
    #[serde(default = "default_true")]
    pub sync_watched: bool,
    #[serde(default = "default_true")]
    pub sync_collection: bool,
    #[serde(default = "default_true")]
    pub sync_ratings: bool,
    #[serde(default = "default_true")]
    pub sync_watchlist: bool,
    /// Remove remote collection entries that are no longer in the local library
    #[serde(default)]
    pub keep_library_clean: bool,
    #[serde(default)]
    pub remove_watched_from_watchlist: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            sync_movies: true,
            sync_shows: true,
            sync_watched: true,
            sync_collection: true,
            sync_ratings: true,
            sync_watchlist: true,
            keep_library_clean: false,
            remove_watched_from_watchlist: false,
        }
    }
}

impl SyncOptions {
    pub fn facets(&self) -> Vec<Facet> {
        Facet::ALL
            .into_iter()
            .filter(|facet| match facet {
                Facet::Watched => self.sync_watched,
                Facet::Collection => self.sync_collection,
                Facet::Ratings => self.sync_ratings,
                Facet::Watchlist => self.sync_watchlist,
            })
            .collect()
    }

    pub fn kinds(&self) -> Vec<LibraryKind> {
        LibraryKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                LibraryKind::Movies => self.sync_movies,
                LibraryKind::Shows => self.sync_shows,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Pause between remote batches to stay under the rate limit
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_movie_batch_size")]
    pub movie_batch_size: usize,
}

fn default_batch_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_movie_batch_size() -> usize {
    100
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            batch_delay_ms: default_batch_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            movie_batch_size: default_movie_batch_size(),
        }
    }
}

impl ThrottleConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Six-field cron expression (seconds first)
    #[serde(default = "default_schedule")]
    pub schedule: String,
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

fn default_true() -> bool {
    true
}

fn default_schedule() -> String {
    "0 0 */6 * * *".to_string() // Every 6 hours
}

pub fn default_scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        schedule: default_schedule(),
        run_on_startup: default_true(),
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.throttle.movie_batch_size == 0 {
            return Err(ConfigError::Invalid("throttle.movie_batch_size must be at least 1".to_string()));
        }
        if !(0.0..=100.0).contains(&self.playback.watched_percent) {
            return Err(ConfigError::Invalid("playback.watched_percent must be within 0-100".to_string()));
        }
        if !(0.0..=100.0).contains(&self.playback.double_episode_split_percent) {
            return Err(ConfigError::Invalid(
                "playback.double_episode_split_percent must be within 0-100".to_string(),
            ));
        }
        Ok(())
    }
}
