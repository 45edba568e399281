use anyhow::Result;
use media_sync_models::{Facet, LibraryKind};
use std::path::{Path, PathBuf};

/// Get the container base path from environment variable, defaulting to "/app"
pub fn container_base_path() -> PathBuf {
    std::env::var("REELSYNC_BASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/app"))
}

pub struct PathManager {
    config_dir: PathBuf,
    data_dir: PathBuf,
    log_dir: PathBuf,
}

impl PathManager {
    pub fn new() -> Result<Self> {
        let base_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("reelsync");

        Ok(Self::with_base(base_dir))
    }

    /// Lay out config, data and logs under one base directory.
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            config_dir: base.clone(),
            data_dir: base.join("data"),
            log_dir: base.join("logs"),
        }
    }

    pub fn from_docker_env() -> Self {
        Self::with_base(container_base_path())
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    /// Directory holding the persisted facet snapshots
    pub fn snapshot_dir(&self) -> PathBuf {
        self.cache_dir().join("snapshots")
    }

    pub fn snapshot_file(&self, kind: LibraryKind, facet: Facet) -> PathBuf {
        snapshot_file_in(&self.snapshot_dir(), kind, facet)
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.config_dir.join("credentials.toml")
    }

    pub fn daemon_log_file(&self) -> PathBuf {
        self.log_dir.join("reelsync.log")
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        std::fs::create_dir_all(self.snapshot_dir())?;
        Ok(())
    }
}

/// `<dir>/<kind>/<facet>.json`
pub fn snapshot_file_in(dir: &Path, kind: LibraryKind, facet: Facet) -> PathBuf {
    dir.join(kind.as_str()).join(format!("{}.json", facet.as_str()))
}

impl Default for PathManager {
    fn default() -> Self {
        // The container image creates the base directory, so its presence means Docker
        let base = container_base_path();
        if base.exists() {
            return Self::from_docker_env();
        }

        Self::new().unwrap_or_else(|_| Self::from_docker_env())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_layout() {
        let paths = PathManager::with_base("/tmp/reelsync-test");
        assert_eq!(
            paths.snapshot_file(LibraryKind::Shows, Facet::Watched),
            PathBuf::from("/tmp/reelsync-test/data/cache/snapshots/shows/watched.json")
        );
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/reelsync-test/config.toml"));
    }
}
