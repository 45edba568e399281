pub mod clear;
pub mod daemon;
pub mod status;
pub mod sync;

use color_eyre::eyre::eyre;
use color_eyre::Result;
use media_sync_config::{Config, CredentialStore, PathManager};
use media_sync_core::{CacheStore, SyncOrchestrator, SyncSettings};
use media_sync_sources::{JsonLibrary, LocalLibrary, TraktClient};
use std::sync::Arc;
use tracing::{debug, info};

pub fn load_config(path_manager: &PathManager) -> Result<Config> {
    let config_file = path_manager.config_file();
    if !config_file.exists() {
        return Err(eyre!(
            "No configuration found at {}. Create it with a [trakt] section and at least one [[library.sources]] entry.",
            config_file.display()
        ));
    }
    Config::load_from_file(&config_file).map_err(|e| eyre!("{}", e))
}

pub fn cache_store(path_manager: &PathManager) -> CacheStore {
    CacheStore::new(path_manager.snapshot_dir())
}

/// Wire the Trakt client, every enabled local library and the snapshot cache
/// into an orchestrator.
pub async fn build_orchestrator(
    path_manager: &PathManager,
    config: &Config,
    settings: SyncSettings,
) -> Result<SyncOrchestrator> {
    let trakt = config
        .trakt
        .as_ref()
        .ok_or_else(|| eyre!("Trakt is not configured: add a [trakt] section to {}", path_manager.config_file().display()))?;

    let credentials_file = path_manager.credentials_file();
    let mut cred_store = CredentialStore::new(credentials_file.clone());
    cred_store
        .load()
        .map_err(|e| eyre!("Failed to load credentials from {}: {}", credentials_file.display(), e))?;

    let remote = TraktClient::connect(trakt, &mut cred_store, config.throttle.request_timeout())
        .await
        .map_err(|e| eyre!("Failed to connect to Trakt: {}", e))?;

    let mut locals: Vec<Arc<dyn LocalLibrary>> = Vec::new();
    for source in config.library.active_sources() {
        let library = JsonLibrary::open(source.name.clone(), source.path.clone(), config.playback)
            .await
            .map_err(|e| eyre!("Failed to open library '{}' at {}: {}", source.name, source.path.display(), e))?;
        debug!(source = %source.name, path = %source.path.display(), "Opened local library");
        locals.push(Arc::new(library));
    }
    if locals.is_empty() {
        return Err(eyre!("No enabled local library sources in configuration"));
    }

    info!(
        operation = "setup",
        sources = locals.len(),
        kinds = ?settings.kinds,
        facets = ?settings.facets,
        "Sync configured"
    );

    Ok(SyncOrchestrator::new(
        Arc::new(remote),
        locals,
        Arc::new(cache_store(path_manager)),
        settings,
    ))
}
