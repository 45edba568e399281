use super::cache_store;
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use media_sync_config::{CredentialStore, PathManager};

pub async fn run_clear(all: bool, cache: bool, credentials: bool, output: &Output) -> Result<()> {
    let path_manager = PathManager::default();

    if !(all || cache || credentials) {
        output.warn("No clear option specified. Use --cache, --credentials, or --all");
        output.info("\nExample: reelsync clear --cache");
        return Ok(());
    }

    if all || cache {
        clear_cache(&path_manager, output).await?;
    }
    if all || credentials {
        clear_credentials(&path_manager, output)?;
    }
    Ok(())
}

async fn clear_cache(path_manager: &PathManager, output: &Output) -> Result<()> {
    let snapshot_dir = path_manager.snapshot_dir();
    if !snapshot_dir.exists() {
        output.info("No snapshot cache found to clear");
        return Ok(());
    }

    cache_store(path_manager)
        .clear_all()
        .await
        .map_err(|e| eyre!("Failed to clear snapshots at {}: {}", snapshot_dir.display(), e))?;
    output.success(format!("Cleared snapshot cache: {}", snapshot_dir.display()));
    Ok(())
}

/// Drops the Trakt tokens but keeps anything else in the credentials file.
fn clear_credentials(path_manager: &PathManager, output: &Output) -> Result<()> {
    let credentials_file = path_manager.credentials_file();
    if !credentials_file.exists() {
        output.info("No credentials file found to clear");
        return Ok(());
    }

    let mut cred_store = CredentialStore::new(credentials_file.clone());
    cred_store
        .load()
        .map_err(|e| eyre!("Failed to load credentials: {}", e))?;
    cred_store.clear_trakt();
    cred_store
        .save()
        .map_err(|e| eyre!("Failed to save credentials: {}", e))?;
    output.success(format!("Cleared Trakt tokens from {}", credentials_file.display()));
    Ok(())
}
