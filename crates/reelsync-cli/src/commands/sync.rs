use super::{build_orchestrator, load_config};
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use media_sync_config::PathManager;
use media_sync_core::{SyncRunOptions, SyncSettings};
use media_sync_models::LibraryKind;

/// Library kinds picked on the command line; none picked means the configured set.
fn selected_kinds(movies: bool, shows: bool, configured: Vec<LibraryKind>) -> Vec<LibraryKind> {
    if !movies && !shows {
        return configured;
    }
    LibraryKind::ALL
        .into_iter()
        .filter(|kind| match kind {
            LibraryKind::Movies => movies,
            LibraryKind::Shows => shows,
        })
        .collect()
}

pub async fn run_sync(movies: bool, shows: bool, force_refresh: bool, dry_run: bool, output: &Output) -> Result<()> {
    tracing::debug!("Sync command started");

    let path_manager = PathManager::default();
    let config = load_config(&path_manager)?;

    let mut settings = SyncSettings::from_config(&config);
    settings.kinds = selected_kinds(movies, shows, settings.kinds);
    if settings.kinds.is_empty() {
        output.warn("Both movies and shows are disabled in the configuration, nothing to sync");
        return Ok(());
    }

    let orchestrator = build_orchestrator(&path_manager, &config, settings).await?;
    let options = SyncRunOptions {
        dry_run,
        force_refresh,
        wait_if_running: false,
    };

    let reports = orchestrator.sync_all(options).await;
    for report in &reports {
        report.log_summary();
        output.sync_report(report);
    }

    let failed = reports.iter().filter(|r| r.has_failures()).count();
    if failed > 0 {
        return Err(eyre!("Sync finished with failures in {} of {} library kind(s)", failed, reports.len()));
    }
    Ok(())
}
