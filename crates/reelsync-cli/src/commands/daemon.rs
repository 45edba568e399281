use super::{build_orchestrator, load_config};
use crate::logging;
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use media_sync_config::{default_scheduler_config, PathManager, SchedulerConfig};
use media_sync_core::{SyncOrchestrator, SyncRunOptions, SyncSettings};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

pub struct Scheduler {
    scheduler: JobScheduler,
    orchestrator: Arc<SyncOrchestrator>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub async fn new(orchestrator: Arc<SyncOrchestrator>, config: SchedulerConfig) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler,
            orchestrator,
            config,
        })
    }

    /// One fire-and-forget task per library kind. A kind whose previous run
    /// has not finished is left alone until the next tick.
    fn tick(orchestrator: &Arc<SyncOrchestrator>, options: SyncRunOptions) {
        for &kind in &orchestrator.settings().kinds {
            if orchestrator.is_running(kind) {
                info!(operation = "scheduled_sync", kind = %kind, "Sync already in progress, skipping this tick");
                continue;
            }
            info!(operation = "scheduled_sync", kind = %kind, "Starting scheduled sync");
            orchestrator.spawn(kind, options);
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        if self.config.run_on_startup {
            info!(operation = "scheduler_startup", "Running initial sync on startup");
            Self::tick(&self.orchestrator, SyncRunOptions::default());
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let job = Job::new_async(self.config.schedule.as_str(), move |_uuid, _lock| {
            let orchestrator = Arc::clone(&orchestrator);
            Box::pin(async move {
                Self::tick(&orchestrator, SyncRunOptions::default());
            })
        })
        .map_err(|e| eyre!("Invalid cron schedule '{}': {}", self.config.schedule, e))?;

        self.scheduler.add(job).await?;
        self.scheduler.start().await?;

        info!(
            operation = "scheduler_started",
            schedule = %self.config.schedule,
            kinds = ?self.orchestrator.settings().kinds,
            "Scheduler started"
        );
        Ok(())
    }

    /// Stop scheduling and let in-flight runs end at their next batch boundary.
    pub async fn shutdown(&mut self) -> Result<()> {
        // No new tick may start after the stop request, it would clear the flag
        self.scheduler.shutdown().await?;
        self.orchestrator.request_stop();
        Ok(())
    }
}

pub async fn run_daemon(
    schedule_override: Option<String>,
    no_startup_sync: bool,
    verbose: u8,
    quiet: bool,
    output: &Output,
) -> Result<()> {
    let path_manager = PathManager::default();
    path_manager
        .ensure_directories()
        .map_err(|e| eyre!("Failed to create data directories: {}", e))?;

    let log_file = path_manager.daemon_log_file();
    logging::init_logging_with_file(verbose, quiet, Some(&log_file)).map_err(|e| eyre!("{}", e))?;
    output.info(format!("Logging to {}", log_file.display()));

    let config = load_config(&path_manager)?;
    let defaults = config.scheduler.clone().unwrap_or_else(default_scheduler_config);
    let scheduler_config = SchedulerConfig {
        schedule: schedule_override.unwrap_or(defaults.schedule),
        run_on_startup: defaults.run_on_startup && !no_startup_sync,
    };

    let orchestrator = build_orchestrator(&path_manager, &config, SyncSettings::from_config(&config)).await?;
    let mut scheduler = Scheduler::new(Arc::new(orchestrator), scheduler_config.clone())
        .await
        .map_err(|e| eyre!("Failed to create scheduler: {}", e))?;
    scheduler.start().await?;
    output.success(format!("Daemon running on schedule '{}'", scheduler_config.schedule));

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| eyre!("Failed to listen for shutdown signal: {}", e))?;
    info!(operation = "scheduler_shutdown", "Shutdown requested");
    if let Err(e) = scheduler.shutdown().await {
        error!(operation = "scheduler_shutdown", error = %e, "Scheduler did not shut down cleanly");
    }
    Ok(())
}
