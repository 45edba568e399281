use media_sync_config::Config;
use media_sync_models::{Facet, FacetKey, LibraryKind, MediaRecord, SyncBatch, SyncPlan};
use media_sync_sources::{LocalLibrary, RemoteService, SourceError};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use futures::future::join_all;
use tracing::{debug, error, info, instrument, warn};

use crate::activity::{ActivityGate, Freshness};
use crate::cache::CacheStore;
use crate::diff::{build_batches, compute_facet_diff, dedup_by_key, DiffPolicy};
use crate::error::SyncError;
use crate::progress::BatchProgress;

/// Where a run of one library kind currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncPhase {
    Idle,
    FetchingRemote,
    Diffing,
    ApplyingRemote,
    ApplyingLocal,
    UpdatingCache,
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub kinds: Vec<LibraryKind>,
    pub facets: Vec<Facet>,
    pub policy: DiffPolicy,
    /// Pause between remote batches
    pub batch_delay: Duration,
    /// Ceiling for every collaborator call
    pub request_timeout: Duration,
    pub movie_batch_size: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            kinds: LibraryKind::ALL.to_vec(),
            facets: Facet::ALL.to_vec(),
            policy: DiffPolicy::default(),
            batch_delay: Duration::from_millis(1000),
            request_timeout: Duration::from_secs(30),
            movie_batch_size: 100,
        }
    }
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            kinds: config.sync.kinds(),
            facets: config.sync.facets(),
            policy: DiffPolicy {
                thresholds: config.playback,
                keep_library_clean: config.sync.keep_library_clean,
                remove_watched_from_watchlist: config.sync.remove_watched_from_watchlist,
                active_sources: config.library.active_sources().len(),
            },
            batch_delay: config.throttle.batch_delay(),
            request_timeout: config.throttle.request_timeout(),
            movie_batch_size: config.throttle.movie_batch_size,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SyncRunOptions {
    /// Stop after diffing and report the plans
    pub dry_run: bool,
    /// Refetch every facet regardless of activity markers
    pub force_refresh: bool,
    /// Wait for a running sync of the same kind instead of rejecting
    pub wait_if_running: bool,
}

/// Best-effort outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub kind: LibraryKind,
    pub pushed: usize,
    pub pulled: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Another run of the same kind was in progress
    pub rejected: bool,
    pub dry_run: bool,
    /// Stopped early on request
    pub stopped: bool,
    /// Computed plans (dry runs only)
    pub plans: Vec<SyncPlan>,
    pub errors: Vec<String>,
    pub duration: Duration,
}

impl SyncReport {
    pub fn new(kind: LibraryKind) -> Self {
        Self {
            kind,
            pushed: 0,
            pulled: 0,
            removed: 0,
            skipped: 0,
            failed: 0,
            rejected: false,
            dry_run: false,
            stopped: false,
            plans: Vec::new(),
            errors: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    fn rejected(kind: LibraryKind) -> Self {
        let mut report = Self::new(kind);
        report.rejected = true;
        report.errors.push(SyncError::ConcurrentSyncRejected(kind).to_string());
        report
    }

    fn record_error(&mut self, error: &SyncError) {
        self.errors.push(error.to_string());
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || !self.errors.is_empty()
    }

    pub fn log_summary(&self) {
        if self.rejected {
            info!(operation = "sync_complete", kind = %self.kind, "Sync already in progress, skipped");
        } else if self.failed > 0 {
            warn!(
                operation = "sync_complete",
                kind = %self.kind,
                pushed = self.pushed,
                pulled = self.pulled,
                removed = self.removed,
                skipped = self.skipped,
                failed = self.failed,
                errors = self.errors.len(),
                "Sync of {} finished with failures in {:.1}s",
                self.kind,
                self.duration.as_secs_f64()
            );
        } else {
            info!(
                operation = "sync_complete",
                kind = %self.kind,
                pushed = self.pushed,
                pulled = self.pulled,
                removed = self.removed,
                skipped = self.skipped,
                "Sync of {} finished in {:.1}s",
                self.kind,
                self.duration.as_secs_f64()
            );
        }
    }
}

/// At most one run per library kind.
pub struct SingleFlight {
    locks: HashMap<LibraryKind, Arc<Mutex<()>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self {
            locks: LibraryKind::ALL
                .into_iter()
                .map(|kind| (kind, Arc::new(Mutex::new(()))))
                .collect(),
        }
    }

    fn lock_for(&self, kind: LibraryKind) -> Arc<Mutex<()>> {
        self.locks.get(&kind).cloned().unwrap_or_default()
    }

    pub fn try_acquire(&self, kind: LibraryKind) -> Option<OwnedMutexGuard<()>> {
        self.lock_for(kind).try_lock_owned().ok()
    }

    pub async fn acquire(&self, kind: LibraryKind) -> OwnedMutexGuard<()> {
        self.lock_for(kind).lock_owned().await
    }

    pub fn is_running(&self, kind: LibraryKind) -> bool {
        self.lock_for(kind).try_lock().is_err()
    }
}

impl Default for SingleFlight {
    fn default() -> Self {
        Self::new()
    }
}

/// Remote state of one facet for this run.
struct RemoteSnapshot {
    records: Vec<MediaRecord>,
    /// Fetched this run, or confirmed fresh by the activity check
    verified: bool,
}

/// Work computed for one facet: merged over all local sources.
struct FacetWork {
    facet: Facet,
    verified: bool,
    push: Vec<MediaRecord>,
    remove: Vec<MediaRecord>,
    /// Pulls tagged with the index of the local source that owns them
    pulls: Vec<(usize, MediaRecord)>,
}

#[derive(Default)]
struct FacetOutcome {
    pushed: Vec<MediaRecord>,
    removed: Vec<MediaRecord>,
    failed: bool,
    completed: bool,
    verified: bool,
}

impl FacetOutcome {
    fn mutated(&self) -> bool {
        !self.pushed.is_empty() || !self.removed.is_empty()
    }

    /// Mutated on top of a snapshot known to match the remote, so the
    /// marker read after the batches may be recorded.
    fn advances_marker(&self) -> bool {
        self.mutated() && self.verified && !self.failed && self.completed
    }
}

/// Record as the remote holds it after a successful push.
fn converged(facet: Facet, record: &MediaRecord) -> MediaRecord {
    let mut record = record.clone();
    record.local_id = None;
    record.progress = None;
    match facet {
        Facet::Watched => {
            record.plays = record.plays.max(1);
            record.watched = true;
            record.unseen = false;
        }
        Facet::Collection => record.collected = true,
        Facet::Ratings | Facet::Watchlist => {}
    }
    record
}

pub struct SyncOrchestrator {
    remote: Arc<dyn RemoteService>,
    locals: Vec<Arc<dyn LocalLibrary>>,
    cache: Arc<CacheStore>,
    settings: SyncSettings,
    flights: SingleFlight,
    phases: std::sync::Mutex<HashMap<LibraryKind, SyncPhase>>,
    stop: Arc<AtomicBool>,
}

impl SyncOrchestrator {
    pub fn new(
        remote: Arc<dyn RemoteService>,
        locals: Vec<Arc<dyn LocalLibrary>>,
        cache: Arc<CacheStore>,
        mut settings: SyncSettings,
    ) -> Self {
        settings.policy.active_sources = locals.len();
        Self {
            remote,
            locals,
            cache,
            settings,
            flights: SingleFlight::new(),
            phases: std::sync::Mutex::new(HashMap::new()),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Flag checked between remote batches; setting it ends runs early.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Ask running syncs to end at their next batch boundary. The flag is
    /// cleared when a run starts while no other kind is in progress.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn phase(&self, kind: LibraryKind) -> SyncPhase {
        self.phases
            .lock()
            .map(|phases| phases.get(&kind).copied().unwrap_or(SyncPhase::Idle))
            .unwrap_or(SyncPhase::Idle)
    }

    fn set_phase(&self, kind: LibraryKind, phase: SyncPhase) {
        debug!(kind = %kind, phase = ?phase, "Sync phase");
        if let Ok(mut phases) = self.phases.lock() {
            phases.insert(kind, phase);
        }
    }

    pub fn is_running(&self, kind: LibraryKind) -> bool {
        self.flights.is_running(kind)
    }

    /// Run a collaborator call under the request timeout.
    async fn call<T, F>(&self, context: &str, fut: F) -> Result<T, SyncError>
    where
        F: Future<Output = Result<T, SourceError>>,
    {
        match tokio::time::timeout(self.settings.request_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(SyncError::from_source(context, e)),
            Err(_) => Err(SyncError::timeout(context, self.settings.request_timeout)),
        }
    }

    /// Sync every configured kind concurrently.
    pub async fn sync_all(&self, options: SyncRunOptions) -> Vec<SyncReport> {
        let futures = self.settings.kinds.iter().map(|&kind| self.sync_kind(kind, options));
        join_all(futures).await
    }

    /// Fire-and-forget run; the handle yields the report for callers that want it.
    pub fn spawn(self: &Arc<Self>, kind: LibraryKind, options: SyncRunOptions) -> JoinHandle<SyncReport> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let report = this.sync_kind(kind, options).await;
            report.log_summary();
            report
        })
    }

    /// Sync one library kind. Never fails: problems end up in the report.
    #[instrument(skip(self, options))]
    pub async fn sync_kind(&self, kind: LibraryKind, options: SyncRunOptions) -> SyncReport {
        let guard = if options.wait_if_running {
            Some(self.flights.acquire(kind).await)
        } else {
            self.flights.try_acquire(kind)
        };
        let Some(_guard) = guard else {
            info!(operation = "sync_start", kind = %kind, "Sync already in progress");
            return SyncReport::rejected(kind);
        };

        if LibraryKind::ALL.into_iter().filter(|&k| k != kind).all(|k| !self.is_running(k)) {
            self.stop.store(false, Ordering::SeqCst);
        }

        let start = Instant::now();
        let mut report = SyncReport::new(kind);
        report.dry_run = options.dry_run;
        info!(operation = "sync_start", kind = %kind, dry_run = options.dry_run, "Starting sync");

        self.run(kind, options, &mut report).await;

        self.set_phase(kind, SyncPhase::Idle);
        report.duration = start.elapsed();
        report
    }

    async fn run(&self, kind: LibraryKind, options: SyncRunOptions, report: &mut SyncReport) {
        self.set_phase(kind, SyncPhase::FetchingRemote);
        let activities = self.call("fetch_last_activity", self.remote.fetch_last_activity()).await;
        let gate = ActivityGate::new(activities, options.force_refresh);

        let mut policy = self.settings.policy.clone();
        let locals = self.load_local_records(kind, report).await;
        if locals.len() < self.locals.len() {
            // A missing source would make its items look deleted
            policy.keep_library_clean = false;
        }

        let snapshots = self.remote_snapshots(kind, &gate, report).await;

        self.set_phase(kind, SyncPhase::Diffing);
        let mut works = Vec::new();
        for &facet in &self.settings.facets {
            let Some(snapshot) = snapshots.get(&facet) else { continue };
            let remote = &snapshot.records;
            let mut work = FacetWork {
                facet,
                verified: snapshot.verified,
                push: Vec::new(),
                remove: Vec::new(),
                pulls: Vec::new(),
            };
            for (source, records) in &locals {
                let plan = compute_facet_diff(facet, records, remote, &policy);
                report.skipped += plan.skipped;
                work.push.extend(plan.to_push_remote.iter().cloned());
                work.remove.extend(plan.to_remove_remote.iter().cloned());
                work.pulls.extend(plan.to_pull_local.iter().cloned().map(|r| (*source, r)));
                if options.dry_run {
                    report.plans.push(plan);
                }
            }
            dedup_by_key(&mut work.push);
            dedup_by_key(&mut work.remove);
            info!(
                operation = "diff",
                kind = %kind,
                facet = %facet,
                push = work.push.len(),
                pull = work.pulls.len(),
                remove = work.remove.len(),
                "Computed {} diff",
                FacetKey::new(kind, facet)
            );
            works.push(work);
        }

        if options.dry_run {
            info!(kind = %kind, plans = report.plans.len(), "Dry run, nothing applied");
            return;
        }

        self.set_phase(kind, SyncPhase::ApplyingRemote);
        let outcomes = self.apply_remote(kind, &works, report).await;

        self.set_phase(kind, SyncPhase::ApplyingLocal);
        if report.stopped {
            info!(kind = %kind, "Stop requested, skipping local updates");
        } else {
            self.apply_local(kind, &works, report).await;
        }

        self.set_phase(kind, SyncPhase::UpdatingCache);
        self.update_cache(kind, &outcomes, report).await;
    }

    /// Local records per source; a failing source is left out of this run.
    async fn load_local_records(&self, kind: LibraryKind, report: &mut SyncReport) -> Vec<(usize, Vec<MediaRecord>)> {
        let mut locals = Vec::with_capacity(self.locals.len());
        for (index, library) in self.locals.iter().enumerate() {
            let context = format!("{} get_all_local_records", library.source_name());
            match self.call(&context, library.get_all_local_records(kind)).await {
                Ok(records) => {
                    debug!(source = library.source_name(), count = records.len(), "Loaded local records");
                    locals.push((index, records));
                }
                Err(e) => {
                    error!(operation = "load_local", source = library.source_name(), error = %e, "Failed to read local library");
                    report.record_error(&e);
                }
            }
        }
        locals
    }

    /// Remote snapshot per facet: refetched when the gate says so, otherwise
    /// served from the cache. Facets without usable data are left out.
    async fn remote_snapshots(
        &self,
        kind: LibraryKind,
        gate: &ActivityGate,
        report: &mut SyncReport,
    ) -> HashMap<Facet, RemoteSnapshot> {
        let mut snapshots = HashMap::new();
        let mut group = self.cache.lock(kind).await;

        for &facet in &self.settings.facets {
            let key = FacetKey::new(kind, facet);
            let (freshness, known, cached) = {
                let cache = group.get(facet).await;
                (gate.assess(key, cache), cache.is_known(), cache.records())
            };
            debug!(facet = %key, freshness = ?freshness, "Checked facet freshness");

            if !freshness.should_refetch() {
                if known {
                    let verified = freshness == Freshness::Fresh;
                    snapshots.insert(facet, RemoteSnapshot { records: cached, verified });
                } else {
                    // Diffing against an unknown cache would push everything
                    warn!(facet = %key, "No cached snapshot and no activity check, skipping facet");
                }
                continue;
            }

            let context = format!("fetch_facet_snapshot {}", key);
            match self.call(&context, self.remote.fetch_facet_snapshot(kind, facet)).await {
                Ok(records) => {
                    group.replace(facet, records.clone(), None).await;
                    gate.record_fetched(key, group.get(facet).await);
                    if let Err(e) = group.persist(facet).await {
                        warn!(facet = %key, error = %e, "Failed to persist snapshot");
                        report.record_error(&e);
                    }
                    snapshots.insert(facet, RemoteSnapshot { records, verified: true });
                }
                Err(e @ SyncError::RemoteUnavailable(_)) if known => {
                    warn!(facet = %key, error = %e, "Remote unavailable, serving cached snapshot");
                    report.record_error(&e);
                    snapshots.insert(facet, RemoteSnapshot { records: cached, verified: false });
                }
                Err(e) => {
                    warn!(facet = %key, error = %e, "No remote data for facet this run");
                    report.record_error(&e);
                }
            }
        }
        snapshots
    }

    async fn apply_remote(
        &self,
        kind: LibraryKind,
        works: &[FacetWork],
        report: &mut SyncReport,
    ) -> HashMap<Facet, FacetOutcome> {
        let mut outcomes: HashMap<Facet, FacetOutcome> = HashMap::new();
        let mut first_batch = true;

        for work in works {
            let key = FacetKey::new(kind, work.facet);
            let outcome = outcomes.entry(work.facet).or_default();
            outcome.verified = work.verified;
            if report.stopped {
                continue;
            }

            let plans = [
                (build_batches(&work.push, self.settings.movie_batch_size), false),
                (build_batches(&work.remove, self.settings.movie_batch_size), true),
            ];
            for (batches, remove) in plans {
                if batches.is_empty() || report.stopped {
                    continue;
                }
                let operation = if remove { "remove_batch" } else { "push_batch" };
                let mut progress = BatchProgress::new(key, operation, batches.len());

                for batch in &batches {
                    if self.stop_requested() {
                        info!(facet = %key, "Stop requested, leaving remaining batches");
                        report.stopped = true;
                        break;
                    }
                    if !first_batch {
                        tokio::time::sleep(self.settings.batch_delay).await;
                    }
                    first_batch = false;

                    let context = format!("{} {} {}", operation, key, batch.label());
                    match self.apply_batch(kind, work.facet, batch, remove, &context).await {
                        Ok(response) => {
                            let applied = batch.len().saturating_sub(response.skipped);
                            report.skipped += response.skipped;
                            if remove {
                                report.removed += applied;
                                outcome.removed.extend(batch.records().into_iter().cloned());
                            } else {
                                report.pushed += applied;
                                outcome.pushed.extend(batch.records().into_iter().map(|r| converged(work.facet, r)));
                            }
                            if !response.errors.is_empty() {
                                outcome.failed = true;
                                report.errors.extend(response.errors.iter().map(|e| format!("{}: {}", context, e)));
                            }
                            progress.record_applied(applied, response.skipped);
                        }
                        Err(e) => {
                            warn!(operation, facet = %key, batch = %batch.label(), error = %e, "Remote batch failed, continuing");
                            report.failed += batch.len();
                            report.record_error(&e);
                            outcome.failed = true;
                            progress.record_failed(batch.len());
                        }
                    }
                }
                progress.log_summary();
            }
            outcome.completed = !report.stopped;
        }
        outcomes
    }

    async fn apply_batch(
        &self,
        kind: LibraryKind,
        facet: Facet,
        batch: &SyncBatch,
        remove: bool,
        context: &str,
    ) -> Result<media_sync_models::BatchResponse, SyncError> {
        if remove {
            self.call(context, self.remote.remove_batch(kind, facet, batch)).await
        } else {
            self.call(context, self.remote.push_batch(kind, facet, batch)).await
        }
    }

    /// Local updates, isolated per item.
    async fn apply_local(&self, kind: LibraryKind, works: &[FacetWork], report: &mut SyncReport) {
        for work in works {
            for (source, desired) in &work.pulls {
                let Some(library) = self.locals.get(*source) else { continue };
                let Some(local_id) = desired.local_id else {
                    report.skipped += 1;
                    continue;
                };
                let context = format!("{} update {} {}", library.source_name(), work.facet, desired.label());
                let result = match work.facet {
                    Facet::Watched => self.call(&context, library.set_watched(local_id, desired.watched)).await,
                    Facet::Collection => {
                        self.call(&context, library.set_collection_flag(local_id, desired.collected)).await
                    }
                    Facet::Ratings => match desired.rating {
                        Some(rating) => self.call(&context, library.set_rating(local_id, rating)).await,
                        None => continue,
                    },
                    Facet::Watchlist => continue,
                };
                match result {
                    Ok(()) => {
                        debug!(kind = %kind, facet = %work.facet, item = %desired.label(), "Updated local item");
                        report.pulled += 1;
                    }
                    Err(e) => {
                        warn!(kind = %kind, facet = %work.facet, item = %desired.label(), error = %e, "Local update failed");
                        report.failed += 1;
                        report.record_error(&e);
                    }
                }
            }
        }
    }

    /// Fold applied batches into the cache and advance markers of facets
    /// whose batches all went through on top of a verified snapshot. A facet
    /// served from an unverified cache keeps its old marker so the next
    /// run with a working activity check sees it stale and refetches.
    async fn update_cache(&self, kind: LibraryKind, outcomes: &HashMap<Facet, FacetOutcome>, report: &mut SyncReport) {
        let needs_update = outcomes.values().any(|o| o.mutated() || o.failed || !o.completed);
        if !needs_update {
            return;
        }

        let refreshed = if outcomes.values().any(FacetOutcome::advances_marker) {
            match self.call("fetch_last_activity", self.remote.fetch_last_activity()).await {
                Ok(activities) => Some(activities),
                Err(e) => {
                    warn!(kind = %kind, error = %e, "Could not refresh activity markers after sync");
                    None
                }
            }
        } else {
            None
        };

        let mut group = self.cache.lock(kind).await;
        for (facet, outcome) in outcomes.iter() {
            let key = FacetKey::new(kind, *facet);
            group.mutate(*facet, &outcome.pushed, &outcome.removed).await;

            let cache = group.get(*facet).await;
            if outcome.failed || !outcome.completed {
                debug!(facet = %key, "Facet not converged, will refetch next run");
                cache.mark_unknown();
            } else if outcome.advances_marker() {
                if let Some(activities) = &refreshed {
                    cache.set_last_activity(activities.get(key).cloned());
                }
            } else if outcome.mutated() {
                debug!(facet = %key, "Snapshot was not verified, keeping its marker");
            }

            if outcome.mutated() || outcome.failed || !outcome.completed {
                if let Err(e) = group.persist(*facet).await {
                    warn!(facet = %key, error = %e, "Failed to persist snapshot");
                    report.record_error(&e);
                }
            }
        }
    }
}
