// Per-facet diff computation between local records and the remote snapshot

use media_sync_models::{Facet, MediaKind, MediaRecord, PlaybackThresholds, ShowGroup, SyncBatch, SyncPlan};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::keys::{lookup_key, show_key, RecordIndex};

/// Policy knobs the diff depends on.
#[derive(Debug, Clone)]
pub struct DiffPolicy {
    pub thresholds: PlaybackThresholds,
    pub keep_library_clean: bool,
    pub remove_watched_from_watchlist: bool,
    /// Number of enabled local library sources
    pub active_sources: usize,
}

impl Default for DiffPolicy {
    fn default() -> Self {
        Self {
            thresholds: PlaybackThresholds::default(),
            keep_library_clean: false,
            remove_watched_from_watchlist: false,
            active_sources: 1,
        }
    }
}

impl DiffPolicy {
    /// Collection cleanup deletes remote items no local source owns; with
    /// several sources that cannot be decided, so it is off.
    pub fn cleanup_enabled(&self) -> bool {
        self.keep_library_clean && self.active_sources == 1
    }

    fn locally_watched(&self, record: &MediaRecord) -> bool {
        record.watched || record.plays > 0 || record.progress.map_or(false, |p| self.thresholds.counts_as_watched(p))
    }
}

fn remotely_watched(record: &MediaRecord) -> bool {
    record.plays > 0 && !record.unseen
}

/// Record kinds a facet carries.
pub fn facet_applies(facet: Facet, kind: MediaKind) -> bool {
    match facet {
        Facet::Watched | Facet::Collection => matches!(kind, MediaKind::Movie | MediaKind::Episode),
        Facet::Ratings => matches!(kind, MediaKind::Movie | MediaKind::Show | MediaKind::Episode),
        Facet::Watchlist => matches!(kind, MediaKind::Movie | MediaKind::Show),
    }
}

/// Desired local state for `local`, carrying any IDs the remote knows.
fn pulled(local: &MediaRecord, remote: &MediaRecord) -> MediaRecord {
    let mut record = local.clone();
    record.ids.merge(&remote.ids);
    record
}

fn local_is_newer(local: &MediaRecord, remote: &MediaRecord) -> bool {
    match (local.rated_at, remote.rated_at) {
        (Some(l), Some(r)) => l > r,
        _ => false,
    }
}

/// Compute the operations that converge one facet.
///
/// Placeholder episodes (episode 0 or missing numbers) and unidentifiable
/// local records are dropped before diffing and counted in `skipped`.
/// Remote records with no local counterpart are never pulled.
pub fn compute_facet_diff(facet: Facet, local: &[MediaRecord], remote: &[MediaRecord], policy: &DiffPolicy) -> SyncPlan {
    let mut plan = SyncPlan::new(facet);

    let mut local_items = Vec::with_capacity(local.len());
    for record in local.iter().filter(|r| facet_applies(facet, r.kind)) {
        if !record.has_valid_episode_number() {
            plan.skipped += 1;
        } else if !record.is_identifiable() {
            debug!(facet = %facet, "Skipping local record without identifiers or title");
            plan.skipped += 1;
        } else if facet == Facet::Ratings && record.rating.map_or(false, |r| !(1..=10).contains(&r)) {
            debug!(facet = %facet, "Skipping out-of-range rating for {}", record.label());
            plan.skipped += 1;
        } else {
            local_items.push(record.clone());
        }
    }

    let mut remote_items = Vec::with_capacity(remote.len());
    for record in remote.iter().filter(|r| facet_applies(facet, r.kind)) {
        if record.has_valid_episode_number() {
            remote_items.push(record.clone());
        } else {
            plan.skipped += 1;
        }
    }

    let remote_index = RecordIndex::new(&remote_items);
    let local_index = RecordIndex::new(&local_items);

    match facet {
        Facet::Watched => {
            for record in local_items.iter().filter(|r| policy.locally_watched(r)) {
                match remote_index.find(record) {
                    // Explicit remote "not watched" wins over the local flag
                    Some(remote) if remote.unseen => {
                        let mut desired = pulled(record, remote);
                        desired.watched = false;
                        desired.plays = 0;
                        plan.to_pull_local.push(desired);
                    }
                    Some(remote) if remotely_watched(remote) => {}
                    _ => plan.to_push_remote.push(record.clone()),
                }
            }
            for remote in remote_items.iter().filter(|r| remotely_watched(r)) {
                for record in local_index.find_all(remote) {
                    if !policy.locally_watched(record) {
                        let mut desired = pulled(record, remote);
                        desired.watched = true;
                        desired.watched_at = remote.watched_at;
                        plan.to_pull_local.push(desired);
                    }
                }
            }
        }
        Facet::Collection => {
            for record in local_items.iter().filter(|r| r.collected) {
                if !remote_index.contains(record) {
                    plan.to_push_remote.push(record.clone());
                }
            }
            for remote in &remote_items {
                let copies = local_index.find_all(remote);
                if copies.is_empty() {
                    if policy.cleanup_enabled() {
                        plan.to_remove_remote.push(remote.clone());
                    }
                    continue;
                }
                for record in copies.into_iter().filter(|r| !r.collected) {
                    let mut desired = pulled(record, remote);
                    desired.collected = true;
                    desired.collected_at = remote.collected_at;
                    plan.to_pull_local.push(desired);
                }
            }
        }
        Facet::Ratings => {
            for record in &local_items {
                let Some(local_rating) = record.rating else { continue };
                match remote_index.find(record) {
                    Some(remote) => match remote.rating {
                        Some(remote_rating) if remote_rating == local_rating => {}
                        Some(remote_rating) if !local_is_newer(record, remote) => {
                            let mut desired = pulled(record, remote);
                            desired.rating = Some(remote_rating);
                            desired.rated_at = remote.rated_at;
                            plan.to_pull_local.push(desired);
                        }
                        _ => plan.to_push_remote.push(record.clone()),
                    },
                    None => plan.to_push_remote.push(record.clone()),
                }
            }
            for remote in &remote_items {
                let Some(remote_rating) = remote.rating else { continue };
                for record in local_index.find_all(remote) {
                    if record.rating.is_none() {
                        let mut desired = pulled(record, remote);
                        desired.rating = Some(remote_rating);
                        desired.rated_at = remote.rated_at;
                        plan.to_pull_local.push(desired);
                    }
                }
            }
        }
        Facet::Watchlist => {
            if policy.remove_watched_from_watchlist {
                for remote in &remote_items {
                    if local_index.find_all(remote).into_iter().any(|record| policy.locally_watched(record)) {
                        plan.to_remove_remote.push(remote.clone());
                    }
                }
            }
        }
    }

    dedup_by_key(&mut plan.to_push_remote);
    dedup_by_key(&mut plan.to_remove_remote);

    debug!(
        facet = %facet,
        push = plan.to_push_remote.len(),
        pull = plan.to_pull_local.len(),
        remove = plan.to_remove_remote.len(),
        skipped = plan.skipped,
        "Computed facet diff"
    );
    plan
}

/// Duplicate local files of one item must not be pushed twice.
pub(crate) fn dedup_by_key(records: &mut Vec<MediaRecord>) {
    let mut seen = HashSet::new();
    records.retain(|record| seen.insert(lookup_key(record)));
}

/// Regroup episode-level records by parent show and season.
///
/// Non-episode records are ignored. Groups come out ordered by show key,
/// episodes ordered by number within a season.
pub fn group_by_show(records: &[MediaRecord]) -> Vec<ShowGroup> {
    let mut groups: BTreeMap<String, ShowGroup> = BTreeMap::new();
    for record in records.iter().filter(|r| r.is_episode_level()) {
        let (Some(season), Some(_)) = (record.season, record.episode) else { continue };
        let group = groups.entry(show_key(record)).or_insert_with(|| ShowGroup {
            ids: record.ids.clone(),
            title: record.title.clone(),
            year: record.year,
            seasons: BTreeMap::new(),
        });
        group.ids.merge(&record.ids);
        group.seasons.entry(season).or_default().push(record.clone());
    }

    let mut groups: Vec<ShowGroup> = groups.into_values().collect();
    for group in &mut groups {
        for episodes in group.seasons.values_mut() {
            episodes.sort_by_key(|e| e.episode);
        }
    }
    groups
}

/// Split an operation list into remote batches: flat chunks of at most
/// `batch_size` movie/show records, and one batch per show for episodes.
pub fn build_batches(records: &[MediaRecord], batch_size: usize) -> Vec<SyncBatch> {
    let flat: Vec<MediaRecord> = records.iter().filter(|r| !r.is_episode_level()).cloned().collect();
    let mut batches: Vec<SyncBatch> = flat
        .chunks(batch_size.max(1))
        .map(|chunk| SyncBatch::Items(chunk.to_vec()))
        .collect();
    batches.extend(group_by_show(records).into_iter().map(SyncBatch::Show));
    batches
}

#[cfg(test)]
mod tests;
