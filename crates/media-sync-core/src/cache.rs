use chrono::{DateTime, Utc};
use media_sync_config::paths::snapshot_file_in;
use media_sync_models::{ActivityMarker, Facet, FacetKey, LibraryKind, MediaRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::id_matching::matches;
use crate::keys::lookup_key;

/// Remote-side snapshot of one facet.
#[derive(Debug, Clone, Default)]
pub struct FacetCache {
    items: BTreeMap<String, MediaRecord>,
    last_activity: Option<ActivityMarker>,
    /// False until the snapshot has been loaded from disk or fetched; an
    /// unknown cache is always refetched.
    known: bool,
}

impl FacetCache {
    pub fn items(&self) -> impl Iterator<Item = &MediaRecord> {
        self.items.values()
    }

    pub fn records(&self) -> Vec<MediaRecord> {
        self.items.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last_activity(&self) -> Option<&ActivityMarker> {
        self.last_activity.as_ref()
    }

    pub fn is_known(&self) -> bool {
        self.known
    }

    pub fn set_last_activity(&mut self, marker: Option<ActivityMarker>) {
        self.last_activity = marker;
        self.known = true;
    }

    /// Keep the items but forget which remote state they reflect.
    pub fn mark_unknown(&mut self) {
        self.last_activity = None;
        self.known = false;
    }

    fn replace(&mut self, records: Vec<MediaRecord>, marker: Option<ActivityMarker>) {
        self.items = records.into_iter().map(|r| (lookup_key(&r), r)).collect();
        self.set_last_activity(marker);
    }

    fn mutate(&mut self, add: &[MediaRecord], remove: &[MediaRecord]) {
        for record in remove.iter().chain(add) {
            self.items.retain(|_, cached| !matches(record, cached));
        }
        for record in add {
            self.items.insert(lookup_key(record), record.clone());
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    last_activity: Option<ActivityMarker>,
    saved_at: DateTime<Utc>,
    items: Vec<MediaRecord>,
}

/// All facet caches of one library kind. Access goes through the group lock.
pub struct FacetGroup {
    kind: LibraryKind,
    dir: Option<PathBuf>,
    facets: HashMap<Facet, FacetCache>,
}

impl FacetGroup {
    fn new(kind: LibraryKind, dir: Option<PathBuf>) -> Self {
        Self {
            kind,
            dir,
            facets: HashMap::new(),
        }
    }

    pub fn kind(&self) -> LibraryKind {
        self.kind
    }

    fn snapshot_path(&self, facet: Facet) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| snapshot_file_in(dir, self.kind, facet))
    }

    /// The facet cache, loaded from its snapshot file on first access.
    pub async fn get(&mut self, facet: Facet) -> &mut FacetCache {
        if !self.facets.contains_key(&facet) {
            let loaded = self.load(facet).await;
            self.facets.insert(facet, loaded);
        }
        self.facets.entry(facet).or_default()
    }

    async fn load(&self, facet: Facet) -> FacetCache {
        let key = FacetKey::new(self.kind, facet);
        let Some(path) = self.snapshot_path(facet) else {
            return FacetCache::default();
        };

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Cache miss: {} (file does not exist)", key);
                return FacetCache::default();
            }
            Err(e) => {
                warn!("Failed to read cache file for {}: {}", key, e);
                return FacetCache::default();
            }
        };

        match serde_json::from_str::<SnapshotFile>(&content) {
            Ok(snapshot) => {
                info!("Cache hit: {} (loaded {} items)", key, snapshot.items.len());
                let mut cache = FacetCache::default();
                cache.replace(snapshot.items, snapshot.last_activity);
                cache
            }
            Err(e) => {
                warn!("Cache corruption detected for {}: {}. Deleting corrupted file.", key, e);
                if let Err(rm_err) = tokio::fs::remove_file(&path).await {
                    warn!("Failed to delete corrupted cache file: {}", rm_err);
                }
                FacetCache::default()
            }
        }
    }

    pub async fn replace(&mut self, facet: Facet, records: Vec<MediaRecord>, marker: Option<ActivityMarker>) {
        self.get(facet).await.replace(records, marker);
    }

    /// Apply a converged local view: `remove` entries are dropped, `add`
    /// entries replace whatever matched them.
    pub async fn mutate(&mut self, facet: Facet, add: &[MediaRecord], remove: &[MediaRecord]) {
        self.get(facet).await.mutate(add, remove);
    }

    /// Write the facet snapshot atomically (temp file + rename).
    pub async fn persist(&mut self, facet: Facet) -> Result<(), SyncError> {
        let Some(path) = self.snapshot_path(facet) else {
            return Ok(());
        };
        let key = FacetKey::new(self.kind, facet);
        let cache = self.get(facet).await;
        let snapshot = SnapshotFile {
            last_activity: cache.last_activity.clone(),
            saved_at: Utc::now(),
            items: cache.records(),
        };

        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| SyncError::Cache(format!("failed to serialize {}: {}", key, e)))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::Cache(format!("failed to create {}: {}", parent.display(), e)))?;
        }
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json)
            .await
            .map_err(|e| SyncError::Cache(format!("failed to write {}: {}", temp_path.display(), e)))?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| SyncError::Cache(format!("failed to replace {}: {}", path.display(), e)))?;

        debug!("Cache saved: {} (saved {} items)", key, snapshot.items.len());
        Ok(())
    }

    /// Drop the in-memory cache and its snapshot; the facet becomes unknown.
    pub async fn clear(&mut self, facet: Facet) -> Result<(), SyncError> {
        self.facets.insert(facet, FacetCache::default());
        if let Some(path) = self.snapshot_path(facet) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(SyncError::Cache(format!("failed to remove {}: {}", path.display(), e))),
            }
        }
        Ok(())
    }
}

/// Facet caches for a session, one lock per library kind.
pub struct CacheStore {
    dir: Option<PathBuf>,
    groups: HashMap<LibraryKind, Arc<Mutex<FacetGroup>>>,
}

impl CacheStore {
    /// Store backed by snapshot files under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::build(Some(dir.into()))
    }

    /// Store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self::build(None)
    }

    fn build(dir: Option<PathBuf>) -> Self {
        let groups = LibraryKind::ALL
            .into_iter()
            .map(|kind| (kind, Arc::new(Mutex::new(FacetGroup::new(kind, dir.clone())))))
            .collect();
        Self { dir, groups }
    }

    pub fn dir(&self) -> Option<&PathBuf> {
        self.dir.as_ref()
    }

    /// Lock the facet group of `kind`. Other kinds stay available.
    pub async fn lock(&self, kind: LibraryKind) -> OwnedMutexGuard<FacetGroup> {
        let group = self
            .groups
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Arc::new(Mutex::new(FacetGroup::new(kind, self.dir.clone()))));
        group.lock_owned().await
    }

    /// Item count and marker of every facet
    pub async fn status(&self) -> Vec<FacetStatus> {
        let mut status = Vec::new();
        for kind in LibraryKind::ALL {
            let mut group = self.lock(kind).await;
            for facet in Facet::ALL {
                let cache = group.get(facet).await;
                status.push(FacetStatus {
                    key: FacetKey::new(kind, facet),
                    items: cache.len(),
                    last_activity: cache.last_activity().cloned(),
                    known: cache.is_known(),
                });
            }
        }
        status
    }

    pub async fn clear_all(&self) -> Result<(), SyncError> {
        for kind in LibraryKind::ALL {
            let mut group = self.lock(kind).await;
            for facet in Facet::ALL {
                group.clear(facet).await?;
            }
        }
        info!("Cleared facet caches");
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FacetStatus {
    pub key: FacetKey,
    pub items: usize,
    pub last_activity: Option<ActivityMarker>,
    pub known: bool,
}
