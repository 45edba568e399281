//! Local library backed by a JSON file.
//!
//! Each entry is one file in the player's database. An episode entry may span
//! two episodes (`double_episode`); it is reported as two episode records and
//! its resume position is split between them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use media_sync_models::{LibraryKind, MediaIds, MediaKind, MediaRecord, PlaybackThresholds};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::traits::LocalLibrary;

/// Marks the local ID of the second half of a double-episode entry.
const SECOND_HALF: u64 = 1 << 63;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryEntry {
    pub local_id: u64,
    pub kind: MediaKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(default)]
    pub ids: MediaIds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    /// The file also holds episode `episode + 1`
    #[serde(default)]
    pub double_episode: bool,

    /// Explicit watched flag set by the player or by sync
    #[serde(default)]
    pub watched: bool,
    /// Watched flag of the second half of a double episode
    #[serde(default)]
    pub watched_second: bool,
    #[serde(default)]
    pub plays: u32,
    /// Resume position in percent of the whole file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watched_at: Option<DateTime<Utc>>,

    /// Entries are in the collection unless flagged otherwise
    #[serde(default = "default_true")]
    pub collected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rated_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl LibraryEntry {
    fn base_record(&self, local_id: u64, episode: Option<u32>) -> MediaRecord {
        let mut record = MediaRecord::new(self.kind, self.title.clone(), self.year)
            .with_ids(self.ids.clone())
            .with_local_id(local_id);
        record.season = self.season;
        record.episode = episode;
        record.plays = self.plays;
        record.watched_at = self.watched_at;
        record.collected = self.collected;
        record.collected_at = self.collected_at;
        record.rating = self.rating;
        record.rated_at = self.rated_at;
        record
    }

    /// Expand the entry into the records the sync engine sees.
    fn records(&self, thresholds: &PlaybackThresholds) -> Vec<MediaRecord> {
        if !(self.double_episode && self.kind == MediaKind::Episode) {
            let mut record = self.base_record(self.local_id, self.episode);
            record.progress = self.progress;
            record.watched = self.watched
                || self.plays > 0
                || self.progress.map_or(false, |p| thresholds.counts_as_watched(p));
            return vec![record];
        }

        let (first_progress, second_progress) = thresholds.split_double_episode(self.progress.unwrap_or(0.0));

        let mut first = self.base_record(self.local_id, self.episode);
        first.progress = Some(first_progress);
        first.watched = self.watched || self.plays > 0 || thresholds.counts_as_watched(first_progress);

        // A second half past the last representable episode number is dropped
        let second_episode = match self.episode.map(|e| e.checked_add(1)) {
            Some(None) => return vec![first],
            next => next.flatten(),
        };
        let mut second = self.base_record(self.local_id | SECOND_HALF, second_episode);
        second.progress = Some(second_progress);
        second.watched = self.watched_second || self.plays > 0 || thresholds.counts_as_watched(second_progress);

        vec![first, second]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryFile {
    #[serde(default)]
    pub entries: Vec<LibraryEntry>,
}

pub struct JsonLibrary {
    name: String,
    path: PathBuf,
    thresholds: PlaybackThresholds,
    file: Mutex<LibraryFile>,
}

impl JsonLibrary {
    /// Open a library file. A missing file is an empty library.
    pub async fn open(name: impl Into<String>, path: impl Into<PathBuf>, thresholds: PlaybackThresholds) -> Result<Self, SourceError> {
        let path = path.into();
        let file = load_file(&path).await?;
        debug!("Loaded {} library entries from {}", file.entries.len(), path.display());
        Ok(Self {
            name: name.into(),
            path,
            thresholds,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `update` to the entry behind `local_id` and persist the file.
    async fn update_entry<F>(&self, local_id: u64, update: F) -> Result<(), SourceError>
    where
        F: FnOnce(&mut LibraryEntry, bool, &PlaybackThresholds),
    {
        let second_half = local_id & SECOND_HALF != 0;
        let entry_id = local_id & !SECOND_HALF;

        let mut file = self.file.lock().await;
        let entry = file
            .entries
            .iter_mut()
            .find(|entry| entry.local_id == entry_id)
            .ok_or_else(|| SourceError::Local(format!("no library entry with id {}", entry_id)))?;
        update(entry, second_half, &self.thresholds);
        save_file(&self.path, &file).await
    }
}

async fn load_file(path: &Path) -> Result<LibraryFile, SourceError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => serde_json::from_str(&content)
            .map_err(|e| SourceError::Local(format!("failed to parse library {}: {}", path.display(), e))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Library file {} does not exist, treating it as empty", path.display());
            Ok(LibraryFile::default())
        }
        Err(e) => Err(SourceError::Io(e)),
    }
}

async fn save_file(path: &Path, file: &LibraryFile) -> Result<(), SourceError> {
    let json = serde_json::to_string_pretty(file)
        .map_err(|e| SourceError::Local(format!("failed to serialize library: {}", e)))?;
    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, json).await?;
    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

#[async_trait]
impl LocalLibrary for JsonLibrary {
    fn source_name(&self) -> &str {
        &self.name
    }

    async fn get_all_local_records(&self, kind: LibraryKind) -> Result<Vec<MediaRecord>, SourceError> {
        let file = self.file.lock().await;
        Ok(file
            .entries
            .iter()
            .filter(|entry| entry.kind.library() == kind)
            .flat_map(|entry| entry.records(&self.thresholds))
            .collect())
    }

    async fn set_watched(&self, local_id: u64, watched: bool) -> Result<(), SourceError> {
        self.update_entry(local_id, |entry, second_half, thresholds| {
            if watched {
                if second_half {
                    entry.watched_second = true;
                } else {
                    entry.watched = true;
                }
                return;
            }

            // Clearing a half must not take the other half with it
            let halves = entry.records(thresholds);
            let other_watched = halves.len() == 2 && halves[if second_half { 0 } else { 1 }].watched;
            entry.plays = 0;
            entry.watched_at = None;
            if second_half {
                entry.watched_second = false;
                entry.watched = other_watched;
                entry.progress = entry.progress.map(|p| p.min(thresholds.double_episode_split_percent));
            } else {
                entry.watched = false;
                entry.watched_second = other_watched;
                entry.progress = None;
            }
        })
        .await
    }

    async fn set_rating(&self, local_id: u64, rating: u8) -> Result<(), SourceError> {
        self.update_entry(local_id, |entry, _, _| {
            entry.rating = Some(rating);
            entry.rated_at = Some(Utc::now());
        })
        .await
    }

    async fn set_collection_flag(&self, local_id: u64, collected: bool) -> Result<(), SourceError> {
        self.update_entry(local_id, |entry, _, _| {
            entry.collected = collected;
            if collected && entry.collected_at.is_none() {
                entry.collected_at = Some(Utc::now());
            }
        })
        .await
    }
}
