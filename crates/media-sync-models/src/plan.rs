use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::media::Facet;
use crate::media_ids::MediaIds;
use crate::record::MediaRecord;

/// Operations computed for one facet; produced by the diff engine and consumed once.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SyncPlan {
    pub facet: Facet,
    /// Records the remote side is missing
    pub to_push_remote: Vec<MediaRecord>,
    /// Desired local state for existing local items (`local_id` is set)
    pub to_pull_local: Vec<MediaRecord>,
    /// Remote records to delete (cleanup facets only)
    pub to_remove_remote: Vec<MediaRecord>,
    /// Records left out: placeholder episodes and unidentifiable local records
    pub skipped: usize,
}

impl SyncPlan {
    pub fn new(facet: Facet) -> Self {
        Self {
            facet,
            to_push_remote: Vec::new(),
            to_pull_local: Vec::new(),
            to_remove_remote: Vec::new(),
            skipped: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_push_remote.is_empty() && self.to_pull_local.is_empty() && self.to_remove_remote.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_push_remote.len() + self.to_pull_local.len() + self.to_remove_remote.len()
    }
}

/// Episodes of one show, grouped by season.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShowGroup {
    pub ids: MediaIds,
    pub title: String,
    pub year: Option<u32>,
    pub seasons: BTreeMap<u32, Vec<MediaRecord>>,
}

impl ShowGroup {
    pub fn episode_count(&self) -> usize {
        self.seasons.values().map(Vec::len).sum()
    }

    pub fn episodes(&self) -> impl Iterator<Item = &MediaRecord> {
        self.seasons.values().flatten()
    }
}

/// One remote mutation payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum SyncBatch {
    /// Flat movie or show-level records
    Items(Vec<MediaRecord>),
    /// Episode-level records of a single show
    Show(ShowGroup),
}

impl SyncBatch {
    pub fn len(&self) -> usize {
        match self {
            SyncBatch::Items(items) => items.len(),
            SyncBatch::Show(group) => group.episode_count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> Vec<&MediaRecord> {
        match self {
            SyncBatch::Items(items) => items.iter().collect(),
            SyncBatch::Show(group) => group.episodes().collect(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            SyncBatch::Items(items) => format!("{} items", items.len()),
            SyncBatch::Show(group) => format!("{} ({} episodes)", group.title, group.episode_count()),
        }
    }
}

/// Remote answer to a push or remove batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchResponse {
    pub added: usize,
    pub existing: usize,
    /// Items the remote could not resolve
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl BatchResponse {
    pub fn is_clean(&self) -> bool {
        self.skipped == 0 && self.errors.is_empty()
    }
}
