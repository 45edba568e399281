use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media::{LibraryKind, MediaKind};
use crate::media_ids::MediaIds;

/// A local or remote media record as seen by one facet.
///
/// The same logical item appears independently in each facet set it belongs
/// to; only the provenance fields of that facet are expected to be populated.
/// Episode-level records carry the parent show's identifiers in `ids` and
/// the show title in `title`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaRecord {
    pub kind: MediaKind,
    #[serde(default)]
    pub ids: MediaIds,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,

    /// Local database ID (local records only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<u64>,

    #[serde(default)]
    pub watched: bool,
    /// Explicit "not watched" assertion from the remote side
    #[serde(default)]
    pub unseen: bool,
    #[serde(default)]
    pub plays: u32,
    #[serde(default)]
    pub collected: bool,
    /// 1-10
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    /// Local resume position in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watched_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listed_at: Option<DateTime<Utc>>,
}

impl MediaRecord {
    pub fn new(kind: MediaKind, title: impl Into<String>, year: Option<u32>) -> Self {
        Self {
            kind,
            ids: MediaIds::default(),
            title: title.into(),
            year,
            season: None,
            episode: None,
            local_id: None,
            watched: false,
            unseen: false,
            plays: 0,
            collected: false,
            rating: None,
            progress: None,
            watched_at: None,
            collected_at: None,
            rated_at: None,
            listed_at: None,
        }
    }

    pub fn movie(title: impl Into<String>, year: Option<u32>) -> Self {
        Self::new(MediaKind::Movie, title, year)
    }

    pub fn show(title: impl Into<String>, year: Option<u32>) -> Self {
        Self::new(MediaKind::Show, title, year)
    }

    pub fn episode(show_title: impl Into<String>, year: Option<u32>, season: u32, episode: u32) -> Self {
        let mut record = Self::new(MediaKind::Episode, show_title, year);
        record.season = Some(season);
        record.episode = Some(episode);
        record
    }

    pub fn with_ids(mut self, ids: MediaIds) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_local_id(mut self, local_id: u64) -> Self {
        self.local_id = Some(local_id);
        self
    }

    pub fn with_plays(mut self, plays: u32) -> Self {
        self.plays = plays;
        self.watched = plays > 0;
        self
    }

    pub fn with_rating(mut self, rating: u8, rated_at: Option<DateTime<Utc>>) -> Self {
        self.rating = Some(rating);
        self.rated_at = rated_at;
        self
    }

    pub fn collected(mut self) -> Self {
        self.collected = true;
        self
    }

    pub fn library(&self) -> LibraryKind {
        self.kind.library()
    }

    pub fn is_episode_level(&self) -> bool {
        self.kind == MediaKind::Episode
    }

    /// Episode-level records need a season and a non-zero episode number;
    /// anything else is placeholder catalog data.
    pub fn has_valid_episode_number(&self) -> bool {
        if !self.is_episode_level() {
            return true;
        }
        self.season.is_some() && self.episode.map_or(false, |e| e > 0)
    }

    /// True when the record carries enough to be matched at all:
    /// a usable ID or a non-empty title.
    pub fn is_identifiable(&self) -> bool {
        !self.ids.is_empty() || !self.title.trim().is_empty()
    }

    /// Short human label for logs
    pub fn label(&self) -> String {
        match (self.season, self.episode) {
            (Some(s), Some(e)) if self.is_episode_level() => {
                format!("{} S{:02}E{:02}", self.title, s, e)
            }
            _ => match self.year {
                Some(year) => format!("{} ({})", self.title, year),
                None => self.title.clone(),
            },
        }
    }
}
