use serde::{Deserialize, Serialize};

/// Catalog identifiers carried by a record
///
/// `trakt` is the primary catalog ID and `imdb` the secondary one. `tmdb` and
/// `tvdb` are never used for matching; they only ride along so remote payloads
/// can carry every ID we know. For episode-level records these are the parent
/// show's identifiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MediaIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trakt: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvdb: Option<u32>,
}

impl MediaIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trakt(mut self, id: u64) -> Self {
        self.trakt = Some(id);
        self
    }

    pub fn with_imdb(mut self, id: impl Into<String>) -> Self {
        self.imdb = Some(id.into());
        self
    }

    pub fn with_tmdb(mut self, id: u32) -> Self {
        self.tmdb = Some(id);
        self
    }

    pub fn with_tvdb(mut self, id: u32) -> Self {
        self.tvdb = Some(id);
        self
    }

    /// The primary catalog ID, if present and non-zero.
    pub fn primary(&self) -> Option<u64> {
        self.trakt.filter(|id| *id != 0)
    }

    /// The secondary ID, if present and well-formed.
    ///
    /// A malformed value is reported as absent rather than as a distinct ID.
    pub fn secondary(&self) -> Option<&str> {
        self.imdb
            .as_deref()
            .map(str::trim)
            .filter(|id| is_valid_imdb_id(id))
    }

    /// Fill in missing IDs from `other`; existing values are kept.
    pub fn merge(&mut self, other: &MediaIds) {
        if self.primary().is_none() {
            self.trakt = other.primary().or(self.trakt);
        }
        if self.secondary().is_none() {
            if let Some(imdb) = other.secondary() {
                self.imdb = Some(imdb.to_string());
            }
        }
        if self.tmdb.is_none() {
            self.tmdb = other.tmdb;
        }
        if self.tvdb.is_none() {
            self.tvdb = other.tvdb;
        }
    }

    /// True when neither a usable primary nor secondary ID is present.
    pub fn is_empty(&self) -> bool {
        self.primary().is_none() && self.secondary().is_none()
    }
}

/// Format check for secondary IDs: `tt` followed by 7 or 8 digits.
pub fn is_valid_imdb_id(id: &str) -> bool {
    let Some(digits) = id.strip_prefix("tt") else {
        return false;
    };
    (id.len() == 9 || id.len() == 10) && digits.bytes().all(|b| b.is_ascii_digit())
}
