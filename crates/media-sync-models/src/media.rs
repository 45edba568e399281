use serde::{Deserialize, Serialize};
use std::fmt;

/// What a single record describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Show,
    Season,
    Episode,
}

impl MediaKind {
    /// The library group a record of this kind is synchronized in.
    pub fn library(&self) -> LibraryKind {
        match self {
            MediaKind::Movie => LibraryKind::Movies,
            MediaKind::Show | MediaKind::Season | MediaKind::Episode => LibraryKind::Shows,
        }
    }
}

/// A library group: the unit of single-flight syncing and of cache locking.
///
/// Movies hold `Movie` records; shows hold show-level and episode-level records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LibraryKind {
    Movies,
    Shows,
}

impl LibraryKind {
    pub const ALL: [LibraryKind; 2] = [LibraryKind::Movies, LibraryKind::Shows];

    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryKind::Movies => "movies",
            LibraryKind::Shows => "shows",
        }
    }
}

impl fmt::Display for LibraryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One independently synchronized aspect of an item's remote state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Facet {
    Watched,
    Collection,
    Ratings,
    Watchlist,
}

impl Facet {
    pub const ALL: [Facet; 4] = [Facet::Watched, Facet::Collection, Facet::Ratings, Facet::Watchlist];

    pub fn as_str(&self) -> &'static str {
        match self {
            Facet::Watched => "watched",
            Facet::Collection => "collection",
            Facet::Ratings => "ratings",
            Facet::Watchlist => "watchlist",
        }
    }

    /// Facets whose diff may emit remote removals.
    pub fn supports_removal(&self) -> bool {
        matches!(self, Facet::Collection | Facet::Watchlist)
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_kinds_belong_to_shows() {
        assert_eq!(MediaKind::Movie.library(), LibraryKind::Movies);
        assert_eq!(MediaKind::Episode.library(), LibraryKind::Shows);
        assert_eq!(MediaKind::Season.library(), LibraryKind::Shows);
    }

    #[test]
    fn test_only_collection_and_watchlist_remove() {
        assert!(Facet::Collection.supports_removal());
        assert!(Facet::Watchlist.supports_removal());
        assert!(!Facet::Watched.supports_removal());
        assert!(!Facet::Ratings.supports_removal());
    }
}
