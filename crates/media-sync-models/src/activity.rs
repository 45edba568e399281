use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::media::{Facet, LibraryKind};

/// Opaque version token for a facet's remote state (a last-activity timestamp).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ActivityMarker(String);

impl ActivityMarker {
    pub fn new(marker: impl Into<String>) -> Self {
        Self(marker.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActivityMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one facet cache: a facet within a library group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FacetKey {
    pub kind: LibraryKind,
    pub facet: Facet,
}

impl FacetKey {
    pub fn new(kind: LibraryKind, facet: Facet) -> Self {
        Self { kind, facet }
    }
}

impl fmt::Display for FacetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.facet)
    }
}

/// Remote last-activity markers, one per facet the remote reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastActivities {
    markers: HashMap<FacetKey, ActivityMarker>,
}

impl LastActivities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: LibraryKind, facet: Facet, marker: ActivityMarker) {
        self.markers.insert(FacetKey::new(kind, facet), marker);
    }

    pub fn with(mut self, kind: LibraryKind, facet: Facet, marker: impl Into<String>) -> Self {
        self.insert(kind, facet, ActivityMarker::new(marker));
        self
    }

    pub fn get(&self, key: FacetKey) -> Option<&ActivityMarker> {
        self.markers.get(&key)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}
