use media_sync_models::{ActivityMarker, FacetKey, LastActivities};
use tracing::{debug, warn};

use crate::cache::FacetCache;
use crate::error::SyncError;

/// Freshness of one facet cache against the remote markers of this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Never loaded, cleared, or left unconverged by a failed run
    Unknown,
    /// Cached marker equals the remote marker
    Fresh,
    /// Remote reports a different marker
    Stale,
    /// The marker fetch failed; the cache is served as-is
    Unverified,
}

impl Freshness {
    pub fn should_refetch(self) -> bool {
        matches!(self, Freshness::Unknown | Freshness::Stale)
    }
}

/// Per-session freshness check built from one last-activity fetch.
#[derive(Debug)]
pub struct ActivityGate {
    remote: Option<LastActivities>,
    force_refresh: bool,
}

impl ActivityGate {
    pub fn new(fetched: Result<LastActivities, SyncError>, force_refresh: bool) -> Self {
        let remote = match fetched {
            Ok(activities) => {
                debug!(markers = activities.len(), "Fetched remote activity markers");
                Some(activities)
            }
            Err(e) => {
                warn!("Activity check failed, serving cached data: {}", e);
                None
            }
        };
        Self { remote, force_refresh }
    }

    pub fn is_verified(&self) -> bool {
        self.remote.is_some()
    }

    /// The remote marker for `key`, if the check succeeded and the remote reports one.
    pub fn remote_marker(&self, key: FacetKey) -> Option<&ActivityMarker> {
        self.remote.as_ref().and_then(|remote| remote.get(key))
    }

    pub fn assess(&self, key: FacetKey, cache: &FacetCache) -> Freshness {
        let Some(remote) = &self.remote else {
            return Freshness::Unverified;
        };
        if self.force_refresh || !cache.is_known() {
            return Freshness::Unknown;
        }
        if remote.get(key) == cache.last_activity() {
            Freshness::Fresh
        } else {
            Freshness::Stale
        }
    }

    pub fn should_refetch(&self, key: FacetKey, cache: &FacetCache) -> bool {
        self.assess(key, cache).should_refetch()
    }

    /// Mark `cache` as reflecting the remote state seen by this session.
    pub fn record_fetched(&self, key: FacetKey, cache: &mut FacetCache) {
        cache.set_last_activity(self.remote_marker(key).cloned());
    }
}
