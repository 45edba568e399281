pub mod activity;
pub mod cache;
pub mod diff;
pub mod error;
pub mod id_matching;
pub mod keys;
pub mod progress;
pub mod sync;

pub use activity::{ActivityGate, Freshness};
pub use cache::{CacheStore, FacetCache, FacetGroup, FacetStatus};
pub use diff::{build_batches, compute_facet_diff, group_by_show, DiffPolicy};
pub use error::SyncError;
pub use id_matching::matches;
pub use keys::lookup_key;
pub use sync::{SingleFlight, SyncOrchestrator, SyncPhase, SyncReport, SyncRunOptions, SyncSettings};
