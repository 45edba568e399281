pub mod activity;
pub mod media;
pub mod media_ids;
pub mod plan;
pub mod playback;
pub mod record;

pub use activity::{ActivityMarker, FacetKey, LastActivities};
pub use media::{Facet, LibraryKind, MediaKind};
pub use media_ids::{is_valid_imdb_id, MediaIds};
pub use plan::{BatchResponse, ShowGroup, SyncBatch, SyncPlan};
pub use playback::PlaybackThresholds;
pub use record::MediaRecord;
