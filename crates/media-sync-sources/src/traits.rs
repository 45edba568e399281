use async_trait::async_trait;
use media_sync_models::{BatchResponse, Facet, LastActivities, LibraryKind, MediaRecord, SyncBatch};

use crate::error::SourceError;

/// The remote tracking service, treated as a request/response black box.
#[async_trait]
pub trait RemoteService: Send + Sync {
    fn service_name(&self) -> &str;

    /// Last-activity markers for every facet the remote reports
    async fn fetch_last_activity(&self) -> Result<LastActivities, SourceError>;

    /// Full remote snapshot of one facet
    async fn fetch_facet_snapshot(&self, kind: LibraryKind, facet: Facet) -> Result<Vec<MediaRecord>, SourceError>;

    async fn push_batch(&self, kind: LibraryKind, facet: Facet, batch: &SyncBatch) -> Result<BatchResponse, SourceError>;

    async fn remove_batch(&self, kind: LibraryKind, facet: Facet, batch: &SyncBatch) -> Result<BatchResponse, SourceError>;
}

/// The local media database.
#[async_trait]
pub trait LocalLibrary: Send + Sync {
    fn source_name(&self) -> &str;

    async fn get_all_local_records(&self, kind: LibraryKind) -> Result<Vec<MediaRecord>, SourceError>;

    async fn set_watched(&self, local_id: u64, watched: bool) -> Result<(), SourceError>;

    async fn set_rating(&self, local_id: u64, rating: u8) -> Result<(), SourceError>;

    async fn set_collection_flag(&self, local_id: u64, collected: bool) -> Result<(), SourceError>;
}
