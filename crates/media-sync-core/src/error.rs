use media_sync_models::LibraryKind;
use media_sync_sources::{ErrorClass, SourceError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("remote returned invalid data: {0}")]
    RemoteDataInvalid(String),
    #[error("local data invalid: {0}")]
    LocalDataInvalid(String),
    #[error("a {0} sync is already running")]
    ConcurrentSyncRejected(LibraryKind),
    #[error("cache error: {0}")]
    Cache(String),
}

impl SyncError {
    /// Classify a collaborator failure; `context` names the call that failed.
    pub fn from_source(context: &str, error: SourceError) -> Self {
        let message = format!("{}: {}", context, error);
        match error.class() {
            ErrorClass::Unavailable => SyncError::RemoteUnavailable(message),
            ErrorClass::InvalidData => SyncError::RemoteDataInvalid(message),
            ErrorClass::Local => SyncError::LocalDataInvalid(message),
        }
    }

    pub fn timeout(context: &str, after: std::time::Duration) -> Self {
        SyncError::RemoteUnavailable(format!("{}: timed out after {:?}", context, after))
    }
}
