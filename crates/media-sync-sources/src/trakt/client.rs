use async_trait::async_trait;
use media_sync_config::{CredentialStore, TraktConfig};
use media_sync_models::{BatchResponse, Facet, LastActivities, LibraryKind, MediaRecord, SyncBatch};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::SourceError;
use crate::traits::RemoteService;
use crate::trakt::{api, auth};

#[derive(Clone)]
pub struct TraktClient {
    client: Arc<Client>,
    api_url: String,
    client_id: String,
    access_token: String,
}

impl TraktClient {
    pub fn new(api_url: String, client_id: String, access_token: String, timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(auth::create_trakt_client(timeout)?),
            api_url: api_url.trim_end_matches('/').to_string(),
            client_id,
            access_token,
        })
    }

    /// Build an authenticated client from config and stored credentials,
    /// refreshing the access token when needed.
    pub async fn connect(
        config: &TraktConfig,
        store: &mut CredentialStore,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = auth::create_trakt_client(timeout)?;
        let api_url = config.api_url.trim_end_matches('/').to_string();
        let access_token =
            auth::resolve_access_token(&client, &api_url, &config.client_id, &config.client_secret, store).await?;
        info!("Authenticated to Trakt");

        Ok(Self {
            client: Arc::new(client),
            api_url,
            client_id: config.client_id.clone(),
            access_token,
        })
    }
}

#[async_trait]
impl RemoteService for TraktClient {
    fn service_name(&self) -> &str {
        "trakt"
    }

    async fn fetch_last_activity(&self) -> Result<LastActivities, SourceError> {
        let activities =
            api::get_last_activities(&self.client, &self.api_url, &self.access_token, &self.client_id).await?;
        debug!(markers = activities.len(), "Fetched Trakt last activities");
        Ok(activities)
    }

    async fn fetch_facet_snapshot(&self, kind: LibraryKind, facet: Facet) -> Result<Vec<MediaRecord>, SourceError> {
        let records =
            api::get_facet_snapshot(&self.client, &self.api_url, &self.access_token, &self.client_id, kind, facet)
                .await?;
        info!(kind = %kind, facet = %facet, count = records.len(), "Fetched Trakt snapshot");
        Ok(records)
    }

    async fn push_batch(&self, _kind: LibraryKind, facet: Facet, batch: &SyncBatch) -> Result<BatchResponse, SourceError> {
        api::post_batch(&self.client, &self.api_url, &self.access_token, &self.client_id, facet, batch, false).await
    }

    async fn remove_batch(&self, _kind: LibraryKind, facet: Facet, batch: &SyncBatch) -> Result<BatchResponse, SourceError> {
        api::post_batch(&self.client, &self.api_url, &self.access_token, &self.client_id, facet, batch, true).await
    }
}
