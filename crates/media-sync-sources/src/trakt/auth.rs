use chrono::{DateTime, Duration, Utc};
use media_sync_config::CredentialStore;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::SourceError;

const REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// HTTP client shared by every Trakt call; `timeout` bounds each request.
pub fn create_trakt_client(timeout: std::time::Duration) -> Result<Client, SourceError> {
    Client::builder()
        .user_agent(concat!("reelsync/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|e| SourceError::Unavailable(format!("failed to build HTTP client: {}", e)))
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: u64,
}

#[derive(Debug)]
pub struct TokenInfo {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

pub async fn refresh_access_token(
    client: &Client,
    api_url: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<TokenInfo, SourceError> {
    let payload = serde_json::json!({
        "refresh_token": refresh_token,
        "client_id": client_id,
        "client_secret": client_secret,
        "redirect_uri": REDIRECT_URI,
        "grant_type": "refresh_token"
    });

    let response = client
        .post(format!("{}/oauth/token", api_url))
        .json(&payload)
        .header("Accept", "application/json")
        .header("Content-Type", "application/json")
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(SourceError::NotAuthenticated(format!(
            "Token refresh failed: {} - {}",
            status, error_text
        )));
    }

    let token_response: TokenResponse = response.json().await?;
    // Refresh two minutes early
    let expires_at = Utc::now() + Duration::seconds(token_response.expires_in as i64 - 120);

    Ok(TokenInfo {
        access_token: token_response.access_token,
        refresh_token: token_response.refresh_token,
        expires_at,
    })
}

/// Return a usable access token from the credential store, refreshing and
/// persisting a new one when the saved token is missing or about to expire.
pub async fn resolve_access_token(
    client: &Client,
    api_url: &str,
    client_id: &str,
    client_secret: &str,
    store: &mut CredentialStore,
) -> Result<String, SourceError> {
    if let Some(token) = store.valid_trakt_access_token(Utc::now()) {
        return Ok(token.clone());
    }

    let refresh_token = store
        .get_trakt_refresh_token()
        .cloned()
        .ok_or_else(|| SourceError::NotAuthenticated("no Trakt credentials stored".to_string()))?;

    info!("Trakt access token expired or missing, refreshing");
    let token_info = refresh_access_token(client, api_url, client_id, client_secret, &refresh_token).await?;

    store.set_trakt_access_token(token_info.access_token.clone());
    store.set_trakt_refresh_token(token_info.refresh_token);
    store.set_trakt_token_expires(token_info.expires_at);
    store
        .save()
        .map_err(|e| SourceError::Local(format!("failed to save credentials: {}", e)))?;

    Ok(token_info.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_valid_saved_token_skips_refresh() {
        let dir = TempDir::new().unwrap();
        let mut store = CredentialStore::new(dir.path().join("credentials.toml"));
        store.set_trakt_access_token("saved".to_string());
        store.set_trakt_token_expires(Utc::now() + Duration::hours(4));

        let client = create_trakt_client(std::time::Duration::from_secs(1)).unwrap();
        // Unroutable URL: any network call would fail
        let token = resolve_access_token(&client, "http://127.0.0.1:9", "id", "secret", &mut store)
            .await
            .unwrap();
        assert_eq!(token, "saved");
    }

    #[tokio::test]
    async fn test_missing_credentials_is_not_authenticated() {
        let dir = TempDir::new().unwrap();
        let mut store = CredentialStore::new(dir.path().join("credentials.toml"));
        let client = create_trakt_client(std::time::Duration::from_secs(1)).unwrap();
        let err = resolve_access_token(&client, "http://127.0.0.1:9", "id", "secret", &mut store)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::NotAuthenticated(_)));
    }
}
