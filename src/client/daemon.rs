//! Daemon REST client
//!
//! Talks to the Soulseek daemon's HTTP API under `/api/v0`.

use crate::client::api::{DownloadApi, SearchApi};
use crate::error::FetchError;
use crate::model::{DownloadRequest, RawResult, SearchState, TransferUser};
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{debug, error, info, trace};

const API_PREFIX: &str = "/api/v0";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionToken {
    /// Expiry time in Unix seconds
    expires: u64,
    token: String,
    token_type: String,
}

impl SessionToken {
    fn header_value(&self) -> String {
        format!("{} {}", self.token_type, self.token)
    }

    fn is_expired(&self) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.expires <= now
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    search_text: &'a str,
}

/// HTTP client for the daemon
pub struct DaemonClient {
    /// HTTP client
    client: reqwest::Client,
    /// Base URL, e.g. http://localhost:5030
    base_url: String,
    username: String,
    password: String,
    /// Cached session token, refreshed on expiry
    token: Mutex<Option<SessionToken>>,
}

impl DaemonClient {
    /// Create a new daemon client
    ///
    /// # Example
    /// ```ignore
    /// let client = DaemonClient::new("http://localhost:5030", "slskd", "slskd");
    /// ```
    pub fn new(base_url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            token: Mutex::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    async fn login(&self) -> Result<SessionToken> {
        debug!("Logging in to daemon at {} as {}", self.base_url, self.username);
        let response = self
            .client
            .post(self.url("/session"))
            .json(&LoginRequest {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .await
            .map_err(FetchError::from)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!("Daemon login failed: {} - {}", status, error_text);
            bail!(FetchError::network_error_full(
                format!("Login failed with status {}", status),
                "/session",
                error_text
            ));
        }

        let token: SessionToken = response.json().await.map_err(FetchError::from)?;
        info!("Logged in to daemon, token valid until {}", token.expires);
        Ok(token)
    }

    async fn auth_header(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        match token.as_ref() {
            Some(t) if !t.is_expired() => Ok(t.header_value()),
            _ => {
                let fresh = self.login().await?;
                let header = fresh.header_value();
                *token = Some(fresh);
                Ok(header)
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        trace!("GET {}", path);
        let response = self
            .client
            .get(self.url(path))
            .header("Authorization", self.auth_header().await?)
            .send()
            .await
            .map_err(FetchError::from)?;

        let response = check_status(response, path).await?;
        Ok(response.json::<T>().await.map_err(FetchError::from)?)
    }
}

async fn check_status(response: reqwest::Response, path: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
    bail!(FetchError::network_error_full(
        format!("Daemon returned {}", status),
        path,
        error_text
    ))
}

#[async_trait]
impl SearchApi for DaemonClient {
    async fn list_searches(&self) -> Result<Vec<SearchState>> {
        self.get_json("/searches").await
    }

    async fn start_search(&self, text: &str) -> Result<SearchState> {
        debug!("Starting search for '{}'", text);
        let response = self
            .client
            .post(self.url("/searches"))
            .header("Authorization", self.auth_header().await?)
            .json(&SearchRequest { search_text: text })
            .send()
            .await
            .map_err(FetchError::from)?;

        let response = check_status(response, "/searches").await?;
        Ok(response.json::<SearchState>().await.map_err(FetchError::from)?)
    }

    async fn search_state(&self, id: &str) -> Result<SearchState> {
        self.get_json(&format!("/searches/{}", id)).await
    }

    async fn search_responses(&self, id: &str) -> Result<Vec<RawResult>> {
        self.get_json(&format!("/searches/{}/responses", id)).await
    }
}

#[async_trait]
impl DownloadApi for DaemonClient {
    async fn all_downloads(&self) -> Result<Vec<TransferUser>> {
        self.get_json("/transfers/downloads").await
    }

    async fn initiate_downloads(&self, username: &str, files: &[DownloadRequest]) -> Result<()> {
        let path = format!("/transfers/downloads/{}", urlencoding::encode(username));
        debug!("Requesting {} files from {}", files.len(), username);
        let response = self
            .client
            .post(self.url(&path))
            .header("Authorization", self.auth_header().await?)
            .json(files)
            .send()
            .await
            .map_err(FetchError::from)?;

        if response.status() != reqwest::StatusCode::CREATED {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            bail!(FetchError::network_error_full(
                format!("Expected 201 when enqueueing downloads, got {}", status),
                path,
                error_text
            ));
        }
        Ok(())
    }

    async fn cancel_download(&self, username: &str, id: &str, remove: bool) -> Result<()> {
        let path = format!("/transfers/downloads/{}/{}", urlencoding::encode(username), id);
        trace!("DELETE {} (remove: {})", path, remove);
        let response = self
            .client
            .delete(self.url(&path))
            .query(&[("remove", remove)])
            .header("Authorization", self.auth_header().await?)
            .send()
            .await
            .map_err(FetchError::from)?;

        check_status(response, &path).await?;
        Ok(())
    }
}
