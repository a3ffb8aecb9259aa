//! Remote store API. The server keeps whatever snapshot it was last sent;
//! all conflict resolution happens client-side before a push.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::auth::bearer;
use crate::config::SyncConfig;
use crate::sync::snapshot::SyncSnapshot;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("remote network error: {0}")]
    Network(String),
    #[error("remote request timed out")]
    Timeout,
    #[error("remote rejected credentials")]
    Unauthorized,
    #[error("remote api error: status={status}, message={message}")]
    Api { status: u16, message: String },
    #[error("remote response could not be decoded: {0}")]
    Decode(String),
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Latest snapshot stored remotely; `None` when the user has never synced.
    async fn pull(&self, token: &str) -> Result<Option<SyncSnapshot>, RemoteError>;

    /// Unconditionally replaces the remote snapshot.
    async fn push(&self, token: &str, snapshot: &SyncSnapshot) -> Result<(), RemoteError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullResponse {
    #[serde(default)]
    data: Option<SyncSnapshot>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

/// `GET`/`PUT {api_url}/sync/` over HTTP with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRemoteStore {
    pub fn new(config: &SyncConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: format!("{}/sync/", config.api_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(RemoteError::Unauthorized);
        }
        let message = response.text().await.unwrap_or_default();
        Err(RemoteError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

fn map_send_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout
    } else {
        RemoteError::Network(err.to_string())
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn pull(&self, token: &str) -> Result<Option<SyncSnapshot>, RemoteError> {
        let response = self
            .client
            .get(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, bearer(token))
            .send()
            .await
            .map_err(map_send_error)?;
        let response = Self::check(response).await?;

        let body: PullResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        tracing::debug!(
            has_data = body.data.is_some(),
            updated_at = ?body.updated_at,
            "Pulled remote snapshot"
        );
        Ok(body.data)
    }

    async fn push(&self, token: &str, snapshot: &SyncSnapshot) -> Result<(), RemoteError> {
        let response = self
            .client
            .put(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, bearer(token))
            .json(snapshot)
            .send()
            .await
            .map_err(map_send_error)?;
        Self::check(response).await?;
        tracing::debug!(sections = snapshot.section_count(), "Pushed snapshot");
        Ok(())
    }
}
