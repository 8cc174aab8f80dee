use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

use super::entry::RoleDirectoryEntry;

/// Directory fetch failure. Never fatal: callers degrade to placeholder labels.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("directory request failed: {0}")]
    Http(String),

    #[error("directory returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("directory response could not be decoded: {0}")]
    Decode(String),
}

/// Anything that can list the whole roles directory.
#[async_trait]
pub trait RolesSource: Send + Sync {
    async fn fetch_roles(&self) -> Result<Vec<RoleDirectoryEntry>, DirectoryError>;
}

/// Roles directory served over REST at `{base_url}/api/roles`.
#[derive(Debug, Clone)]
pub struct HttpRolesDirectory {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpRolesDirectory {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DirectoryError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DirectoryError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn roles_url(&self) -> String {
        format!("{}/api/roles", self.base_url)
    }
}

#[async_trait]
impl RolesSource for HttpRolesDirectory {
    async fn fetch_roles(&self) -> Result<Vec<RoleDirectoryEntry>, DirectoryError> {
        let url = self.roles_url();
        let resp = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| DirectoryError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DirectoryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let rows: Vec<JsonValue> = resp
            .json()
            .await
            .map_err(|e| DirectoryError::Decode(e.to_string()))?;

        Ok(decode_rows(rows))
    }
}

/// Decode rows one by one; a bad row is logged and dropped, not fatal.
fn decode_rows(rows: Vec<JsonValue>) -> Vec<RoleDirectoryEntry> {
    rows.into_iter()
        .enumerate()
        .filter_map(|(idx, row)| match serde_json::from_value::<RoleDirectoryEntry>(row) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(row = idx, "skipping malformed directory entry: {e}");
                None
            }
        })
        .collect()
}
