//! HTTP document store client

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use autograph_core::CanvasDocument;
use reqwest::{RequestBuilder, Response, Url};

use super::{DocumentStore, RemoteConfig};
use crate::edit::{EditKind, PendingEdit};
use crate::error::RemoteError;

/// Header carrying the edit id so the server can drop duplicate deliveries.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpDocumentStore {
    pub fn new(config: &RemoteConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(config.base_url.trim())
            .with_context(|| format!("Invalid document store URL: {}", config.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Document store URL cannot be a base: {}", base_url);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Base URL plus percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidResponse(format!("bad base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, RemoteError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| RemoteError::Transient(format!("{} failed: {}", what, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        Err(RemoteError::from_status(status.as_u16(), error_text))
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn fetch_version(&self, diagram_id: &str, version: u64) -> Result<CanvasDocument, RemoteError> {
        let version_segment = version.to_string();
        let url = self.endpoint(&["diagrams", diagram_id, "versions", &version_segment])?;
        tracing::debug!("GET {}", url);

        let response = self
            .send(self.client.get(url), "version fetch")
            .await?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;

        CanvasDocument::from_value(body).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }

    async fn apply(&self, edit: &PendingEdit) -> Result<(), RemoteError> {
        let url = self.endpoint(&["diagrams", &edit.diagram_id])?;
        tracing::debug!("{} {} ({})", edit.kind, url, edit.id);

        let request = match edit.kind {
            EditKind::Create => self.client.post(url).json(&edit.payload),
            EditKind::Update => self.client.put(url).json(&edit.payload),
            EditKind::Delete if edit.payload.is_null() => self.client.delete(url),
            EditKind::Delete => self.client.delete(url).json(&edit.payload),
        };
        let request = request.header(IDEMPOTENCY_HEADER, &edit.id);

        self.send(request, "replay").await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "HTTP"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(base_url: &str) -> HttpDocumentStore {
        HttpDocumentStore::new(&RemoteConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_joins_and_encodes_segments() {
        let store = store("http://localhost:7891/api/");
        let url = store.endpoint(&["diagrams", "team plan/v2", "versions", "3"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:7891/api/diagrams/team%20plan%2Fv2/versions/3");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = HttpDocumentStore::new(&RemoteConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        });
        assert!(result.is_err());

        let result = HttpDocumentStore::new(&RemoteConfig {
            base_url: "mailto:ops@example.com".to_string(),
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_token_is_ignored() {
        let store = HttpDocumentStore::new(&RemoteConfig {
            base_url: "http://localhost:1".to_string(),
            token: Some(String::new()),
            timeout_secs: 1,
        })
        .unwrap();
        assert!(store.token.is_none());
    }
}
