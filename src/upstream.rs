//! Outbound client for the movie metadata API.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::models::{MovieDetails, SearchParams, SearchResponse};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream call timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream returned HTTP {0}")]
    Status(u16),
    #[error("could not decode upstream response: {0}")]
    Decode(String),
}

/// The three lookups the gateway needs from the metadata API.
///
/// Business-level misses ("Movie not found!") come back as `Ok` payloads with
/// `Response: "False"`; only transport-level problems are errors.
#[async_trait]
pub trait MovieApi: Send + Sync {
    async fn search(&self, params: &SearchParams) -> Result<SearchResponse, UpstreamError>;

    async fn details_by_id(&self, imdb_id: &str) -> Result<MovieDetails, UpstreamError>;

    async fn details_by_title(
        &self,
        title: &str,
        year: Option<u16>,
    ) -> Result<MovieDetails, UpstreamError>;
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

/// [`MovieApi`] over HTTP against the OMDb API.
#[derive(Clone)]
pub struct OmdbClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl OmdbClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            timeout: config.timeout,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        params: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        debug!(operation, url = %self.base_url, "Calling upstream API");

        let response = self
            .http
            .get(&self.base_url)
            .query(&[("apikey", self.api_key.as_str())])
            .query(params)
            .send()
            .await
            .map_err(|e| self.classify(operation, e))?;

        let status = response.status();
        if !status.is_success() {
            error!(operation, status = status.as_u16(), "Upstream API returned error status");
            return Err(UpstreamError::Status(status.as_u16()));
        }

        response.json::<T>().await.map_err(|e| self.classify(operation, e))
    }

    fn classify(&self, operation: &'static str, err: reqwest::Error) -> UpstreamError {
        error!(operation, error = %err, "Error calling upstream API");
        if err.is_timeout() {
            UpstreamError::Timeout(self.timeout)
        } else if err.is_decode() {
            UpstreamError::Decode(err.to_string())
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl MovieApi for OmdbClient {
    async fn search(&self, params: &SearchParams) -> Result<SearchResponse, UpstreamError> {
        let mut query = vec![("s", params.title.clone()), ("page", params.page.to_string())];
        if let Some(kind) = params.kind.as_deref().filter(|k| !k.is_empty()) {
            query.push(("type", kind.to_string()));
        }
        if let Some(year) = params.year {
            query.push(("y", year.to_string()));
        }

        let response: SearchResponse = self.get("search", &query).await?;
        if !response.is_success() {
            warn!(error = ?response.error, "Upstream API returned error");
        }
        Ok(response)
    }

    async fn details_by_id(&self, imdb_id: &str) -> Result<MovieDetails, UpstreamError> {
        let query = [("i", imdb_id.to_string()), ("plot", "full".to_string())];

        let details: MovieDetails = self.get("details_by_id", &query).await?;
        if !details.is_success() {
            warn!(imdb_id, error = ?details.error, "Upstream API returned error");
        }
        Ok(details)
    }

    async fn details_by_title(
        &self,
        title: &str,
        year: Option<u16>,
    ) -> Result<MovieDetails, UpstreamError> {
        let mut query = vec![("t", title.to_string()), ("plot", "full".to_string())];
        if let Some(year) = year {
            query.push(("y", year.to_string()));
        }

        let details: MovieDetails = self.get("details_by_title", &query).await?;
        if !details.is_success() {
            warn!(title, error = ?details.error, "Upstream API returned error");
        }
        Ok(details)
    }
}
