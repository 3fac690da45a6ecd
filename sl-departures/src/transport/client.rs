//! SL Transport HTTP client.
//!
//! Provides async methods for querying the public SL Transport integration
//! API. The API is unauthenticated, so there is no credential handling.

use super::DepartureSource;
use super::error::TransportError;
use super::types::{Departure, DeparturesResponse, Site};

/// Default base URL for the SL Transport API.
const DEFAULT_BASE_URL: &str = "https://transport.integration.sl.se/v1";

/// How much of a malformed response body to keep in a JSON error.
const ERROR_BODY_LIMIT: usize = 500;

/// Configuration for the transport client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Base URL for the API (defaults to the production endpoint)
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl TransportConfig {
    /// Create a new config with default settings.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// SL Transport API client.
#[derive(Debug, Clone)]
pub struct TransportClient {
    http: reqwest::Client,
    base_url: String,
}

impl TransportClient {
    /// Create a new transport client with the given configuration.
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }

    /// Fetch the raw departure list for a site.
    ///
    /// A response without a `departures` key yields an empty list.
    pub async fn departures(&self, site_id: &str) -> Result<Vec<Departure>, TransportError> {
        let url = format!("{}/sites/{}/departures", self.base_url, site_id);

        let response = self.http.get(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;

        let parsed: DeparturesResponse =
            serde_json::from_str(&body).map_err(|e| TransportError::Json {
                message: e.to_string(),
                body: Some(body.chars().take(ERROR_BODY_LIMIT).collect()),
            })?;

        Ok(parsed.departures)
    }

    /// Fetch the full site list.
    pub async fn sites(&self) -> Result<Vec<Site>, TransportError> {
        let url = format!("{}/sites", self.base_url);

        let response = self.http.get(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| TransportError::Json {
            message: e.to_string(),
            body: Some(body.chars().take(ERROR_BODY_LIMIT).collect()),
        })
    }
}

impl DepartureSource for TransportClient {
    async fn fetch_departures(&self, site_id: &str) -> Result<Vec<Departure>, TransportError> {
        self.departures(site_id).await
    }
}
