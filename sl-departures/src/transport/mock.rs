//! Mock transport client for testing without API access.
//!
//! Loads sample departure responses from JSON files and serves them as if
//! they were live API responses.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::DepartureSource;
use super::error::TransportError;
use super::types::{Departure, DeparturesResponse};

/// Mock transport client that serves data from JSON files.
///
/// Useful for development and tests without hitting the real API.
#[derive(Clone)]
pub struct MockTransportClient {
    /// Pre-loaded departure lists, keyed by site id.
    responses: Arc<HashMap<String, Vec<Departure>>>,
}

impl MockTransportClient {
    /// Create a new mock client by loading JSON files from a directory.
    ///
    /// Expects files named `{site_id}.json` (e.g. `9510.json`), each
    /// containing a departures response body.
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, TransportError> {
        let data_dir = data_dir.as_ref();
        let mut responses = HashMap::new();

        let entries = std::fs::read_dir(data_dir).map_err(|e| TransportError::Api {
            status: 0,
            message: format!("failed to read mock data directory: {e}"),
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| TransportError::Api {
                status: 0,
                message: format!("failed to read directory entry: {e}"),
            })?;

            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            // Site id comes from the filename ("9510.json" -> "9510")
            let site_id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| TransportError::Api {
                    status: 0,
                    message: format!("invalid filename: {path:?}"),
                })?
                .to_string();

            let json = std::fs::read_to_string(&path).map_err(|e| TransportError::Api {
                status: 0,
                message: format!("failed to read {path:?}: {e}"),
            })?;

            let response: DeparturesResponse =
                serde_json::from_str(&json).map_err(|e| TransportError::Json {
                    message: format!("failed to parse {path:?}: {e}"),
                    body: None,
                })?;

            responses.insert(site_id, response.departures);
        }

        if responses.is_empty() {
            return Err(TransportError::Api {
                status: 0,
                message: format!("no mock response files found in {data_dir:?}"),
            });
        }

        Ok(Self {
            responses: Arc::new(responses),
        })
    }

    /// List site ids available in the mock data.
    pub fn available_sites(&self) -> Vec<String> {
        self.responses.keys().cloned().collect()
    }
}

impl DepartureSource for MockTransportClient {
    async fn fetch_departures(&self, site_id: &str) -> Result<Vec<Departure>, TransportError> {
        self.responses
            .get(site_id)
            .cloned()
            .ok_or_else(|| TransportError::Api {
                status: 404,
                message: format!(
                    "no mock data for site {site_id}. Available: {:?}",
                    self.available_sites()
                ),
            })
    }
}
