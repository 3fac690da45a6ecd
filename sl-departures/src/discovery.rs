//! Configuration-time discovery: sites, lines, and directions.
//!
//! These lookups back a configuration flow (pick a site, then a mode,
//! then optionally a line and direction) and are not used during
//! steady-state polling. Line and direction options are projected from a
//! single departures page; the page is cached briefly so the successive
//! steps of one configuration session share one fetch. Failures are
//! surfaced to the caller as user-correctable errors, never retried here.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache as MokaCache;
use tokio::sync::RwLock;
use tracing::debug;

use crate::transport::{Departure, Site, TransportClient, TransportError, TransportMode};

/// How long a fetched departures page stays usable for discovery.
const PAGE_TTL: Duration = Duration::from_secs(60);

/// Maximum number of cached departure pages.
const PAGE_CAPACITY: u64 = 64;

/// A line a user can filter on, as seen in current departures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineOption {
    /// Line designation, e.g. "41".
    pub designation: String,
    /// Line group name, e.g. "Pendeltåg", when the API provides one.
    pub group_of_lines: Option<String>,
}

/// A direction a user can filter on, as seen in current departures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionOption {
    /// Direction code, e.g. "2".
    pub code: String,
    /// Destination shown for that direction, e.g. "Märsta".
    pub destination: String,
}

/// Project the unique lines of one transport mode from a departures page.
///
/// First occurrence wins; order follows the page.
pub fn project_lines(departures: &[Departure], mode: TransportMode) -> Vec<LineOption> {
    let mut seen = HashSet::new();
    let mut options = Vec::new();

    for dep in departures {
        let Some(line) = dep.line.as_ref() else {
            continue;
        };
        if line.transport_mode != Some(mode) {
            continue;
        }
        let Some(designation) = line.designation.as_deref() else {
            continue;
        };
        if seen.insert(designation.to_string()) {
            options.push(LineOption {
                designation: designation.to_string(),
                group_of_lines: line.group_of_lines.clone(),
            });
        }
    }

    options
}

/// Project the unique directions of one transport mode (and optionally
/// one line) from a departures page.
///
/// First occurrence wins; order follows the page. Records without a
/// direction code or destination are skipped.
pub fn project_directions(
    departures: &[Departure],
    mode: TransportMode,
    line: Option<&str>,
) -> Vec<DirectionOption> {
    let mut seen = HashSet::new();
    let mut options = Vec::new();

    for dep in departures {
        let Some(dep_line) = dep.line.as_ref() else {
            continue;
        };
        if dep_line.transport_mode != Some(mode) {
            continue;
        }
        if let Some(line) = line {
            if dep_line.designation.as_deref() != Some(line) {
                continue;
            }
        }

        let (Some(code), Some(destination)) =
            (dep.direction_code.as_deref(), dep.destination.as_deref())
        else {
            continue;
        };
        if code.is_empty() || destination.is_empty() {
            continue;
        }

        if seen.insert(code.to_string()) {
            options.push(DirectionOption {
                code: code.to_string(),
                destination: destination.to_string(),
            });
        }
    }

    options
}

/// Case-insensitive substring search over site names, sorted by name.
pub fn search_sites(sites: &[Site], term: &str) -> Vec<Site> {
    let term = term.trim().to_lowercase();

    let mut matches: Vec<Site> = sites
        .iter()
        .filter(|site| site.display_name().to_lowercase().contains(&term))
        .cloned()
        .collect();
    matches.sort_by_key(Site::display_name);
    matches
}

/// Discovery client: a [`TransportClient`] plus short-lived caches for
/// the site list and departure pages.
#[derive(Clone)]
pub struct DiscoveryClient {
    client: TransportClient,
    /// Departure pages by site id, shared by the line and direction
    /// discovery steps of one configuration session.
    pages: MokaCache<String, Arc<Vec<Departure>>>,
    /// The full site list, fetched once and reused until refreshed.
    sites: Arc<RwLock<Option<Arc<Vec<Site>>>>>,
}

impl DiscoveryClient {
    /// Create a new discovery client around a transport client.
    pub fn new(client: TransportClient) -> Self {
        let pages = MokaCache::builder()
            .time_to_live(PAGE_TTL)
            .max_capacity(PAGE_CAPACITY)
            .build();

        Self {
            client,
            pages,
            sites: Arc::new(RwLock::new(None)),
        }
    }

    /// The full site list, fetching it on first use.
    pub async fn sites(&self) -> Result<Arc<Vec<Site>>, TransportError> {
        if let Some(sites) = self.sites.read().await.as_ref() {
            return Ok(sites.clone());
        }
        self.refresh_sites().await
    }

    /// Re-fetch the site list, replacing the cached copy. On failure the
    /// existing copy is preserved and the error is returned.
    pub async fn refresh_sites(&self) -> Result<Arc<Vec<Site>>, TransportError> {
        let fetched = Arc::new(self.client.sites().await?);
        debug!(count = fetched.len(), "fetched site list");

        let mut guard = self.sites.write().await;
        *guard = Some(fetched.clone());

        Ok(fetched)
    }

    /// Search sites by name.
    pub async fn search(&self, term: &str) -> Result<Vec<Site>, TransportError> {
        let sites = self.sites().await?;
        Ok(search_sites(&sites, term))
    }

    /// The lines of one transport mode currently departing from a site.
    pub async fn lines(
        &self,
        site_id: &str,
        mode: TransportMode,
    ) -> Result<Vec<LineOption>, TransportError> {
        let page = self.page(site_id).await?;
        Ok(project_lines(&page, mode))
    }

    /// The directions of one transport mode (and optionally one line)
    /// currently departing from a site.
    pub async fn directions(
        &self,
        site_id: &str,
        mode: TransportMode,
        line: Option<&str>,
    ) -> Result<Vec<DirectionOption>, TransportError> {
        let page = self.page(site_id).await?;
        Ok(project_directions(&page, mode, line))
    }

    /// One departures page per site, cached briefly.
    async fn page(&self, site_id: &str) -> Result<Arc<Vec<Departure>>, TransportError> {
        if let Some(page) = self.pages.get(site_id).await {
            return Ok(page);
        }

        let page = Arc::new(self.client.departures(site_id).await?);
        self.pages.insert(site_id.to_string(), page.clone()).await;

        Ok(page)
    }
}
