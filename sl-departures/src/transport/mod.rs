//! SL Transport API client.
//!
//! This module provides an HTTP client for the SL Transport integration
//! API, which serves real-time departure information for Stockholm public
//! transit.
//!
//! Key characteristics of the API:
//! - Public and unauthenticated
//! - Timestamps are ISO 8601, usually naive Stockholm local time
//! - A departure carries two lifecycle fields (top-level `state` and
//!   nested `journey.state`) which do not always agree

use std::future::Future;

mod client;
mod error;
mod mock;
mod types;

pub use client::{TransportClient, TransportConfig};
pub use error::TransportError;
pub use mock::MockTransportClient;
pub use types::{
    Departure, DeparturesResponse, Deviation, Journey, Line, Site, StopArea, StopPoint,
    TransportMode,
};

/// Something that can produce the raw departure list for a site.
///
/// This is the seam between the polling loop and the upstream API:
/// [`TransportClient`] implements it over HTTP, [`MockTransportClient`]
/// over JSON fixtures on disk.
pub trait DepartureSource {
    /// Fetch the raw departure list for a site.
    fn fetch_departures(
        &self,
        site_id: &str,
    ) -> impl Future<Output = Result<Vec<Departure>, TransportError>> + Send;
}
