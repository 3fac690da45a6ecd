//! Departure filtering.
//!
//! A [`FilterSpec`] narrows a raw departure list down to the configured
//! transport modes, direction, and lines. Filtering is a pure,
//! order-preserving projection: the output is a subset of the input in the
//! original order, and no record is ever modified.

use std::collections::HashSet;

use crate::transport::{Departure, TransportMode};

/// Which departures a configured target is interested in.
///
/// Built once at configuration time and treated as immutable afterwards;
/// changing the filter means building a new spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    /// Accepted transport modes. Never empty.
    modes: HashSet<TransportMode>,

    /// Direction code to match exactly, if any.
    direction_code: Option<String>,

    /// Accepted line designations, in the order they were given.
    /// Empty means all lines.
    lines: Vec<String>,
}

impl FilterSpec {
    /// Create a spec accepting the given transport modes.
    ///
    /// An empty mode set falls back to `{Train}`, the default target.
    pub fn new(modes: impl IntoIterator<Item = TransportMode>) -> Self {
        let mut modes: HashSet<TransportMode> = modes.into_iter().collect();
        if modes.is_empty() {
            modes.insert(TransportMode::Train);
        }
        Self {
            modes,
            direction_code: None,
            lines: Vec::new(),
        }
    }

    /// Restrict to a single direction code. An empty code means all
    /// directions.
    pub fn with_direction(mut self, code: impl Into<String>) -> Self {
        let code = code.into();
        self.direction_code = if code.is_empty() { None } else { Some(code) };
        self
    }

    /// Restrict to a comma-separated list of line designations, e.g.
    /// `" 19, 19S "`. Entries are trimmed; empty entries are dropped. An
    /// empty list means all lines.
    pub fn with_lines(mut self, lines: &str) -> Self {
        self.lines = lines
            .split(',')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    /// The accepted transport modes.
    pub fn modes(&self) -> &HashSet<TransportMode> {
        &self.modes
    }

    /// The direction code filter, if any.
    pub fn direction_code(&self) -> Option<&str> {
        self.direction_code.as_deref()
    }

    /// The accepted line designations.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Whether a departure passes all three filter dimensions.
    pub fn matches(&self, departure: &Departure) -> bool {
        self.matches_mode(departure)
            && self.matches_direction(departure)
            && self.matches_line(departure)
    }

    fn matches_mode(&self, departure: &Departure) -> bool {
        departure
            .line
            .as_ref()
            .and_then(|l| l.transport_mode)
            .is_some_and(|mode| self.modes.contains(&mode))
    }

    fn matches_direction(&self, departure: &Departure) -> bool {
        let Some(code) = self.direction_code.as_deref() else {
            return true;
        };
        departure.direction_code.as_deref() == Some(code)
    }

    fn matches_line(&self, departure: &Departure) -> bool {
        if self.lines.is_empty() {
            return true;
        }
        departure
            .line
            .as_ref()
            .and_then(|l| l.designation.as_deref())
            .is_some_and(|designation| self.lines.iter().any(|l| l == designation))
    }
}

impl Default for FilterSpec {
    /// Trains, all directions, all lines.
    fn default() -> Self {
        Self::new([TransportMode::Train])
    }
}

/// Narrow a departure list to the records matching `spec`.
///
/// Applied as three passes (mode, direction, line); each pass only
/// removes records, so the output order equals the input order.
pub fn filter_departures(mut departures: Vec<Departure>, spec: &FilterSpec) -> Vec<Departure> {
    departures.retain(|d| spec.matches_mode(d));
    departures.retain(|d| spec.matches_direction(d));
    departures.retain(|d| spec.matches_line(d));
    departures
}
