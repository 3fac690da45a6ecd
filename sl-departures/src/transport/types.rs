//! SL Transport API response DTOs.
//!
//! These types map directly to the JSON returned by the SL Transport
//! integration API. They use `Option` liberally because the API omits
//! fields rather than sending null values in many cases, and a departure
//! record with a missing sub-field must still deserialize.

use serde::{Deserialize, Deserializer, Serialize};

/// Response from `GET /v1/sites/{site_id}/departures`.
///
/// A missing `departures` key is an empty list, not an error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeparturesResponse {
    #[serde(default)]
    pub departures: Vec<Departure>,
}

/// One departure record from the departures endpoint.
///
/// Timestamps are kept as raw strings; all parsing happens in
/// [`crate::timefmt`], where malformed values degrade instead of failing
/// the whole payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Departure {
    /// Destination name, e.g. "Märsta".
    pub destination: Option<String>,

    /// Human-readable direction, usually the same as the destination.
    pub direction: Option<String>,

    /// Direction code. The API sends a JSON number; coerced to a string
    /// so it can be compared against configured filter values.
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub direction_code: Option<String>,

    /// Top-level lifecycle state, e.g. "EXPECTED" or "CANCELLED".
    ///
    /// Not used for cancellation decisions; see
    /// [`crate::view::is_cancelled`].
    pub state: Option<String>,

    /// Precomputed display string from the API, e.g. "5 min" or "14:30".
    pub display: Option<String>,

    /// Scheduled departure timestamp (ISO 8601, usually naive local time).
    pub scheduled: Option<String>,

    /// Expected departure timestamp (ISO 8601, usually naive local time).
    pub expected: Option<String>,

    /// Line information.
    pub line: Option<Line>,

    /// Journey state information.
    pub journey: Option<Journey>,

    /// The stop point (platform/track) this departure leaves from.
    pub stop_point: Option<StopPoint>,

    /// The stop area the stop point belongs to.
    pub stop_area: Option<StopArea>,

    /// Deviation messages attached to this departure.
    #[serde(default)]
    pub deviations: Vec<Deviation>,
}

/// Line information nested in a departure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Line {
    /// Line designation, e.g. "41" or "19S".
    pub designation: Option<String>,

    /// Transport mode of the line.
    pub transport_mode: Option<TransportMode>,

    /// Line group name, e.g. "Pendeltåg".
    pub group_of_lines: Option<String>,
}

/// Journey state nested in a departure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Journey {
    /// Journey state, e.g. "EXPECTED" or "CANCELLED".
    pub state: Option<String>,

    /// Prediction state; "NORMAL" means the expected time is a live
    /// real-time estimate rather than the schedule.
    pub prediction_state: Option<String>,
}

/// Stop point (platform/track) nested in a departure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StopPoint {
    /// Platform or track designation, e.g. "3".
    pub designation: Option<String>,
}

/// Stop area nested in a departure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StopArea {
    /// Stop area name, e.g. "Stockholm City".
    pub name: Option<String>,
}

/// A deviation message attached to a departure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Deviation {
    /// The message text.
    pub message: Option<String>,
}

/// Transport mode enumeration.
///
/// The live API occasionally emits modes outside this set (e.g. TAXI);
/// those deserialize to [`TransportMode::Other`] so one exotic record
/// cannot fail the whole payload. `Other` never matches a mode filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransportMode {
    Train,
    Metro,
    Bus,
    Tram,
    Ship,
    Ferry,
    #[serde(other)]
    Other,
}

/// One site from `GET /v1/sites`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Site {
    /// Site id. The API sends a JSON number; coerced to a string because
    /// it is only ever used as an opaque key in URLs and configuration.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    /// Site name, e.g. "Odenplan".
    pub name: Option<String>,
}

impl Site {
    /// The site name, falling back to "Site {id}" when the API omits it.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Site {}", self.id))
    }
}

/// Deserialize a JSON string or number into a `String`.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Deserialize an optional JSON string or number into an `Option<String>`.
///
/// Values of any other type degrade to `None` (a non-matching record)
/// rather than failing deserialization.
fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        match Option::<serde_json::Value>::deserialize(deserializer)? {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_departure() {
        let json = r#"{
            "destination": "Märsta",
            "direction": "Märsta",
            "direction_code": 2,
            "state": "EXPECTED",
            "display": "5 min",
            "scheduled": "2024-03-15T10:00:00",
            "expected": "2024-03-15T10:05:00",
            "line": {
                "designation": "41",
                "transport_mode": "TRAIN",
                "group_of_lines": "Pendeltåg"
            },
            "journey": {
                "state": "EXPECTED",
                "prediction_state": "NORMAL"
            },
            "stop_point": {"designation": "3"},
            "stop_area": {"name": "Stockholm City"},
            "deviations": [{"message": "Shortened train"}]
        }"#;

        let dep: Departure = serde_json::from_str(json).unwrap();

        assert_eq!(dep.destination.as_deref(), Some("Märsta"));
        assert_eq!(dep.direction_code.as_deref(), Some("2"));
        assert_eq!(dep.display.as_deref(), Some("5 min"));

        let line = dep.line.unwrap();
        assert_eq!(line.designation.as_deref(), Some("41"));
        assert_eq!(line.transport_mode, Some(TransportMode::Train));

        let journey = dep.journey.unwrap();
        assert_eq!(journey.prediction_state.as_deref(), Some("NORMAL"));

        assert_eq!(
            dep.stop_point.unwrap().designation.as_deref(),
            Some("3")
        );
        assert_eq!(dep.deviations.len(), 1);
    }

    #[test]
    fn direction_code_accepts_string() {
        let json = r#"{"direction_code": "2"}"#;
        let dep: Departure = serde_json::from_str(json).unwrap();
        assert_eq!(dep.direction_code.as_deref(), Some("2"));
    }

    #[test]
    fn missing_departures_key_is_empty_list() {
        let response: DeparturesResponse = serde_json::from_str("{}").unwrap();
        assert!(response.departures.is_empty());
    }

    #[test]
    fn unknown_transport_mode_degrades() {
        let json = r#"{"line": {"designation": "X1", "transport_mode": "TAXI"}}"#;
        let dep: Departure = serde_json::from_str(json).unwrap();
        assert_eq!(
            dep.line.unwrap().transport_mode,
            Some(TransportMode::Other)
        );
    }

    #[test]
    fn deserialize_cancelled_departure() {
        let json = r#"{
            "destination": "Västerhaninge",
            "state": "EXPECTED",
            "display": "14:32",
            "journey": {"state": "CANCELLED", "prediction_state": "UNRELIABLE"}
        }"#;

        let dep: Departure = serde_json::from_str(json).unwrap();
        assert_eq!(dep.state.as_deref(), Some("EXPECTED"));
        assert_eq!(
            dep.journey.unwrap().state.as_deref(),
            Some("CANCELLED")
        );
    }

    #[test]
    fn deserialize_site_with_numeric_id() {
        let json = r#"{"id": 9510, "name": "Odenplan"}"#;
        let site: Site = serde_json::from_str(json).unwrap();
        assert_eq!(site.id, "9510");
        assert_eq!(site.display_name(), "Odenplan");
    }

    #[test]
    fn site_display_name_falls_back_to_id() {
        let json = r#"{"id": "1080"}"#;
        let site: Site = serde_json::from_str(json).unwrap();
        assert_eq!(site.display_name(), "Site 1080");
    }
}
