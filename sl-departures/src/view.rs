//! Presentation views over a filtered departure list.
//!
//! Three policies consume the same filtered list: a fixed number of slot
//! positions, a "next departure" value, and a "next active departure"
//! value that skips cancelled entries. All three share one derived
//! attribute shape ([`DepartureInfo`]) and one derivation function
//! ([`derive_view`]) parameterized by a [`ViewPolicy`] tag, so the
//! delay/ETA math can never drift between them.
//!
//! Views are pure functions of `(departures, now)`; they hold no state
//! and are recomputed on every read.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::timefmt::{delay_minutes, format_clock, minutes_until};
use crate::transport::{Departure, TransportMode};

/// Agency tag attached to every derived attribute payload.
pub const AGENCY: &str = "SL";

/// Display value for a departure leaving within the current minute.
pub const NOW_LABEL: &str = "Now";

/// Whether a departure is cancelled.
///
/// The upstream record carries two lifecycle fields that disagree across
/// payload variants: the top-level `state` and the nested `journey.state`.
/// The nested journey state is treated as authoritative here; the
/// top-level field is ignored.
pub fn is_cancelled(departure: &Departure) -> bool {
    departure
        .journey
        .as_ref()
        .and_then(|j| j.state.as_deref())
        == Some("CANCELLED")
}

/// Derived attributes for one departure.
///
/// Field names follow the attribute payload consumed by departure-board
/// cards: raw timestamps alongside the derived clock string, ETA minutes,
/// delay, and cancellation flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartureInfo {
    pub line: Option<String>,
    pub destination: Option<String>,
    pub scheduled_time: Option<String>,
    pub expected_time: Option<String>,
    pub time_formatted: Option<String>,
    pub minutes_until: i64,
    pub transport_mode: Option<TransportMode>,
    /// Whether the expected time is a live real-time estimate.
    pub real_time: bool,
    /// Delay in minutes; 0 when it cannot be derived.
    pub delay_minutes: i64,
    pub canceled: bool,
    pub platform: Option<String>,
    pub agency: &'static str,
    pub direction: Option<String>,
    /// Raw top-level lifecycle state, for consumers that want it.
    pub state: Option<String>,
    pub stop_area: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deviations: Option<Vec<String>>,
}

/// Derive the attribute payload for a single departure.
pub fn departure_info(departure: &Departure, now: DateTime<Utc>) -> DepartureInfo {
    let line = departure.line.as_ref();
    let journey = departure.journey.as_ref();

    let deviations: Vec<String> = departure
        .deviations
        .iter()
        .filter_map(|d| d.message.clone())
        .collect();

    DepartureInfo {
        line: line.and_then(|l| l.designation.clone()),
        destination: departure.destination.clone(),
        scheduled_time: departure.scheduled.clone(),
        expected_time: departure.expected.clone(),
        time_formatted: format_clock(departure.expected.as_deref()),
        minutes_until: minutes_until(departure.expected.as_deref(), now),
        transport_mode: line.and_then(|l| l.transport_mode),
        real_time: journey.and_then(|j| j.prediction_state.as_deref()) == Some("NORMAL"),
        delay_minutes: delay_minutes(
            departure.scheduled.as_deref(),
            departure.expected.as_deref(),
        )
        .unwrap_or(0),
        canceled: is_cancelled(departure),
        platform: departure
            .stop_point
            .as_ref()
            .and_then(|p| p.designation.clone()),
        agency: AGENCY,
        direction: departure.direction.clone(),
        state: departure.state.clone(),
        stop_area: departure.stop_area.as_ref().and_then(|a| a.name.clone()),
        deviations: if deviations.is_empty() {
            None
        } else {
            Some(deviations)
        },
    }
}

/// Which presentation a caller wants derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPolicy {
    /// One fixed position on the departure board (0 = next).
    Slot(usize),
    /// The next departure, with the full upcoming list as attributes.
    Next,
    /// The next non-cancelled departure, with the full upcoming list as
    /// attributes.
    NextActive,
}

/// A derived presentation state.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    /// The display value, if one can be derived.
    pub value: Option<String>,
    /// Whether the underlying data supports this view.
    pub available: bool,
    /// The derived attribute payload.
    pub attributes: ViewAttributes,
}

/// Attribute payload shape, per policy.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewAttributes {
    /// Attributes of the one departure occupying a slot, if present.
    Slot(Option<DepartureInfo>),
    /// Attributes of every departure in the filtered list.
    Upcoming(Vec<DepartureInfo>),
}

/// Derive a presentation state from a filtered departure list.
///
/// The list is consumed in upstream order; departures are never
/// re-sorted here.
pub fn derive_view(policy: ViewPolicy, departures: &[Departure], now: DateTime<Utc>) -> ViewState {
    match policy {
        ViewPolicy::Slot(index) => {
            let departure = departures.get(index);
            ViewState {
                value: departure.and_then(|d| d.display.clone()),
                available: index < departures.len(),
                attributes: ViewAttributes::Slot(departure.map(|d| departure_info(d, now))),
            }
        }
        ViewPolicy::Next => ViewState {
            value: departures.first().and_then(|d| d.display.clone()),
            available: !departures.is_empty(),
            attributes: upcoming(departures, now),
        },
        ViewPolicy::NextActive => {
            let active = departures.iter().find(|d| !is_cancelled(d));
            ViewState {
                value: active.and_then(|d| next_active_display(d, now)),
                // An all-cancelled list is still available, just without a
                // usable next value.
                available: !departures.is_empty(),
                attributes: upcoming(departures, now),
            }
        }
    }
}

fn upcoming(departures: &[Departure], now: DateTime<Utc>) -> ViewAttributes {
    ViewAttributes::Upcoming(departures.iter().map(|d| departure_info(d, now)).collect())
}

/// Display value for the next-active policy: "Now" inside the current
/// minute, "{m} min" under an hour, the clock time beyond that. Without
/// an expected timestamp, the upstream display string is used as-is.
fn next_active_display(departure: &Departure, now: DateTime<Utc>) -> Option<String> {
    let Some(expected) = departure.expected.as_deref() else {
        return departure.display.clone();
    };

    let minutes = minutes_until(Some(expected), now);
    if minutes == 0 {
        Some(NOW_LABEL.to_string())
    } else if minutes < 60 {
        Some(format!("{minutes} min"))
    } else {
        format_clock(Some(expected)).or_else(|| departure.display.clone())
    }
}

/// Human-readable label for a slot position.
pub fn slot_label(index: usize) -> String {
    match index {
        0 => "Next".to_string(),
        1 => "2nd".to_string(),
        2 => "3rd".to_string(),
        _ => format!("{}th", index + 1),
    }
}
