//! Polling departure board.
//!
//! A [`DepartureBoard`] owns the refresh loop for one configured target
//! (one site + filter combination): it fetches on a fixed interval,
//! coalesces overlapping fetches, filters the raw records, and publishes
//! the result as an atomically-replaced snapshot. Consumers read derived
//! views from the current snapshot or subscribe to be notified on every
//! refresh cycle.
//!
//! The first refresh happens before [`DepartureBoard::start`] returns and
//! is fatal on failure; afterwards a failed refresh keeps the previous
//! snapshot and records the error, so consumers decide for themselves
//! whether stale data is still worth showing.
//!
//! Multiple boards are fully independent and may poll concurrently.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::OptionFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use crate::filter::{FilterSpec, filter_departures};
use crate::transport::{Departure, DepartureSource, TransportError};
use crate::view::{ViewPolicy, ViewState, derive_view};

/// Default refresh interval.
const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(60);

/// Bounds for the refresh interval; values outside are clamped.
const MIN_SCAN_INTERVAL: Duration = Duration::from_secs(30);
const MAX_SCAN_INTERVAL: Duration = Duration::from_secs(300);

/// Default number of slot positions.
const DEFAULT_SLOTS: usize = 3;

/// Configuration for one departure board.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    /// Site id to poll.
    pub site_id: String,
    /// Which departures to keep.
    pub spec: FilterSpec,
    /// Refresh interval (clamped to 30-300 s at startup).
    pub scan_interval: Duration,
    /// Number of slot positions exposed by [`DepartureBoard::slot_states`].
    pub slots: usize,
}

impl BoardConfig {
    /// Create a config for the given site with default settings.
    pub fn new(site_id: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            spec: FilterSpec::default(),
            scan_interval: DEFAULT_SCAN_INTERVAL,
            slots: DEFAULT_SLOTS,
        }
    }

    /// Set the filter spec.
    pub fn with_spec(mut self, spec: FilterSpec) -> Self {
        self.spec = spec;
        self
    }

    /// Set the refresh interval.
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// Set the number of slot positions.
    pub fn with_slots(mut self, slots: usize) -> Self {
        self.slots = slots;
        self
    }
}

/// The filtered departure list from one successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct DepartureSnapshot {
    /// Filtered departures, in upstream order.
    pub departures: Vec<Departure>,
    /// When the fetch completed.
    pub fetched_at: DateTime<Utc>,
}

/// The published state of a board: the latest snapshot plus the latest
/// refresh error, if the most recent fetch failed.
///
/// A failed refresh leaves `snapshot` untouched and sets `last_error`;
/// the next successful refresh clears it.
#[derive(Debug, Clone, Default)]
pub struct BoardState {
    pub snapshot: Option<Arc<DepartureSnapshot>>,
    pub last_error: Option<String>,
}

/// First-refresh failure: the board cannot start without data to serve.
#[derive(Debug, thiserror::Error)]
#[error("first refresh for site {site_id} failed: {source}")]
pub struct SetupError {
    pub site_id: String,
    #[source]
    pub source: TransportError,
}

/// The fetch/filter cycle state machine, kept separate from the timer
/// loop so coalescing and failure handling are testable without one.
///
/// Transitions: idle -> fetching via [`PollCycle::begin`] (a no-op while
/// already fetching), fetching -> idle via [`PollCycle::complete`].
#[derive(Debug)]
pub struct PollCycle {
    spec: FilterSpec,
    in_flight: bool,
    state: BoardState,
}

impl PollCycle {
    /// Create an idle cycle with no snapshot.
    pub fn new(spec: FilterSpec) -> Self {
        Self {
            spec,
            in_flight: false,
            state: BoardState::default(),
        }
    }

    /// Try to start a fetch. Returns `false` while one is already in
    /// flight: the tick is coalesced, not queued.
    pub fn begin(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    /// Whether a fetch is currently in flight.
    pub fn is_fetching(&self) -> bool {
        self.in_flight
    }

    /// Finish the in-flight fetch.
    ///
    /// On success the raw records are filtered and atomically replace the
    /// snapshot, clearing any recorded error. On failure the previous
    /// snapshot is retained unchanged and the error is recorded.
    pub fn complete(
        &mut self,
        result: Result<Vec<Departure>, TransportError>,
        fetched_at: DateTime<Utc>,
    ) -> BoardState {
        self.in_flight = false;

        match result {
            Ok(raw) => {
                let total = raw.len();
                let departures = filter_departures(raw, &self.spec);
                debug!(
                    total,
                    kept = departures.len(),
                    "refresh succeeded"
                );
                self.state = BoardState {
                    snapshot: Some(Arc::new(DepartureSnapshot {
                        departures,
                        fetched_at,
                    })),
                    last_error: None,
                };
            }
            Err(e) => {
                warn!(error = %e, "refresh failed, keeping previous snapshot");
                self.state.last_error = Some(e.to_string());
            }
        }

        self.state.clone()
    }

    /// The current published state.
    pub fn state(&self) -> &BoardState {
        &self.state
    }
}

/// Handle to a running departure board.
///
/// Dropping the board (or calling [`DepartureBoard::shutdown`]) aborts
/// the polling loop; an in-flight fetch is abandoned and its result is
/// never published.
#[derive(Debug)]
pub struct DepartureBoard {
    site_id: String,
    slots: usize,
    state_rx: watch::Receiver<BoardState>,
    task: JoinHandle<()>,
}

impl DepartureBoard {
    /// Start a board: perform the first refresh, then begin polling.
    ///
    /// Does not return until the first fetch attempt resolves; a
    /// first-attempt failure is fatal because there is no snapshot to
    /// serve yet.
    pub async fn start<S>(source: S, config: BoardConfig) -> Result<Self, SetupError>
    where
        S: DepartureSource + Clone + Send + Sync + 'static,
    {
        let BoardConfig {
            site_id,
            spec,
            scan_interval,
            slots,
        } = config;
        let scan_interval = clamp_scan_interval(scan_interval);

        let mut cycle = PollCycle::new(spec);
        cycle.begin();
        let raw = source
            .fetch_departures(&site_id)
            .await
            .map_err(|e| SetupError {
                site_id: site_id.clone(),
                source: e,
            })?;
        let state = cycle.complete(Ok(raw), Utc::now());
        debug!(site = %site_id, "first refresh complete");

        let (tx, state_rx) = watch::channel(state);
        let task = tokio::spawn(poll_loop(source, site_id.clone(), cycle, scan_interval, tx));

        Ok(Self {
            site_id,
            slots,
            state_rx,
            task,
        })
    }

    /// The site this board polls.
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    /// The number of configured slot positions.
    pub fn slots(&self) -> usize {
        self.slots
    }

    /// The current published state.
    pub fn state(&self) -> BoardState {
        self.state_rx.borrow().clone()
    }

    /// Subscribe to state changes. The receiver is notified after every
    /// refresh cycle, successful or failed.
    pub fn subscribe(&self) -> watch::Receiver<BoardState> {
        self.state_rx.clone()
    }

    /// Whether the board has a snapshot to serve.
    pub fn available(&self) -> bool {
        self.state_rx.borrow().snapshot.is_some()
    }

    /// The last refresh error, if the most recent fetch failed.
    pub fn last_error(&self) -> Option<String> {
        self.state_rx.borrow().last_error.clone()
    }

    /// Derive a view from the current snapshot.
    pub fn view(&self, policy: ViewPolicy) -> ViewState {
        let state = self.state_rx.borrow();
        let departures = state
            .snapshot
            .as_deref()
            .map(|s| s.departures.as_slice())
            .unwrap_or(&[]);
        derive_view(policy, departures, Utc::now())
    }

    /// The departure at the given slot position.
    pub fn slot(&self, index: usize) -> ViewState {
        self.view(ViewPolicy::Slot(index))
    }

    /// Every configured slot position, in order.
    pub fn slot_states(&self) -> Vec<ViewState> {
        (0..self.slots).map(|i| self.slot(i)).collect()
    }

    /// The next departure.
    pub fn next(&self) -> ViewState {
        self.view(ViewPolicy::Next)
    }

    /// The next non-cancelled departure.
    pub fn next_active(&self) -> ViewState {
        self.view(ViewPolicy::NextActive)
    }

    /// Stop polling. An in-flight fetch is abandoned without publishing.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Drop for DepartureBoard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Clamp the refresh interval to the supported bounds.
fn clamp_scan_interval(interval: Duration) -> Duration {
    if interval < MIN_SCAN_INTERVAL {
        warn!(
            requested_secs = interval.as_secs(),
            "scan interval below minimum, clamping"
        );
        MIN_SCAN_INTERVAL
    } else if interval > MAX_SCAN_INTERVAL {
        warn!(
            requested_secs = interval.as_secs(),
            "scan interval above maximum, clamping"
        );
        MAX_SCAN_INTERVAL
    } else {
        interval
    }
}

/// The timer loop: tick on the interval, start a fetch unless one is in
/// flight, apply results as they land.
///
/// Fetches run as their own task over a cloned source so ticks keep
/// being evaluated (and coalesced) while a slow fetch is suspended.
async fn poll_loop<S>(
    source: S,
    site_id: String,
    mut cycle: PollCycle,
    scan_interval: Duration,
    tx: watch::Sender<BoardState>,
) where
    S: DepartureSource + Clone + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval(scan_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick is immediate and the caller just fetched; skip it.
    ticker.tick().await;

    let mut in_flight: Option<JoinHandle<Result<Vec<Departure>, TransportError>>> = None;

    loop {
        let fetching = in_flight.is_some();
        tokio::select! {
            _ = ticker.tick() => {
                if cycle.begin() {
                    let source = source.clone();
                    let site_id = site_id.clone();
                    in_flight = Some(tokio::spawn(async move {
                        source.fetch_departures(&site_id).await
                    }));
                } else {
                    trace!(site = %site_id, "fetch already in flight, tick coalesced");
                }
            }
            joined = OptionFuture::from(in_flight.as_mut()), if fetching => {
                in_flight = None;
                let Some(join_result) = joined else { continue };
                let result = match join_result {
                    Ok(fetch_result) => fetch_result,
                    Err(join_error) => Err(TransportError::Api {
                        status: 0,
                        message: format!("fetch task failed: {join_error}"),
                    }),
                };
                let state = cycle.complete(result, Utc::now());
                tx.send_replace(state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Line, TransportMode};
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()
    }

    fn train(display: &str) -> Departure {
        Departure {
            display: Some(display.to_string()),
            line: Some(Line {
                designation: Some("41".to_string()),
                transport_mode: Some(TransportMode::Train),
                group_of_lines: None,
            }),
            ..Departure::default()
        }
    }

    fn bus(display: &str) -> Departure {
        Departure {
            line: Some(Line {
                designation: Some("4".to_string()),
                transport_mode: Some(TransportMode::Bus),
                group_of_lines: None,
            }),
            ..train(display)
        }
    }

    fn fetch_error() -> TransportError {
        TransportError::Api {
            status: 503,
            message: "Service Unavailable".into(),
        }
    }

    /// A source that serves a scripted sequence of responses.
    #[derive(Clone)]
    struct ScriptedSource {
        responses: Arc<Mutex<VecDeque<Result<Vec<Departure>, TransportError>>>>,
    }

    impl ScriptedSource {
        fn new(
            responses: impl IntoIterator<Item = Result<Vec<Departure>, TransportError>>,
        ) -> Self {
            Self {
                responses: Arc::new(Mutex::new(responses.into_iter().collect())),
            }
        }
    }

    impl DepartureSource for ScriptedSource {
        async fn fetch_departures(
            &self,
            _site_id: &str,
        ) -> Result<Vec<Departure>, TransportError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    #[test]
    fn cycle_coalesces_overlapping_fetches() {
        let mut cycle = PollCycle::new(FilterSpec::default());

        assert!(cycle.begin());
        assert!(cycle.is_fetching());
        // A tick arriving while fetching is a no-op, not a queued fetch.
        assert!(!cycle.begin());
        assert!(!cycle.begin());

        cycle.complete(Ok(vec![]), fetched_at());
        assert!(!cycle.is_fetching());
        assert!(cycle.begin());
    }

    #[test]
    fn cycle_success_filters_and_replaces_snapshot() {
        let mut cycle = PollCycle::new(FilterSpec::default());

        cycle.begin();
        let state = cycle.complete(Ok(vec![train("3 min"), bus("7 min")]), fetched_at());

        let snapshot = state.snapshot.unwrap();
        assert_eq!(snapshot.departures.len(), 1);
        assert_eq!(snapshot.departures[0].display.as_deref(), Some("3 min"));
        assert_eq!(snapshot.fetched_at, fetched_at());
        assert_eq!(state.last_error, None);
    }

    #[test]
    fn cycle_failure_retains_snapshot_and_records_error() {
        let mut cycle = PollCycle::new(FilterSpec::default());

        cycle.begin();
        cycle.complete(Ok(vec![train("3 min")]), fetched_at());
        let before = cycle.state().snapshot.clone();

        cycle.begin();
        let state = cycle.complete(Err(fetch_error()), fetched_at());

        assert_eq!(state.snapshot, before);
        assert!(state.last_error.unwrap().contains("503"));
    }

    #[test]
    fn cycle_success_clears_recorded_error() {
        let mut cycle = PollCycle::new(FilterSpec::default());

        cycle.begin();
        cycle.complete(Err(fetch_error()), fetched_at());
        assert!(cycle.state().last_error.is_some());
        assert!(cycle.state().snapshot.is_none());

        cycle.begin();
        let state = cycle.complete(Ok(vec![train("3 min")]), fetched_at());
        assert_eq!(state.last_error, None);
        assert!(state.snapshot.is_some());
    }

    #[test]
    fn scan_interval_is_clamped() {
        assert_eq!(
            clamp_scan_interval(Duration::from_secs(5)),
            MIN_SCAN_INTERVAL
        );
        assert_eq!(
            clamp_scan_interval(Duration::from_secs(3600)),
            MAX_SCAN_INTERVAL
        );
        assert_eq!(
            clamp_scan_interval(Duration::from_secs(90)),
            Duration::from_secs(90)
        );
    }

    #[tokio::test]
    async fn start_serves_first_snapshot() {
        let source = ScriptedSource::new([Ok(vec![train("3 min"), train("12 min")])]);
        let board = DepartureBoard::start(source, BoardConfig::new("9510"))
            .await
            .unwrap();

        assert!(board.available());
        assert_eq!(board.last_error(), None);
        assert_eq!(board.site_id(), "9510");

        let slot = board.slot(0);
        assert!(slot.available);
        assert_eq!(slot.value.as_deref(), Some("3 min"));

        assert!(!board.slot(2).available);
        assert_eq!(board.slot_states().len(), 3);
        assert!(board.next().available);
    }

    #[tokio::test]
    async fn start_applies_filter_spec() {
        let source = ScriptedSource::new([Ok(vec![bus("7 min"), train("3 min")])]);
        let config = BoardConfig::new("9510")
            .with_spec(FilterSpec::new([TransportMode::Train]).with_lines("41"));
        let board = DepartureBoard::start(source, config).await.unwrap();

        let state = board.state();
        assert_eq!(state.snapshot.unwrap().departures.len(), 1);
    }

    #[tokio::test]
    async fn first_refresh_failure_is_fatal() {
        let source = ScriptedSource::new([Err(fetch_error())]);
        let result = DepartureBoard::start(source, BoardConfig::new("9510")).await;

        let err = result.unwrap_err();
        assert_eq!(err.site_id, "9510");
        assert!(err.to_string().contains("first refresh"));
    }

    #[tokio::test]
    async fn empty_departure_list_starts_but_serves_nothing() {
        let source = ScriptedSource::new([Ok(vec![])]);
        let board = DepartureBoard::start(source, BoardConfig::new("9510"))
            .await
            .unwrap();

        assert!(board.available());
        assert!(!board.slot(0).available);
        assert!(!board.next().available);
        assert!(!board.next_active().available);
    }

    #[tokio::test]
    async fn subscriber_sees_initial_state() {
        let source = ScriptedSource::new([Ok(vec![train("3 min")])]);
        let board = DepartureBoard::start(source, BoardConfig::new("9510"))
            .await
            .unwrap();

        let rx = board.subscribe();
        let state = rx.borrow();
        assert_eq!(state.snapshot.as_ref().unwrap().departures.len(), 1);
    }
}
