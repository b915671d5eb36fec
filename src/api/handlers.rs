//! Request handlers for the API endpoints.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::AppState;
use super::error::ApiError;
use super::types::{HealthResponse, RunEvent, RunRequest, StreamState};
use crate::config::StreamConfig;
use crate::sim::analytics::MarketAnalytics;
use crate::sim::engine::simulate;
use crate::sim::handoff::{Abandoned, CancelToken, SnapshotSink, drive};
use crate::sim::types::{RunParams, Snapshot};

/// Snapshots buffered between the simulation task and the event stream.
const STREAM_CAPACITY: usize = 1;

impl SnapshotSink for mpsc::Sender<Snapshot> {
    fn accept(&mut self, snapshot: Snapshot) -> Result<(), Abandoned> {
        self.blocking_send(snapshot).map_err(|_| Abandoned)
    }
}

/// Liveness probe.
///
/// `GET /health` → 200 + `{"status":"ok"}`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Starts a run and streams it as server-sent events.
///
/// `POST /run` with `{"numMeters": n, "startDate": "YYYY-MM-DDTHH:MM"}`
/// → 200 + `text/event-stream`, one `running` event per tick then `done`.
/// Invalid values → 422 + `ErrorResponse`, before any tick is simulated.
pub async fn run(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let scenario = &state.scenario;
    let window = scenario.window().map_err(ApiError::Scenario)?;
    let tick = scenario.tick().map_err(ApiError::Scenario)?;
    let params = RunParams::from_request(req.num_meters, &req.start_date, window, tick)
        .map_err(ApiError::InvalidRequest)?;
    // Model and table loading reads files and allocates every meter.
    let build = Arc::clone(&state);
    let engine = tokio::task::spawn_blocking(move || simulate(params, &build.scenario))
        .await?
        .map_err(ApiError::Scenario)?;

    let (mut tx, rx) = mpsc::channel::<Snapshot>(STREAM_CAPACITY);
    let cancel = CancelToken::new();
    let token = cancel.clone();
    tokio::task::spawn_blocking(move || {
        let outcome = drive(engine, &mut tx, &token);
        debug!(?outcome, "run task exited");
    });

    info!(meters = req.num_meters, start = %req.start_date, "streaming run");
    let events = RunEvents {
        rx,
        analytics: MarketAnalytics::new(),
        stream: scenario.stream.clone(),
        _guard: CancelOnDrop(cancel),
        delay_pending: false,
        finished: false,
    };
    Ok(Sse::new(events.into_stream()).keep_alive(KeepAlive::default()))
}

/// Cancels the producer when the event stream is dropped.
struct CancelOnDrop(CancelToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Consumer side of a streamed run.
struct RunEvents {
    rx: mpsc::Receiver<Snapshot>,
    analytics: MarketAnalytics,
    stream: StreamConfig,
    _guard: CancelOnDrop,
    delay_pending: bool,
    finished: bool,
}

impl RunEvents {
    fn into_stream(self) -> impl Stream<Item = Result<Event, Infallible>> {
        futures::stream::unfold(self, |mut s| async move {
            if s.finished {
                return None;
            }
            if s.delay_pending && s.stream.step_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(s.stream.step_delay_ms)).await;
            }
            let event = match s.rx.recv().await {
                Some(snapshot) => {
                    s.analytics.observe(&snapshot);
                    s.delay_pending = true;
                    RunEvent::Running {
                        state: StreamState::from_snapshot(&snapshot, s.stream.compress_threshold),
                        analytics: s.analytics.report(),
                    }
                }
                None => {
                    s.finished = true;
                    info!(ticks = s.analytics.total_ticks(), "run stream finished");
                    RunEvent::Done
                }
            };
            Some((Ok(to_event(&event)), s))
        })
    }
}

fn to_event(event: &RunEvent) -> Event {
    Event::default()
        .json_data(event)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}
