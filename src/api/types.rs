//! Request, event, and error body types.
//!
//! Event field names match what browser clients of the stream read:
//! `numMeters`/`startDate` on the way in, `status`/`state`/`analytics` on
//! the way out.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::compress::compress_meters;
use crate::sim::analytics::AnalyticsReport;
use crate::sim::types::{MeterState, Snapshot};

/// Body of `POST /run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    /// Requested participant count; validated server-side.
    #[serde(rename = "numMeters")]
    pub num_meters: i64,
    /// Start time, `YYYY-MM-DDTHH:MM`.
    #[serde(rename = "startDate")]
    pub start_date: String,
}

/// Meter list of a streamed tick, plain or as base64(gzip(JSON)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetersPayload {
    Plain(Vec<MeterState>),
    Compressed(String),
}

/// Wire form of one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamState {
    pub time: String,
    pub meters: MetersPayload,
    pub grid: BTreeMap<String, f64>,
}

impl StreamState {
    /// Builds the wire form, compressing the meter list when it has at
    /// least `threshold` entries (`0` always compresses).
    ///
    /// Falls back to the plain list if compression fails.
    pub fn from_snapshot(snapshot: &Snapshot, threshold: usize) -> Self {
        let meters = if snapshot.meters.len() >= threshold {
            match compress_meters(&snapshot.meters) {
                Ok(blob) => MetersPayload::Compressed(blob),
                Err(e) => {
                    warn!(error = %e, "meter compression failed, sending plain list");
                    MetersPayload::Plain(snapshot.meters.clone())
                }
            }
        } else {
            MetersPayload::Plain(snapshot.meters.clone())
        };
        Self {
            time: snapshot.time.clone(),
            meters,
            grid: snapshot.grid.clone(),
        }
    }
}

/// One server-sent event of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunEvent {
    /// A tick and the analytics including it.
    Running {
        state: StreamState,
        analytics: AnalyticsReport,
    },
    /// End of the run.
    Done,
}

/// `GET /health` body.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// JSON error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Offending field, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}
