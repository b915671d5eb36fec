//! Core market types: meters, per-tick snapshots and run parameters.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, parse_start};
use crate::generators::environment::EnergyReading;
use crate::generators::grid::GridState;

/// Stable participant identifier, assigned sequentially from 1.
///
/// Serialized as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MeterId(pub u32);

impl MeterId {
    /// Identifier of the meter stored at `index` in the engine's meter list.
    pub fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).map_or(u32::MAX, |i| i.saturating_add(1)))
    }

    /// Position of this meter in the engine's meter list.
    pub fn index(self) -> usize {
        self.0.saturating_sub(1) as usize
    }
}

impl fmt::Display for MeterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<MeterId> for String {
    fn from(id: MeterId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for MeterId {
    type Error = std::num::ParseIntError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse().map(MeterId)
    }
}

/// One market participant.
///
/// `surplus` is overwritten every tick from fresh readings; `participation`
/// only ever grows.
#[derive(Debug, Clone, PartialEq)]
pub struct Meter {
    pub id: MeterId,
    /// Generation minus consumption at the current tick.
    pub surplus: f64,
    /// Ticks in which this meter sold as the winning seller.
    pub participation: u32,
    /// Energy moved this tick: positive = received, negative = sent.
    pub transferred: f64,
    /// Trade partner for the current tick.
    pub counterparty: Option<MeterId>,
}

impl Meter {
    pub fn new(id: MeterId) -> Self {
        Self {
            id,
            surplus: 0.0,
            participation: 0,
            transferred: 0.0,
            counterparty: None,
        }
    }

    /// Starts a new tick: replaces the surplus and clears the trade fields.
    pub fn read_env(&mut self, reading: EnergyReading) {
        self.surplus = reading.surplus();
        self.transferred = 0.0;
        self.counterparty = None;
    }

    /// Positive surplus: eligible to sell.
    pub fn is_offer(&self) -> bool {
        self.surplus > 0.0
    }

    /// Negative surplus: eligible to buy.
    pub fn is_requester(&self) -> bool {
        self.surplus < 0.0
    }

    /// Surplus remaining after this tick's transfer.
    pub fn leftover(&self) -> f64 {
        self.surplus + self.transferred
    }
}

/// Published view of a meter at the end of a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterState {
    pub id: MeterId,
    /// Surplus before trading.
    #[serde(rename = "s")]
    pub surplus: f64,
    /// Signed transferred amount.
    #[serde(rename = "p")]
    pub transferred: f64,
    /// Counterparty id, or empty.
    #[serde(rename = "f", with = "counterparty")]
    pub counterparty: Option<MeterId>,
    /// Participation count.
    #[serde(rename = "c")]
    pub participation: u32,
}

impl MeterState {
    /// Surplus remaining after the transfer.
    pub fn leftover(&self) -> f64 {
        self.surplus + self.transferred
    }
}

impl From<&Meter> for MeterState {
    fn from(m: &Meter) -> Self {
        Self {
            id: m.id,
            surplus: m.surplus,
            transferred: m.transferred,
            counterparty: m.counterparty,
            participation: m.participation,
        }
    }
}

mod counterparty {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::MeterId;

    pub fn serialize<S: Serializer>(id: &Option<MeterId>, s: S) -> Result<S::Ok, S::Error> {
        match id {
            Some(id) => s.serialize_str(&id.to_string()),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<MeterId>, D::Error> {
        let raw = String::deserialize(d)?;
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse().map(|n| Some(MeterId(n))).map_err(serde::de::Error::custom)
    }
}

/// Immutable record of one tick.
///
/// Serializes as `{time, meters, grid}` where `grid` holds the named,
/// rounded readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Tick timestamp.
    #[serde(skip)]
    pub timestamp: NaiveDateTime,
    /// Clock time of the tick, `HH:MM:SS`.
    pub time: String,
    /// One entry per participant, in id order.
    pub meters: Vec<MeterState>,
    /// Named grid readings rounded to two decimals.
    pub grid: BTreeMap<String, f64>,
    /// Unrounded grid readings the tick was matched against.
    #[serde(skip)]
    pub readings: GridState,
}

impl Snapshot {
    pub fn new(timestamp: NaiveDateTime, meters: &[Meter], readings: GridState) -> Self {
        Self {
            timestamp,
            time: timestamp.format("%H:%M:%S").to_string(),
            meters: meters.iter().map(MeterState::from).collect(),
            grid: readings.formatted(),
            readings,
        }
    }

    /// Number of executed trades.
    pub fn trade_count(&self) -> usize {
        self.meters.iter().filter(|m| m.transferred > 0.0).count()
    }

    /// Total energy moved between meters.
    pub fn traded_energy(&self) -> f64 {
        self.meters
            .iter()
            .map(|m| m.transferred)
            .filter(|t| *t > 0.0)
            .sum()
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | meters={:>3}  trades={:>3}  traded={:>8.3} | load={:.2}  temp={:.1}  \
             V={:.1}  I={:.2}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.meters.len(),
            self.trade_count(),
            self.traded_energy(),
            self.readings.load,
            self.readings.temperature,
            self.readings.voltage,
            self.readings.intensity,
        )
    }
}

/// Validated input of a simulation run.
///
/// # Examples
///
/// ```
/// use chrono::TimeDelta;
/// use p2p_energy_sim::sim::types::RunParams;
///
/// let p = RunParams::from_request(3, "2024-06-01T00:00", TimeDelta::hours(1), TimeDelta::minutes(15))
///     .expect("valid parameters");
/// assert_eq!(p.tick_count(), 4);
/// assert_eq!(p.tick_seconds(), 900.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RunParams {
    /// Number of meters (> 0).
    pub participants: usize,
    /// First tick.
    pub start: NaiveDateTime,
    /// Exclusive end; no tick is emitted at or after it.
    pub end: NaiveDateTime,
    /// Tick length (> 0).
    pub increment: TimeDelta,
}

impl RunParams {
    /// Validates run parameters.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for zero participants, a non-positive
    /// increment, or an end before the start.
    pub fn new(
        participants: usize,
        start: NaiveDateTime,
        end: NaiveDateTime,
        increment: TimeDelta,
    ) -> Result<Self, ConfigError> {
        if participants == 0 {
            return Err(ConfigError::new("participants", "must be > 0"));
        }
        if increment.num_milliseconds() <= 0 {
            return Err(ConfigError::new(
                "increment",
                format!("must be at least 1ms, got {increment}"),
            ));
        }
        if end < start {
            return Err(ConfigError::new("end", "must not be before start"));
        }
        Ok(Self {
            participants,
            start,
            end,
            increment,
        })
    }

    /// Builds parameters from untrusted request values.
    ///
    /// # Arguments
    ///
    /// * `participants` - Requested meter count (may be negative on the wire)
    /// * `start` - Start time, `YYYY-MM-DDTHH:MM`
    /// * `window` - Run length from `start`
    /// * `increment` - Tick length
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if any value is out of range or the start
    /// time does not parse.
    pub fn from_request(
        participants: i64,
        start: &str,
        window: TimeDelta,
        increment: TimeDelta,
    ) -> Result<Self, ConfigError> {
        let participants = usize::try_from(participants)
            .map_err(|_| ConfigError::new("participants", format!("must be > 0, got {participants}")))?;
        let start = parse_start(start)?;
        let end = start
            .checked_add_signed(window)
            .ok_or_else(|| ConfigError::new("end", "window overflows the calendar"))?;
        Self::new(participants, start, end, increment)
    }

    /// Number of ticks the run will emit.
    pub fn tick_count(&self) -> usize {
        let span = (self.end - self.start).num_milliseconds();
        let step = self.increment.num_milliseconds();
        if span <= 0 || step <= 0 {
            return 0;
        }
        usize::try_from((span + step - 1) / step).unwrap_or(usize::MAX)
    }

    /// Tick length in seconds.
    pub fn tick_seconds(&self) -> f64 {
        self.increment.num_milliseconds() as f64 / 1_000.0
    }
}

/// Rounds to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}
