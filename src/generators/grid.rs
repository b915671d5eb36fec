//! Ambient grid telemetry: load, temperature, voltage and current intensity.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, TimeDelta};
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal, NormalError};
use serde::{Deserialize, Serialize};

use crate::config::{ChannelConfig, GridConfig};
use crate::generators::types::seeded_rng;
use crate::sim::types::round_to;

/// Seed offset for the grid telemetry RNG.
const GRID_SEED_OFFSET: u64 = 23;

/// One tick's grid readings, in the fixed order load, temperature, voltage,
/// intensity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GridState {
    /// Grid load (GWh).
    pub load: f64,
    /// Grid temperature (°C).
    pub temperature: f64,
    /// Voltage (V).
    pub voltage: f64,
    /// Global current intensity (A).
    pub intensity: f64,
}

impl GridState {
    /// Reading names, in array order.
    pub const LABELS: [&'static str; 4] =
        ["Grid load", "Grid temperature", "Voltage", "Global intensity"];

    /// Readings as a fixed-order feature vector.
    pub fn to_array(&self) -> [f64; 4] {
        [self.load, self.temperature, self.voltage, self.intensity]
    }

    /// Energy the grid can physically move in one tick:
    /// `intensity × voltage × tick seconds`.
    pub fn transmission_capacity(&self, tick: TimeDelta) -> f64 {
        let seconds = tick.num_milliseconds() as f64 / 1_000.0;
        self.intensity * self.voltage * seconds
    }

    /// Named readings rounded to two decimals, as published in snapshots.
    pub fn formatted(&self) -> BTreeMap<String, f64> {
        Self::LABELS
            .iter()
            .zip(self.to_array())
            .map(|(label, value)| ((*label).to_string(), round_to(value, 2)))
            .collect()
    }
}

/// Source of per-tick grid readings.
pub trait GridSource {
    /// Returns the grid readings for the tick at `at`.
    fn reading(&mut self, at: NaiveDateTime) -> GridState;
}

/// Draws each channel independently from a fixed normal distribution.
///
/// The timestamp is not used: readings carry no memory across ticks.
pub struct GridTelemetry {
    load: Normal<f64>,
    temperature: Normal<f64>,
    voltage: Normal<f64>,
    intensity: Normal<f64>,
    rng: StdRng,
}

impl GridTelemetry {
    /// Creates a generator from per-channel parameters.
    ///
    /// # Errors
    ///
    /// Returns a `NormalError` if any standard deviation is negative or not finite.
    pub fn new(cfg: &GridConfig, rng: StdRng) -> Result<Self, NormalError> {
        // `Normal::new` only rejects a non-finite deviation.
        let normal = |c: &ChannelConfig| {
            if c.std_dev < 0.0 {
                return Err(NormalError::BadVariance);
            }
            Normal::new(c.mean, c.std_dev)
        };
        Ok(Self {
            load: normal(&cfg.load)?,
            temperature: normal(&cfg.temperature)?,
            voltage: normal(&cfg.voltage)?,
            intensity: normal(&cfg.intensity)?,
            rng,
        })
    }

    /// Creates a generator seeded from the run's master seed.
    ///
    /// # Errors
    ///
    /// Returns a `NormalError` if any standard deviation is negative or not finite.
    pub fn from_config(cfg: &GridConfig, seed: Option<u64>) -> Result<Self, NormalError> {
        Self::new(cfg, seeded_rng(seed, GRID_SEED_OFFSET))
    }
}

impl GridSource for GridTelemetry {
    fn reading(&mut self, _at: NaiveDateTime) -> GridState {
        GridState {
            load: self.load.sample(&mut self.rng),
            temperature: self.temperature.sample(&mut self.rng),
            voltage: self.voltage.sample(&mut self.rng),
            intensity: self.intensity.sample(&mut self.rng),
        }
    }
}
