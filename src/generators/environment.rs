//! Per-meter generation and consumption signals.

use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use tracing::warn;

use crate::config::EnvironmentConfig;
use crate::generators::consumption::ConsumptionTable;
use crate::generators::solar::SolarProfile;
use crate::generators::types::{NoiseKind, sample_noise, seeded_rng};
use crate::sim::types::MeterId;

/// Seed offset for the environment RNG.
const ENVIRONMENT_SEED_OFFSET: u64 = 11;

/// Generation and consumption of one meter at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnergyReading {
    pub generation: f64,
    pub consumption: f64,
}

impl EnergyReading {
    pub fn new(generation: f64, consumption: f64) -> Self {
        Self {
            generation,
            consumption,
        }
    }

    /// Net energy: generation minus consumption.
    pub fn surplus(&self) -> f64 {
        self.generation - self.consumption
    }
}

/// Source of per-meter energy readings, queried once per meter per tick.
pub trait EnergySource {
    /// Returns the reading for `meter` at local time `at`.
    fn reading(&mut self, meter: MeterId, at: NaiveDateTime) -> EnergyReading;
}

/// Noise and clamping policy applied to both generated series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoisePolicy {
    pub kind: NoiseKind,
    pub deviation: f64,
    pub clamp_generation: bool,
    pub clamp_consumption: bool,
    pub floor: f64,
}

impl Default for NoisePolicy {
    fn default() -> Self {
        Self {
            kind: NoiseKind::Uniform,
            deviation: 0.5,
            clamp_generation: true,
            clamp_consumption: true,
            floor: 0.0,
        }
    }
}

/// Synthesizes generation from the solar profile and consumption from the
/// historical table, each perturbed by independent noise.
///
/// Every meter sees the same underlying curves; only the noise draw differs
/// between meters and ticks.
pub struct EnvironmentGenerator {
    solar: SolarProfile,
    consumption: ConsumptionTable,
    policy: NoisePolicy,
    rng: StdRng,
}

impl EnvironmentGenerator {
    /// Creates a generator from its parts.
    pub fn new(
        solar: SolarProfile,
        consumption: ConsumptionTable,
        policy: NoisePolicy,
        rng: StdRng,
    ) -> Self {
        Self {
            solar,
            consumption,
            policy,
            rng,
        }
    }

    /// Builds a generator from configuration.
    ///
    /// An unreadable consumption table is logged and replaced by an empty one,
    /// so consumption degrades to zero instead of aborting the run.
    pub fn from_config(cfg: &EnvironmentConfig, seed: Option<u64>) -> Self {
        let consumption = match ConsumptionTable::from_path(&cfg.consumption_path) {
            Ok(table) => table,
            Err(e) => {
                warn!(
                    path = %cfg.consumption_path.display(),
                    error = %e,
                    "consumption table unavailable, consumption degrades to zero"
                );
                ConsumptionTable::default()
            }
        };

        let solar = SolarProfile::new(
            cfg.latitude,
            cfg.longitude,
            cfg.utc_offset_hours,
            cfg.installed_capacity_kw,
        );

        let policy = NoisePolicy {
            kind: cfg.noise,
            deviation: cfg.deviation,
            clamp_generation: cfg.clamp_generation,
            clamp_consumption: cfg.clamp_consumption,
            floor: cfg.floor,
        };

        Self::new(
            solar,
            consumption,
            policy,
            seeded_rng(seed, ENVIRONMENT_SEED_OFFSET),
        )
    }

    /// The noise and clamping policy in effect.
    pub fn policy(&self) -> &NoisePolicy {
        &self.policy
    }

    fn perturb(&mut self, value: f64, clamp: bool) -> f64 {
        let noisy = value + sample_noise(&mut self.rng, self.policy.kind, self.policy.deviation);
        if clamp {
            noisy.max(self.policy.floor)
        } else {
            noisy
        }
    }
}

impl EnergySource for EnvironmentGenerator {
    fn reading(&mut self, _meter: MeterId, at: NaiveDateTime) -> EnergyReading {
        let generation = self.solar.generation_kw(at);
        let consumption = self.consumption.lookup(at.time());
        EnergyReading {
            generation: self.perturb(generation, self.policy.clamp_generation),
            consumption: self.perturb(consumption, self.policy.clamp_consumption),
        }
    }
}
