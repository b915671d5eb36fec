//! Simulation engine that drives generators and the trader tick by tick.

use tracing::{debug, info};

use crate::config::{ConfigError, ScenarioConfig};
use crate::generators::environment::{EnergySource, EnvironmentGenerator};
use crate::generators::grid::{GridSource, GridTelemetry};
use crate::scoring::ScoringModel;

use super::clock::Clock;
use super::trader::Trader;
use super::types::{Meter, MeterId, RunParams, Snapshot};

/// Simulation engine owning the meters, signal sources, and trader.
///
/// Generic over `E: EnergySource` and `G: GridSource` for static dispatch.
/// Single pass and not restartable: it is an iterator of snapshots that ends
/// once the clock passes the end of the window.
pub struct Engine<E: EnergySource, G: GridSource> {
    params: RunParams,
    clock: Clock,
    meters: Vec<Meter>,
    energy: E,
    grid: G,
    trader: Trader,
    emitted: usize,
    finished: bool,
}

impl<E: EnergySource, G: GridSource> Engine<E, G> {
    /// Creates a new simulation engine.
    ///
    /// # Arguments
    ///
    /// * `params` - Validated run parameters
    /// * `energy` - Per-meter generation/consumption source
    /// * `grid` - Grid telemetry source
    /// * `trader` - Matching engine
    pub fn new(params: RunParams, energy: E, grid: G, trader: Trader) -> Self {
        let meters = (0..params.participants)
            .map(|i| Meter::new(MeterId::from_index(i)))
            .collect();
        let clock = Clock::new(params.start, params.end, params.increment);
        Self {
            params,
            clock,
            meters,
            energy,
            grid,
            trader,
            emitted: 0,
            finished: false,
        }
    }

    /// Executes one tick and returns its snapshot.
    ///
    /// # Returns
    ///
    /// `None` once the window is exhausted.
    pub fn step(&mut self) -> Option<Snapshot> {
        let Some(at) = self.clock.tick() else {
            if !self.finished {
                self.finished = true;
                info!(ticks = self.emitted, "simulation finished");
            }
            return None;
        };

        // 1. Grid readings
        let grid = self.grid.reading(at);

        // 2. Fresh surplus for every meter
        for meter in &mut self.meters {
            let reading = self.energy.reading(meter.id, at);
            meter.read_env(reading);
        }

        // 3. Matching
        let trades = self.trader.execute(&mut self.meters, &grid, self.params.increment);

        // 4. Snapshot
        let snapshot = Snapshot::new(at, &self.meters, grid);
        debug!(
            time = %snapshot.time,
            trades = trades.len(),
            traded = snapshot.traded_energy(),
            "tick simulated"
        );
        self.emitted += 1;
        Some(snapshot)
    }

    /// Current meter states.
    pub fn meters(&self) -> &[Meter] {
        &self.meters
    }

    /// Run parameters.
    pub fn params(&self) -> &RunParams {
        &self.params
    }

    pub fn trader(&self) -> &Trader {
        &self.trader
    }
}

impl<E: EnergySource, G: GridSource> Iterator for Engine<E, G> {
    type Item = Snapshot;

    fn next(&mut self) -> Option<Snapshot> {
        self.step()
    }
}

/// Builds a simulation run from validated parameters and a scenario.
///
/// The returned engine is a lazy, single-pass sequence of snapshots.
/// Calling this twice with the same unseeded scenario gives different runs.
///
/// # Errors
///
/// Returns a `ConfigError` before any tick is simulated if the grid,
/// scoring, or matching sections are invalid.
pub fn simulate(
    params: RunParams,
    scenario: &ScenarioConfig,
) -> Result<Engine<EnvironmentGenerator, GridTelemetry>, ConfigError> {
    let seed = scenario.simulation.seed;
    let grid = GridTelemetry::from_config(&scenario.grid, seed)
        .map_err(|e| ConfigError::new("grid", e.to_string()))?;
    let selection = scenario.matching.selection()?;
    let scoring = ScoringModel::from_config(&scenario.scoring)?;
    let energy = EnvironmentGenerator::from_config(&scenario.environment, seed);

    info!(
        meters = params.participants,
        start = %params.start,
        end = %params.end,
        ticks = params.tick_count(),
        ?selection,
        "simulation started"
    );
    Ok(Engine::new(params, energy, grid, Trader::new(scoring, selection)))
}
