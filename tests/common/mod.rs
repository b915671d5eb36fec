//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use p2p_energy_sim::config::ScenarioConfig;
use p2p_energy_sim::generators::{EnergyReading, EnergySource, GridSource, GridState};
use p2p_energy_sim::scoring::{DEFAULT_WEIGHTS, ScoringModel};
use p2p_energy_sim::sim::engine::Engine;
use p2p_energy_sim::sim::trader::{Selection, Trader};
use p2p_energy_sim::sim::types::{MeterId, RunParams, Snapshot};

/// Same reading every tick, indexed by meter; missing meters read zero.
pub struct FixedSource(pub Vec<EnergyReading>);

impl EnergySource for FixedSource {
    fn reading(&mut self, meter: MeterId, _at: NaiveDateTime) -> EnergyReading {
        self.0.get(meter.index()).copied().unwrap_or_default()
    }
}

/// Constant grid readings.
pub struct SteadyGrid(pub GridState);

impl GridSource for SteadyGrid {
    fn reading(&mut self, _at: NaiveDateTime) -> GridState {
        self.0
    }
}

/// 2024-06-01 00:00.
pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// `ticks` one-minute ticks starting at [`start`].
pub fn params(participants: usize, ticks: i64) -> RunParams {
    RunParams::new(
        participants,
        start(),
        start() + TimeDelta::minutes(ticks),
        TimeDelta::minutes(1),
    )
    .expect("valid params")
}

/// Typical daytime grid; capacity per one-minute tick is far above any
/// meter surplus.
pub fn typical_grid() -> GridState {
    GridState {
        load: 0.4,
        temperature: 20.0,
        voltage: 240.0,
        intensity: 3.0,
    }
}

/// Grid whose capacity is exactly one unit per second.
pub fn unit_grid() -> GridState {
    GridState {
        load: 0.4,
        temperature: 20.0,
        voltage: 1.0,
        intensity: 1.0,
    }
}

/// Trader with no scoring models, so only the linear terms rank offers.
pub fn neutral_trader(selection: Selection) -> Trader {
    Trader::new(ScoringModel::neutral(DEFAULT_WEIGHTS), selection)
}

/// Engine over fixed readings and a constant grid.
pub fn fixed_engine(
    params: RunParams,
    readings: Vec<EnergyReading>,
    grid: GridState,
    selection: Selection,
) -> Engine<FixedSource, SteadyGrid> {
    Engine::new(params, FixedSource(readings), SteadyGrid(grid), neutral_trader(selection))
}

/// Baseline scenario shrunk to `meters` meters over `hours` hours of
/// ten-minute ticks starting at `start`.
pub fn small_scenario(meters: usize, start: &str, hours: i64, seed: Option<u64>) -> ScenarioConfig {
    let mut scenario = ScenarioConfig::baseline();
    scenario.simulation.meters = meters;
    scenario.simulation.start = start.to_string();
    scenario.simulation.window_hours = hours;
    scenario.simulation.tick_seconds = 600;
    scenario.simulation.seed = seed;
    scenario
}

/// Asserts the pairing invariants of one tick.
pub fn assert_well_formed(snapshot: &Snapshot, capacity: f64) {
    let tolerance = 1e-9;
    let total: f64 = snapshot.meters.iter().map(|m| m.transferred).sum();
    assert!(total.abs() < tolerance, "transfers not zero-sum at {}: {total}", snapshot.time);

    for m in &snapshot.meters {
        match m.counterparty {
            None => assert_eq!(m.transferred, 0.0, "meter {} moved energy alone", m.id),
            Some(other) => {
                let peer = &snapshot.meters[other.index()];
                assert_eq!(peer.counterparty, Some(m.id), "pairing of {} not mirrored", m.id);
                assert!((peer.transferred + m.transferred).abs() < tolerance);
                assert!(m.transferred.abs() <= capacity + tolerance);
                if m.transferred < 0.0 {
                    assert!(-m.transferred <= m.surplus + tolerance, "seller {} oversold", m.id);
                } else {
                    assert!(m.transferred <= -m.surplus + tolerance, "buyer {} overbought", m.id);
                }
            }
        }
    }
}
