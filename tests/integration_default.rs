//! Integration tests over the real generators and the baseline scenario.

mod common;

use chrono::TimeDelta;

use p2p_energy_sim::config::ScenarioConfig;
use p2p_energy_sim::simulate;
use p2p_energy_sim::sim::analytics::MarketAnalytics;
use p2p_energy_sim::sim::types::{MeterId, Snapshot};

fn run(scenario: &ScenarioConfig) -> Vec<Snapshot> {
    let params = scenario.run_params().expect("valid scenario");
    simulate(params, scenario).expect("engine builds").collect()
}

#[test]
fn midday_run_produces_one_snapshot_per_tick() {
    let scenario = common::small_scenario(8, "2024-06-01T10:00", 2, None);
    let snapshots = run(&scenario);
    assert_eq!(snapshots.len(), 12);
    assert_eq!(snapshots[0].time, "10:00:00");
    assert_eq!(snapshots[11].time, "11:50:00");
    for s in &snapshots {
        let ids: Vec<MeterId> = s.meters.iter().map(|m| m.id).collect();
        let expected: Vec<MeterId> = (0..8).map(MeterId::from_index).collect();
        assert_eq!(ids, expected);
        assert_eq!(s.grid.len(), 4);
    }
}

#[test]
fn every_tick_is_well_formed() {
    let scenario = common::small_scenario(15, "2024-06-01T06:00", 12, None);
    let tick = TimeDelta::seconds(scenario.simulation.tick_seconds);
    for s in run(&scenario) {
        common::assert_well_formed(&s, s.readings.transmission_capacity(tick));
    }
}

#[test]
fn participation_never_decreases() {
    let scenario = common::small_scenario(10, "2024-06-01T08:00", 6, None);
    let snapshots = run(&scenario);
    for pair in snapshots.windows(2) {
        for (before, after) in pair[0].meters.iter().zip(&pair[1].meters) {
            assert!(after.participation >= before.participation);
            assert!(after.participation - before.participation <= 1);
        }
    }
}

#[test]
fn sellers_earn_participation() {
    let scenario = common::small_scenario(10, "2024-06-01T10:00", 3, Some(3));
    let snapshots = run(&scenario);
    let last = snapshots.last().expect("non-empty run");
    let sales: usize = snapshots
        .iter()
        .flat_map(|s| &s.meters)
        .filter(|m| m.transferred < 0.0)
        .count();
    let participation: u32 = last.meters.iter().map(|m| m.participation).sum();
    assert_eq!(participation as usize, sales);
}

#[test]
fn seeded_runs_repeat() {
    let scenario = common::small_scenario(6, "2024-06-01T09:00", 2, Some(42));
    assert_eq!(run(&scenario), run(&scenario));
}

#[test]
fn unseeded_runs_differ() {
    let scenario = common::small_scenario(6, "2024-06-01T09:00", 2, None);
    let a = run(&scenario);
    let b = run(&scenario);
    assert_eq!(a.len(), b.len());
    let differs = a
        .iter()
        .zip(&b)
        .any(|(x, y)| x.meters.iter().zip(&y.meters).any(|(m, n)| m.surplus != n.surplus));
    assert!(differs, "two unseeded runs produced identical surpluses");
}

#[test]
fn analytics_stay_within_bounds() {
    let scenario = common::small_scenario(12, "2024-06-01T07:00", 10, None);
    let snapshots = run(&scenario);
    let analytics = MarketAnalytics::from_snapshots(&snapshots);
    let report = analytics.report();
    assert_eq!(report.total_ticks, snapshots.len() as u64);
    assert!(report.missed_ticks <= report.total_ticks);
    assert!(report.wasted_before >= 0.0);
    assert!(report.wasted_after >= 0.0);
    assert!(report.wasted_after <= report.wasted_before + 0.01);
    assert!((0.0..=1.0).contains(&analytics.saved_ratio()));
}

#[test]
fn presets_all_run() {
    for name in ScenarioConfig::PRESETS {
        let mut scenario = ScenarioConfig::from_preset(name).expect("known preset");
        assert!(scenario.validate().is_empty(), "preset {name} invalid");
        scenario.simulation.window_hours = 1;
        scenario.simulation.tick_seconds = 900;
        let snapshots = run(&scenario);
        assert_eq!(snapshots.len(), 4, "preset {name}");
        assert!(snapshots.iter().all(|s| s.meters.len() == scenario.simulation.meters));
    }
}

#[test]
fn missing_resources_degrade_instead_of_failing() {
    let mut scenario = common::small_scenario(5, "2024-06-01T11:00", 1, None);
    scenario.environment.consumption_path = "no/such/consumption.csv".into();
    scenario.scoring.efficiency_model_path = "no/such/efficiency.csv".into();
    scenario.scoring.duration_model_path = "no/such/duration.csv".into();
    let snapshots = run(&scenario);
    assert_eq!(snapshots.len(), 6);
    let tick = TimeDelta::seconds(scenario.simulation.tick_seconds);
    for s in &snapshots {
        common::assert_well_formed(s, s.readings.transmission_capacity(tick));
    }
}
