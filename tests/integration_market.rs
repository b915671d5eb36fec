//! Integration tests for matching, analytics, and run hand-off with fixed
//! readings.

mod common;

use chrono::TimeDelta;

use p2p_energy_sim::config::{MatchingPolicy, ScenarioConfig};
use p2p_energy_sim::generators::EnergyReading;
use p2p_energy_sim::sim::analytics::MarketAnalytics;
use p2p_energy_sim::sim::handoff::{CancelToken, RunOutcome, SnapshotFeed, drive};
use p2p_energy_sim::sim::trader::Selection;
use p2p_energy_sim::sim::types::{MeterId, RunParams, Snapshot};
use p2p_energy_sim::simulate;

#[test]
fn surplus_covers_deficit_exactly() {
    let readings = vec![EnergyReading::new(5.0, 0.0), EnergyReading::new(0.0, 3.0)];
    let engine = common::fixed_engine(
        common::params(2, 1),
        readings,
        common::typical_grid(),
        Selection::AllButOne,
    );
    let snapshots: Vec<Snapshot> = engine.collect();
    assert_eq!(snapshots.len(), 1);

    let meters = &snapshots[0].meters;
    assert_eq!(meters[0].transferred, -3.0);
    assert_eq!(meters[1].transferred, 3.0);
    assert_eq!(meters[0].counterparty, Some(MeterId(2)));
    assert_eq!(meters[1].counterparty, Some(MeterId(1)));
    assert_eq!(meters[0].participation, 1);
    assert_eq!(meters[0].leftover(), 2.0);
    assert_eq!(meters[1].leftover(), 0.0);

    let report = MarketAnalytics::from_snapshots(&snapshots).report();
    assert_eq!(report.wasted_before, 5.0);
    assert_eq!(report.wasted_after, 2.0);
    assert_eq!(report.saved_ratio, 0.6);
    assert_eq!(report.missed_ticks, 0);
}

#[test]
fn transmission_capacity_clamps_transfer() {
    let readings = vec![EnergyReading::new(5.0, 0.0), EnergyReading::new(0.0, 3.0)];
    let params = RunParams::new(
        2,
        common::start(),
        common::start() + TimeDelta::seconds(1),
        TimeDelta::seconds(1),
    )
    .expect("valid params");
    let engine = common::fixed_engine(params, readings, common::unit_grid(), Selection::Best);
    let snapshots: Vec<Snapshot> = engine.collect();

    let meters = &snapshots[0].meters;
    assert_eq!(meters[1].transferred, 1.0);
    assert_eq!(meters[0].transferred, -1.0);

    let report = MarketAnalytics::from_snapshots(&snapshots).report();
    assert_eq!(report.wasted_before, 5.0);
    assert_eq!(report.wasted_after, 4.0);
    assert_eq!(report.saved_ratio, 0.2);
}

#[test]
fn one_buyer_is_served_once() {
    let readings = vec![
        EnergyReading::new(4.0, 0.0),
        EnergyReading::new(4.0, 0.0),
        EnergyReading::new(0.0, 6.0),
    ];
    for selection in [Selection::Best, Selection::TopK(2), Selection::AllButOne] {
        let engine = common::fixed_engine(
            common::params(3, 1),
            readings.clone(),
            common::typical_grid(),
            selection,
        );
        let snapshots: Vec<Snapshot> = engine.collect();
        let meters = &snapshots[0].meters;
        assert_eq!(meters[2].transferred, 4.0, "{selection:?}");
        let sellers = meters.iter().filter(|m| m.transferred < 0.0).count();
        assert_eq!(sellers, 1, "{selection:?}");
        common::assert_well_formed(&snapshots[0], f64::INFINITY);
    }
}

#[test]
fn no_offers_means_no_trades() {
    let readings = vec![EnergyReading::new(0.0, 1.0); 4];
    let engine = common::fixed_engine(
        common::params(4, 3),
        readings,
        common::typical_grid(),
        Selection::AllButOne,
    );
    for s in engine {
        assert_eq!(s.trade_count(), 0);
        assert!(s.meters.iter().all(|m| m.counterparty.is_none()));
    }
}

#[test]
fn zero_surplus_meters_stay_out_of_the_market() {
    let readings = vec![
        EnergyReading::new(2.0, 2.0),
        EnergyReading::new(3.0, 0.0),
        EnergyReading::new(0.0, 1.0),
    ];
    let engine = common::fixed_engine(
        common::params(3, 1),
        readings,
        common::typical_grid(),
        Selection::AllButOne,
    );
    let snapshots: Vec<Snapshot> = engine.collect();
    let meters = &snapshots[0].meters;
    assert_eq!(meters[0].counterparty, None);
    assert_eq!(meters[0].transferred, 0.0);
    assert_eq!(meters[1].counterparty, Some(MeterId(3)));
}

#[test]
fn zero_length_window_emits_nothing() {
    let scenario = ScenarioConfig::baseline();
    let params = RunParams::from_request(4, "2024-06-01T00:00", TimeDelta::zero(), TimeDelta::minutes(1))
        .expect("valid params");
    let snapshots: Vec<Snapshot> = simulate(params, &scenario).expect("engine builds").collect();
    assert!(snapshots.is_empty());
}

#[test]
fn invalid_run_parameters_fail_before_any_tick() {
    let window = TimeDelta::hours(1);
    let tick = TimeDelta::minutes(1);

    let err = RunParams::from_request(0, "2024-06-01T00:00", window, tick).unwrap_err();
    assert_eq!(err.field, "participants");
    let err = RunParams::from_request(-3, "2024-06-01T00:00", window, tick).unwrap_err();
    assert_eq!(err.field, "participants");
    let err = RunParams::from_request(3, "June first", window, tick).unwrap_err();
    assert_eq!(err.field, "start");
    let err = RunParams::from_request(3, "2024-06-01T00:00", window, TimeDelta::zero()).unwrap_err();
    assert_eq!(err.field, "increment");
    let err = RunParams::from_request(3, "2024-06-01T00:00", window, TimeDelta::minutes(-5)).unwrap_err();
    assert_eq!(err.field, "increment");
}

#[test]
fn invalid_matching_config_fails_before_any_tick() {
    let mut scenario = ScenarioConfig::baseline();
    scenario.matching.policy = MatchingPolicy::TopK;
    scenario.matching.k = 0;
    let params = common::params(3, 10);
    let err = simulate(params, &scenario).err().expect("k = 0 is rejected");
    assert_eq!(err.field, "matching.k");
}

#[test]
fn driving_into_a_vec_completes() {
    let engine = common::fixed_engine(
        common::params(3, 7),
        vec![EnergyReading::new(2.0, 0.0), EnergyReading::new(0.0, 1.0)],
        common::typical_grid(),
        Selection::AllButOne,
    );
    let mut sink: Vec<Snapshot> = Vec::new();
    let outcome = drive(engine, &mut sink, &CancelToken::new());
    assert_eq!(outcome, RunOutcome::Completed { ticks: 7 });
    assert_eq!(sink.len(), 7);
}

#[test]
fn background_feed_delivers_in_order() {
    let engine = common::fixed_engine(
        common::params(2, 30),
        vec![EnergyReading::new(2.0, 0.0), EnergyReading::new(0.0, 1.0)],
        common::typical_grid(),
        Selection::AllButOne,
    );
    let snapshots: Vec<Snapshot> = SnapshotFeed::spawn(engine).collect();
    assert_eq!(snapshots.len(), 30);
    assert!(snapshots.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    assert_eq!(snapshots[29].meters[0].participation, 30);
}

#[test]
fn abandoning_a_feed_stops_the_producer() {
    let total = 10_000;
    let engine = common::fixed_engine(
        common::params(4, total),
        vec![EnergyReading::new(3.0, 0.0), EnergyReading::new(0.0, 2.0)],
        common::typical_grid(),
        Selection::AllButOne,
    );
    let mut feed = SnapshotFeed::spawn(engine);
    let taken: Vec<Snapshot> = feed.by_ref().take(3).collect();
    assert_eq!(taken.len(), 3);

    let outcome = feed.join().expect("producer did not panic");
    assert!(!matches!(outcome, RunOutcome::Completed { .. }));
    assert!(outcome.ticks() < 10, "producer ran on for {} ticks", outcome.ticks());
}
