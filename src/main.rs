//! Simulator entry point: CLI wiring and config-driven run construction.

use std::process;

use tracing::{error, info};

use p2p_energy_sim::cli::{self, CliOptions};
use p2p_energy_sim::config::{ConfigError, ScenarioConfig};
use p2p_energy_sim::io::export::export_csv;
use p2p_energy_sim::sim::analytics::MarketAnalytics;
use p2p_energy_sim::sim::handoff::SnapshotFeed;
use p2p_energy_sim::simulate;
use p2p_energy_sim::telemetry::init_tracing;

/// Resolves the scenario from file, preset, or baseline, then applies
/// environment and command-line overrides and validates the result.
fn load_scenario(opts: &CliOptions) -> Result<ScenarioConfig, Vec<ConfigError>> {
    let mut scenario = if let Some(path) = &opts.scenario {
        ScenarioConfig::from_toml_file(path).map_err(|e| vec![e])?
    } else if let Some(name) = &opts.preset {
        ScenarioConfig::from_preset(name).map_err(|e| vec![e])?
    } else {
        ScenarioConfig::baseline()
    };

    scenario
        .apply_overrides(|key| std::env::var(key).ok())
        .map_err(|e| vec![e])?;

    if let Some(meters) = opts.meters {
        scenario.simulation.meters = meters;
    }
    if let Some(start) = &opts.start {
        scenario.simulation.start = start.clone();
    }
    if let Some(seed) = opts.seed {
        scenario.simulation.seed = Some(seed);
    }
    #[cfg(feature = "api")]
    if let Some(port) = opts.port {
        scenario.stream.port = port;
    }

    let errors = scenario.validate();
    if errors.is_empty() {
        Ok(scenario)
    } else {
        Err(errors)
    }
}

#[cfg(feature = "api")]
fn serve(scenario: ScenarioConfig) {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use p2p_energy_sim::api::{self, AppState};

    let addr = SocketAddr::from(([0, 0, 0, 0], scenario.stream.port));
    let state = Arc::new(AppState { scenario });
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(api::serve(state, addr)) {
        error!(%addr, error = %e, "API server failed");
        process::exit(1);
    }
}

fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let opts = match cli::parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!();
            cli::print_usage();
            process::exit(2);
        }
    };
    if opts.help {
        cli::print_usage();
        return;
    }

    let scenario = match load_scenario(&opts) {
        Ok(s) => s,
        Err(errors) => {
            for e in &errors {
                eprintln!("{e}");
            }
            process::exit(1);
        }
    };

    #[cfg(feature = "api")]
    if opts.serve {
        serve(scenario);
        return;
    }

    let run = scenario
        .run_params()
        .and_then(|params| simulate(params, &scenario));
    let engine = match run {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    let mut snapshots = Vec::with_capacity(engine.params().tick_count());
    for snapshot in SnapshotFeed::spawn(engine) {
        if !opts.quiet {
            println!("{snapshot}");
        }
        snapshots.push(snapshot);
    }

    println!();
    println!("{}", MarketAnalytics::from_snapshots(&snapshots).report());

    if let Some(path) = &opts.telemetry_out {
        match export_csv(&snapshots, path) {
            Ok(()) => info!(path = %path.display(), rows = snapshots.len(), "telemetry exported"),
            Err(e) => {
                eprintln!("error: failed to write telemetry CSV to {}: {e}", path.display());
                process::exit(1);
            }
        }
    }
}
