//! Command-line argument parsing.

use std::env;
use std::path::PathBuf;

/// Parsed command-line options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOptions {
    pub scenario: Option<PathBuf>,
    pub preset: Option<String>,
    pub meters: Option<usize>,
    pub start: Option<String>,
    pub seed: Option<u64>,
    pub telemetry_out: Option<PathBuf>,
    /// Suppress per-tick lines.
    pub quiet: bool,
    pub help: bool,
    #[cfg(feature = "api")]
    pub serve: bool,
    #[cfg(feature = "api")]
    pub port: Option<u16>,
}

pub fn parse_args() -> Result<CliOptions, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(&args)
}

/// Parses arguments (without the program name).
///
/// # Errors
///
/// Returns a message naming the offending argument.
pub fn parse_args_from(args: &[String]) -> Result<CliOptions, String> {
    let mut opts = CliOptions::default();
    let mut i = 0usize;

    while i < args.len() {
        match args[i].as_str() {
            "--scenario" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --scenario (expected a TOML file path)")?;
                if opts.scenario.replace(PathBuf::from(path)).is_some() {
                    return Err("--scenario provided more than once".to_string());
                }
            }
            "--preset" => {
                i += 1;
                let name = args.next_or_err(i, "missing value for --preset (expected a preset name)")?;
                if opts.preset.replace(name.to_string()).is_some() {
                    return Err("--preset provided more than once".to_string());
                }
            }
            "--meters" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --meters (expected a count)")?;
                let n = raw
                    .parse::<usize>()
                    .map_err(|_| format!("--meters value \"{raw}\" is not a valid count"))?;
                opts.meters = Some(n);
            }
            "--start" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --start (expected YYYY-MM-DDTHH:MM)")?;
                opts.start = Some(raw.to_string());
            }
            "--seed" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --seed (expected a u64)")?;
                let seed = raw
                    .parse::<u64>()
                    .map_err(|_| format!("--seed value \"{raw}\" is not a valid u64"))?;
                opts.seed = Some(seed);
            }
            "--telemetry-out" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --telemetry-out (expected a file path)")?;
                if opts.telemetry_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--telemetry-out provided more than once".to_string());
                }
            }
            "--quiet" | "-q" => opts.quiet = true,
            #[cfg(feature = "api")]
            "--serve" => opts.serve = true,
            #[cfg(feature = "api")]
            "--port" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --port (expected a u16)")?;
                let port = raw
                    .parse::<u16>()
                    .map_err(|_| format!("--port value \"{raw}\" is not a valid u16"))?;
                opts.port = Some(port);
            }
            "--help" | "-h" => opts.help = true,
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if opts.scenario.is_some() && opts.preset.is_some() {
        return Err(
            "arguments `--scenario` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }

    Ok(opts)
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("p2p-energy-sim: peer-to-peer energy micro-market simulator");
    eprintln!();
    eprintln!("Usage: p2p-energy-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from TOML config file");
    eprintln!("  --preset <name>          Use a built-in preset (baseline, evening_peak, winter_noise)");
    eprintln!("  --meters <n>             Override participant count");
    eprintln!("  --start <datetime>       Override start time (YYYY-MM-DDTHH:MM)");
    eprintln!("  --seed <u64>             Reproducible run with this seed");
    eprintln!("  --telemetry-out <path>   Export per-meter ticks to CSV");
    eprintln!("  --quiet, -q              Only print the market report");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                  Start the streaming API instead of a local run");
        eprintln!("  --port <u16>             API server port (default: 5515, env PORT)");
    }
    eprintln!("  --help                   Show this help message");
}
