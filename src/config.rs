//! TOML-based scenario configuration and preset definitions.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, TimeDelta};
use serde::Deserialize;
use thiserror::Error;

use crate::generators::types::NoiseKind;
use crate::scoring::DEFAULT_WEIGHTS;
use crate::sim::trader::Selection;
use crate::sim::types::RunParams;

/// Accepted formats for run start times.
const START_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Run size, window, and seed.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Site and signal-noise parameters.
    #[serde(default)]
    pub environment: EnvironmentConfig,
    /// Grid telemetry distributions.
    #[serde(default)]
    pub grid: GridConfig,
    /// Model tables and fitness weights.
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Offer selection policy.
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Streaming transport settings.
    #[serde(default)]
    pub stream: StreamConfig,
}

/// Run size, window, and seed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of meters (must be > 0).
    pub meters: usize,
    /// First tick, `YYYY-MM-DDTHH:MM`.
    pub start: String,
    /// Window length in hours (must be >= 0).
    pub window_hours: i64,
    /// Tick length in seconds (must be > 0).
    pub tick_seconds: i64,
    /// Master random seed; fresh entropy every run when absent.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            meters: 10,
            start: "2024-06-01T00:00".to_string(),
            window_hours: 24,
            tick_seconds: 60,
            seed: None,
        }
    }
}

/// Site and signal-noise parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
    /// Site latitude (degrees, north positive).
    pub latitude: f64,
    /// Site longitude (degrees, east positive).
    pub longitude: f64,
    /// Local simulation time minus UTC (hours).
    pub utc_offset_hours: i32,
    /// PV peak output per meter (kW).
    pub installed_capacity_kw: f64,
    /// Historical consumption table (time of day, value).
    pub consumption_path: PathBuf,
    /// Noise distribution: `"uniform"` or `"gaussian"`.
    pub noise: NoiseKind,
    /// Noise half-width (uniform) or standard deviation (gaussian).
    pub deviation: f64,
    /// Clamp noisy generation at `floor`.
    pub clamp_generation: bool,
    /// Clamp noisy consumption at `floor`.
    pub clamp_consumption: bool,
    /// Lower bound applied by the clamp flags.
    pub floor: f64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            latitude: 32.2,
            longitude: 30.0,
            utc_offset_hours: 0,
            installed_capacity_kw: 5.0,
            consumption_path: PathBuf::from("data/consumption.csv"),
            noise: NoiseKind::Uniform,
            deviation: 0.5,
            clamp_generation: true,
            clamp_consumption: true,
            floor: 0.0,
        }
    }
}

/// Mean and standard deviation of one telemetry channel.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    pub mean: f64,
    pub std_dev: f64,
}

impl ChannelConfig {
    pub const fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }

    /// A channel that always reads `mean`.
    pub const fn fixed(mean: f64) -> Self {
        Self::new(mean, 0.0)
    }
}

/// Grid telemetry distributions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    /// Grid load (GWh).
    pub load: ChannelConfig,
    /// Grid temperature (°C).
    pub temperature: ChannelConfig,
    /// Voltage (V).
    pub voltage: ChannelConfig,
    /// Global current intensity (A).
    pub intensity: ChannelConfig,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            load: ChannelConfig::new(0.4, 0.1),
            temperature: ChannelConfig::new(20.0, 1.0),
            voltage: ChannelConfig::new(239.696, 1.0),
            intensity: ChannelConfig::new(3.132, 0.1),
        }
    }
}

/// Model tables and fitness weights.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    /// Grid-loss model over `[load, temperature]`.
    pub efficiency_model_path: PathBuf,
    /// Duration model over `[voltage, intensity, efficiency, amount]`.
    pub duration_model_path: PathBuf,
    /// Fitness weights (exactly 6).
    pub weights: Vec<f64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            efficiency_model_path: PathBuf::from("models/grid-loss-weights.csv"),
            duration_model_path: PathBuf::from("models/duration-weights.csv"),
            weights: DEFAULT_WEIGHTS.to_vec(),
        }
    }
}

/// Offer selection policy names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingPolicy {
    Best,
    TopK,
    #[default]
    AllButOne,
}

/// Offer selection policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchingConfig {
    /// `"best"`, `"top_k"`, or `"all_but_one"`.
    pub policy: MatchingPolicy,
    /// Offers per requester under `top_k` (must be > 0).
    pub k: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            policy: MatchingPolicy::AllButOne,
            k: 3,
        }
    }
}

impl MatchingConfig {
    /// Resolves the configured policy.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for `top_k` with `k == 0`.
    pub fn selection(&self) -> Result<Selection, ConfigError> {
        match self.policy {
            MatchingPolicy::Best => Ok(Selection::Best),
            MatchingPolicy::AllButOne => Ok(Selection::AllButOne),
            MatchingPolicy::TopK if self.k == 0 => {
                Err(ConfigError::new("matching.k", "must be > 0 for policy \"top_k\""))
            }
            MatchingPolicy::TopK => Ok(Selection::TopK(self.k)),
        }
    }
}

/// Streaming transport settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamConfig {
    /// Pause after each streamed tick (ms).
    pub step_delay_ms: u64,
    /// Meter count at or above which meter lists are compressed; 0 = always.
    pub compress_threshold: usize,
    /// Listen port.
    pub port: u16,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: 100,
            compress_threshold: 20,
            port: 5515,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.meters"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Parses a run start time (`YYYY-MM-DDTHH:MM`, seconds optional).
///
/// # Errors
///
/// Returns a `ConfigError` on field `start` if no format matches.
pub fn parse_start(s: &str) -> Result<NaiveDateTime, ConfigError> {
    START_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s.trim(), fmt).ok())
        .ok_or_else(|| ConfigError::new("start", format!("expected YYYY-MM-DDTHH:MM, got \"{s}\"")))
}

impl ScenarioConfig {
    /// Returns the baseline scenario: ten meters over one summer day.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Returns the evening-peak preset: the sunset hours, when few meters
    /// still have surplus and most are buying.
    pub fn evening_peak() -> Self {
        Self {
            simulation: SimulationConfig {
                meters: 25,
                start: "2024-06-01T16:00".to_string(),
                window_hours: 6,
                ..SimulationConfig::default()
            },
            matching: MatchingConfig {
                policy: MatchingPolicy::TopK,
                k: 3,
            },
            ..Self::default()
        }
    }

    /// Returns the winter-noise preset: a short winter day with Gaussian
    /// noise and unclamped consumption.
    pub fn winter_noise() -> Self {
        Self {
            simulation: SimulationConfig {
                start: "2024-12-21T00:00".to_string(),
                ..SimulationConfig::default()
            },
            environment: EnvironmentConfig {
                noise: NoiseKind::Gaussian,
                deviation: 0.8,
                clamp_consumption: false,
                ..EnvironmentConfig::default()
            },
            matching: MatchingConfig {
                policy: MatchingPolicy::Best,
                ..MatchingConfig::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "evening_peak", "winter_noise"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "evening_peak" => Ok(Self::evening_peak()),
            "winter_noise" => Ok(Self::winter_noise()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Applies `PORT` and `SIMULATION_STEP_DELAY_MS` overrides.
    ///
    /// # Arguments
    ///
    /// * `var` - Variable lookup, normally `std::env::var(..).ok()`
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a set variable does not parse.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(port) = var("PORT") {
            self.stream.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::new("PORT", format!("invalid port \"{port}\"")))?;
        }
        if let Some(delay) = var("SIMULATION_STEP_DELAY_MS") {
            self.stream.step_delay_ms = delay.trim().parse().map_err(|_| {
                ConfigError::new(
                    "SIMULATION_STEP_DELAY_MS",
                    format!("invalid delay \"{delay}\""),
                )
            })?;
        }
        Ok(())
    }

    /// Tick length as a duration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the tick length is out of range.
    pub fn tick(&self) -> Result<TimeDelta, ConfigError> {
        TimeDelta::try_seconds(self.simulation.tick_seconds)
            .ok_or_else(|| ConfigError::new("simulation.tick_seconds", "out of range"))
    }

    /// Window length as a duration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the window length is out of range.
    pub fn window(&self) -> Result<TimeDelta, ConfigError> {
        TimeDelta::try_hours(self.simulation.window_hours)
            .ok_or_else(|| ConfigError::new("simulation.window_hours", "out of range"))
    }

    /// Builds validated run parameters from `[simulation]`.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found.
    pub fn run_params(&self) -> Result<RunParams, ConfigError> {
        let s = &self.simulation;
        if s.window_hours < 0 {
            return Err(ConfigError::new("simulation.window_hours", "must be >= 0"));
        }
        let participants = i64::try_from(s.meters).unwrap_or(i64::MAX);
        RunParams::from_request(participants, &s.start, self.window()?, self.tick()?).map_err(|e| {
            let field = match e.field.as_str() {
                "participants" => "simulation.meters",
                "start" => "simulation.start",
                "increment" => "simulation.tick_seconds",
                _ => "simulation.window_hours",
            };
            ConfigError::new(field, e.message)
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let s = &self.simulation;

        if s.meters == 0 {
            errors.push(ConfigError::new("simulation.meters", "must be > 0"));
        }
        if parse_start(&s.start).is_err() {
            errors.push(ConfigError::new(
                "simulation.start",
                format!("expected YYYY-MM-DDTHH:MM, got \"{}\"", s.start),
            ));
        }
        if s.window_hours < 0 {
            errors.push(ConfigError::new("simulation.window_hours", "must be >= 0"));
        }
        if s.tick_seconds <= 0 {
            errors.push(ConfigError::new("simulation.tick_seconds", "must be > 0"));
        }

        let env = &self.environment;
        if !(-90.0..=90.0).contains(&env.latitude) {
            errors.push(ConfigError::new("environment.latitude", "must be in [-90, 90]"));
        }
        if env.deviation < 0.0 {
            errors.push(ConfigError::new("environment.deviation", "must be >= 0"));
        }
        if env.installed_capacity_kw < 0.0 {
            errors.push(ConfigError::new(
                "environment.installed_capacity_kw",
                "must be >= 0",
            ));
        }

        let g = &self.grid;
        for (name, channel) in [
            ("load", g.load),
            ("temperature", g.temperature),
            ("voltage", g.voltage),
            ("intensity", g.intensity),
        ] {
            if channel.std_dev < 0.0 || !channel.std_dev.is_finite() {
                errors.push(ConfigError::new(
                    format!("grid.{name}.std_dev"),
                    "must be finite and >= 0",
                ));
            }
        }

        if self.scoring.weights.len() != DEFAULT_WEIGHTS.len() {
            errors.push(ConfigError::new(
                "scoring.weights",
                format!(
                    "must have {} entries, got {}",
                    DEFAULT_WEIGHTS.len(),
                    self.scoring.weights.len()
                ),
            ));
        }

        if let Err(e) = self.matching.selection() {
            errors.push(e);
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_preset_valid() {
        let cfg = ScenarioConfig::baseline();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "baseline should be valid: {errors:?}");
    }

    #[test]
    fn from_preset_unknown() {
        let err = ScenarioConfig::from_preset("nonexistent").unwrap_err();
        assert!(err.message.contains("unknown preset"));
    }

    #[test]
    fn all_presets_are_valid() {
        for name in ScenarioConfig::PRESETS {
            let cfg = ScenarioConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(
                errors.is_empty(),
                "preset \"{name}\" should be valid: {errors:?}"
            );
        }
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[simulation]
meters = 4
start = "2024-03-01T06:00"
window_hours = 2
tick_seconds = 300
seed = 7

[environment]
noise = "gaussian"
deviation = 0.2
clamp_consumption = false

[grid]
voltage = { mean = 230.0, std_dev = 0.5 }

[scoring]
weights = [1.0, -1.0, 1.0, -1.0, 1.0, -1.0]

[matching]
policy = "top_k"
k = 2

[stream]
step_delay_ms = 0
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).expect("valid TOML should parse");
        assert_eq!(cfg.simulation.meters, 4);
        assert_eq!(cfg.simulation.seed, Some(7));
        assert_eq!(cfg.environment.noise, NoiseKind::Gaussian);
        assert!(!cfg.environment.clamp_consumption);
        assert_eq!(cfg.grid.voltage, ChannelConfig::new(230.0, 0.5));
        assert_eq!(cfg.grid.load, GridConfig::default().load);
        assert_eq!(cfg.matching.selection(), Ok(Selection::TopK(2)));
        assert_eq!(cfg.stream.step_delay_ms, 0);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[simulation]
meters = 3
bogus_field = true
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let toml = r#"
[matching]
policy = "random"
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let cfg = ScenarioConfig::from_toml_str("[simulation]\nseed = 99\n").expect("parses");
        assert_eq!(cfg.simulation.seed, Some(99));
        assert_eq!(cfg.simulation.meters, 10);
        assert_eq!(cfg.environment.installed_capacity_kw, 5.0);
        assert_eq!(cfg.matching.policy, MatchingPolicy::AllButOne);
    }

    #[test]
    fn validation_catches_bad_simulation_fields() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.simulation.meters = 0;
        cfg.simulation.start = "yesterday".to_string();
        cfg.simulation.tick_seconds = 0;
        cfg.simulation.window_hours = -1;
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        for f in [
            "simulation.meters",
            "simulation.start",
            "simulation.tick_seconds",
            "simulation.window_hours",
        ] {
            assert!(fields.iter().any(|x| x == f), "missing {f} in {fields:?}");
        }
    }

    #[test]
    fn validation_catches_bad_model_and_matching() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.scoring.weights = vec![1.0];
        cfg.matching = MatchingConfig {
            policy: MatchingPolicy::TopK,
            k: 0,
        };
        cfg.environment.deviation = -0.1;
        cfg.grid.voltage.std_dev = -1.0;
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"scoring.weights".to_string()));
        assert!(fields.contains(&"matching.k".to_string()));
        assert!(fields.contains(&"environment.deviation".to_string()));
        assert!(fields.contains(&"grid.voltage.std_dev".to_string()));
    }

    #[test]
    fn run_params_from_defaults() {
        let params = ScenarioConfig::baseline().run_params().expect("valid defaults");
        assert_eq!(params.participants, 10);
        assert_eq!(params.tick_count(), 24 * 60);
    }

    #[test]
    fn run_params_report_config_paths() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.simulation.tick_seconds = -5;
        assert_eq!(cfg.run_params().unwrap_err().field, "simulation.tick_seconds");

        let mut cfg = ScenarioConfig::baseline();
        cfg.simulation.meters = 0;
        assert_eq!(cfg.run_params().unwrap_err().field, "simulation.meters");
    }

    #[test]
    fn parse_start_accepts_both_precisions() {
        assert!(parse_start("2024-06-01T00:00").is_ok());
        assert!(parse_start("2024-06-01T00:00:30").is_ok());
        assert_eq!(parse_start("2024-06-01").unwrap_err().field, "start");
    }

    #[test]
    fn environment_overrides_apply() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.apply_overrides(|k| match k {
            "PORT" => Some("8080".to_string()),
            "SIMULATION_STEP_DELAY_MS" => Some("5".to_string()),
            _ => None,
        })
        .expect("valid overrides");
        assert_eq!(cfg.stream.port, 8080);
        assert_eq!(cfg.stream.step_delay_ms, 5);
    }

    #[test]
    fn bad_override_is_reported() {
        let mut cfg = ScenarioConfig::baseline();
        let err = cfg
            .apply_overrides(|k| (k == "PORT").then(|| "not-a-port".to_string()))
            .unwrap_err();
        assert_eq!(err.field, "PORT");
        assert_eq!(cfg.stream.port, 5515);
    }
}
