pub mod consumption;
pub mod environment;
pub mod grid;
pub mod solar;
pub mod types;

pub use consumption::{ConsumptionTable, TableError};
pub use environment::{EnergyReading, EnergySource, EnvironmentGenerator, NoisePolicy};
pub use grid::{GridSource, GridState, GridTelemetry};
pub use solar::{SolarProfile, SunTimes};
pub use types::NoiseKind;
