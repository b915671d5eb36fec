//! Peer-to-peer energy micro-market simulator.
//!
//! A population of meters generates and consumes energy tick by tick;
//! meters in deficit buy surplus from their neighbours, ranked by a
//! predictive grid model and capped by transmission capacity.

#[cfg(feature = "api")]
pub mod api;
pub mod cli;
pub mod config;
/// Environment and grid signal generators.
pub mod generators;
pub mod io;
/// Linear predictors and the offer fitness function.
pub mod scoring;
/// Simulation engine, matching, analytics, and hand-off modules.
pub mod sim;
pub mod telemetry;

pub use sim::engine::simulate;
