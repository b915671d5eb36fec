pub mod analytics;
/// Simulation clock for tick management.
pub mod clock;
pub mod engine;
/// Background producer and blocking hand-off to a consumer.
pub mod handoff;
/// Offer scoring and trade execution.
pub mod trader;
pub mod types;
