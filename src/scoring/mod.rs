pub mod fitness;
pub mod model;

pub use fitness::{DEFAULT_WEIGHTS, Prediction, ScoringModel};
pub use model::{LinearModel, ModelError};
