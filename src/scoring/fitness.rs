//! Offer scoring: efficiency and duration predictions combined with
//! participation history into a single fitness value.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use crate::config::{ConfigError, ScoringConfig};
use crate::generators::grid::GridState;
use crate::scoring::model::{LinearModel, ModelError};

/// Default fitness weights over
/// `[efficiency, duration, quality, participation, amount_needed, offered]`.
pub const DEFAULT_WEIGHTS: [f64; 6] = [1.0, -1.0, 1.0, -1.0, 1.0, -1.0];

/// Keeps the quality ratio finite when the predicted duration is zero.
const EPSILON: f64 = 1e-6;

/// Model outputs for one candidate transfer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Prediction {
    /// Fraction of energy surviving transmission.
    pub efficiency: f64,
    /// Predicted transaction duration.
    pub duration: f64,
}

/// Loaded efficiency-loss and duration models plus the fitness weights.
///
/// A sub-model that failed to load, or rejects its input, contributes 0.0
/// and is reported once through `tracing`.
#[derive(Debug)]
pub struct ScoringModel {
    efficiency: LinearModel,
    duration: LinearModel,
    weights: [f64; 6],
    efficiency_warned: AtomicBool,
    duration_warned: AtomicBool,
}

impl ScoringModel {
    /// Creates a scorer from already-loaded models.
    pub fn new(efficiency: LinearModel, duration: LinearModel, weights: [f64; 6]) -> Self {
        Self {
            efficiency,
            duration,
            weights,
            efficiency_warned: AtomicBool::new(false),
            duration_warned: AtomicBool::new(false),
        }
    }

    /// A scorer with both sub-models unavailable. Only the quantity terms
    /// and participation history contribute; nothing is logged.
    pub fn neutral(weights: [f64; 6]) -> Self {
        let model = Self::new(LinearModel::uninitialized(), LinearModel::uninitialized(), weights);
        model.efficiency_warned.store(true, Ordering::Relaxed);
        model.duration_warned.store(true, Ordering::Relaxed);
        model
    }

    /// Loads both coefficient tables. A table that fails to load is logged
    /// once and left uninitialized.
    ///
    /// # Arguments
    ///
    /// * `efficiency_path` - Grid-loss model over `[load, temperature]`
    /// * `duration_path` - Duration model over `[voltage, intensity, efficiency, amount]`
    /// * `weights` - Fitness weights
    pub fn load(efficiency_path: &Path, duration_path: &Path, weights: [f64; 6]) -> Self {
        let mut scorer = Self::new(
            LinearModel::uninitialized(),
            LinearModel::uninitialized(),
            weights,
        );
        match LinearModel::from_path(efficiency_path) {
            Ok(model) => scorer.efficiency = model,
            Err(e) => scorer.degrade(&scorer.efficiency_warned, "efficiency", efficiency_path, &e),
        }
        match LinearModel::from_path(duration_path) {
            Ok(model) => scorer.duration = model,
            Err(e) => scorer.degrade(&scorer.duration_warned, "duration", duration_path, &e),
        }
        scorer
    }

    /// Loads the scorer described by the `[scoring]` section.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the weight vector does not have six entries.
    pub fn from_config(cfg: &ScoringConfig) -> Result<Self, ConfigError> {
        let weights: [f64; 6] = cfg.weights.as_slice().try_into().map_err(|_| {
            ConfigError::new(
                "scoring.weights",
                format!("must have 6 entries, got {}", cfg.weights.len()),
            )
        })?;
        Ok(Self::load(
            &cfg.efficiency_model_path,
            &cfg.duration_model_path,
            weights,
        ))
    }

    pub fn weights(&self) -> &[f64; 6] {
        &self.weights
    }

    fn degrade(&self, flag: &AtomicBool, model: &str, path: &Path, err: &ModelError) {
        if !flag.swap(true, Ordering::Relaxed) {
            warn!(
                model,
                path = %path.display(),
                error = %err,
                "scoring model unavailable, its contribution degrades to zero"
            );
        }
    }

    fn degrade_predict(&self, flag: &AtomicBool, model: &str, err: &ModelError) {
        if !flag.swap(true, Ordering::Relaxed) {
            warn!(model, error = %err, "scoring model rejected input, contribution degrades to zero");
        }
    }

    /// Predicts transfer efficiency and duration under the current grid state.
    ///
    /// Efficiency is `(load - predicted_loss) / load`; it is 0.0 when the
    /// load is zero or the model is unavailable.
    pub fn predict(&self, grid: &GridState, amount: f64) -> Prediction {
        let efficiency = if grid.load == 0.0 {
            0.0
        } else {
            match self.efficiency.predict(&[grid.load, grid.temperature]) {
                Ok(loss) => finite_or_zero((grid.load - loss) / grid.load),
                Err(e) => {
                    self.degrade_predict(&self.efficiency_warned, "efficiency", &e);
                    0.0
                }
            }
        };

        let features = [grid.voltage, grid.intensity, efficiency, amount];
        let duration = match self.duration.predict(&features) {
            Ok(d) => finite_or_zero(d),
            Err(e) => {
                self.degrade_predict(&self.duration_warned, "duration", &e);
                0.0
            }
        };

        Prediction {
            efficiency,
            duration,
        }
    }

    /// Scores one offer for one requester. Higher is better; only the
    /// relative order of scores is meaningful.
    ///
    /// # Arguments
    ///
    /// * `amount_needed` - Requester's surplus, negative for a deficit
    /// * `offered` - Seller's surplus
    /// * `participation` - Seller's count of past winning sales
    /// * `grid` - Grid readings for the tick
    pub fn fitness(&self, amount_needed: f64, offered: f64, participation: u32, grid: &GridState) -> f64 {
        let Prediction {
            efficiency,
            duration,
        } = self.predict(grid, offered);
        let quality = finite_or_zero((offered - amount_needed) / (duration + EPSILON));

        let params = [
            efficiency,
            duration,
            quality,
            f64::from(participation),
            amount_needed,
            offered,
        ];
        self.weights.iter().zip(params).map(|(w, p)| w * p).sum()
    }
}

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() { x } else { 0.0 }
}
