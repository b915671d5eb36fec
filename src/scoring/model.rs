//! Linear predictors loaded from coefficient tables.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;

/// Failure to load or evaluate a linear model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("cannot read model coefficients: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed model coefficients: {0}")]
    Csv(#[from] csv::Error),
    #[error("model has no coefficients loaded")]
    Uninitialized,
    #[error("expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("coefficient table has no weight rows")]
    Empty,
}

/// A linear predictor: `weights · x + bias`.
///
/// Coefficient tables have a header row and rows shaped
/// `(model, kind, index, value)`, where `kind` is `weight` or `bias`.
/// Weights are taken in row order; a later `bias` row replaces an earlier
/// one. Rows whose value does not parse as a number are skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearModel {
    weights: Option<Vec<f64>>,
    bias: f64,
}

impl LinearModel {
    pub fn new(weights: Vec<f64>, bias: f64) -> Self {
        Self {
            weights: Some(weights),
            bias,
        }
    }

    /// A model with no coefficients; every prediction fails with
    /// [`ModelError::Uninitialized`].
    pub fn uninitialized() -> Self {
        Self::default()
    }

    /// Loads coefficients from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns a `ModelError` if the file cannot be read, is not valid CSV,
    /// or contains no weight rows.
    pub fn from_path(path: &Path) -> Result<Self, ModelError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Loads coefficients from any CSV source.
    ///
    /// # Errors
    ///
    /// Returns a `ModelError` on CSV syntax errors or when no weight rows
    /// were found.
    pub fn from_reader(reader: impl Read) -> Result<Self, ModelError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut weights = Vec::new();
        let mut bias = 0.0;
        for record in rdr.records() {
            let record = record?;
            let Some(value) = record.get(3).and_then(|v| v.parse::<f64>().ok()) else {
                continue;
            };
            match record.get(1) {
                Some("weight") => weights.push(value),
                Some("bias") => bias = value,
                _ => {}
            }
        }

        if weights.is_empty() {
            return Err(ModelError::Empty);
        }
        Ok(Self::new(weights, bias))
    }

    /// Whether coefficients are loaded.
    pub fn is_initialized(&self) -> bool {
        self.weights.is_some()
    }

    /// Number of input features, if loaded.
    pub fn dimension(&self) -> Option<usize> {
        self.weights.as_ref().map(Vec::len)
    }

    /// Evaluates the model on a feature vector.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Uninitialized`] if no coefficients are loaded
    /// and [`ModelError::DimensionMismatch`] if `features` has the wrong length.
    pub fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        let weights = self.weights.as_ref().ok_or(ModelError::Uninitialized)?;
        if weights.len() != features.len() {
            return Err(ModelError::DimensionMismatch {
                expected: weights.len(),
                actual: features.len(),
            });
        }
        let dot: f64 = weights.iter().zip(features).map(|(w, x)| w * x).sum();
        Ok(dot + self.bias)
    }
}
