//! Shared noise and seeding helpers for the signal generators.

use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Shape of the random perturbation applied to generated signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseKind {
    /// Uniform draw from `[-deviation, deviation]`.
    #[default]
    Uniform,
    /// Normal draw with mean 0 and standard deviation `deviation`.
    Gaussian,
}

/// Draws one noise sample of the given kind and magnitude.
///
/// # Arguments
///
/// * `rng` - Random number generator
/// * `kind` - Noise distribution
/// * `deviation` - Half-width (uniform) or standard deviation (gaussian)
///
/// # Returns
///
/// A zero-mean sample, or exactly 0.0 when `deviation` is not positive.
pub fn sample_noise(rng: &mut StdRng, kind: NoiseKind, deviation: f64) -> f64 {
    if !deviation.is_finite() || deviation <= 0.0 {
        return 0.0;
    }

    match kind {
        NoiseKind::Uniform => rng.random_range(-deviation..=deviation),
        NoiseKind::Gaussian => Normal::new(0.0, deviation).map_or(0.0, |n| n.sample(rng)),
    }
}

/// Builds a generator RNG from an optional master seed.
///
/// Seeded runs derive one independent stream per generator by offsetting the
/// master seed; unseeded runs draw fresh entropy from the OS.
pub fn seeded_rng(seed: Option<u64>, offset: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(offset)),
        None => StdRng::from_os_rng(),
    }
}
