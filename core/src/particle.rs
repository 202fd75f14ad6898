//! Weighted particles and the population-level weight bookkeeping.
//!
//! A population is a plain `Vec<Particle<S>>` owned by the [`ParticleFilter`](crate::ParticleFilter).
//! The free functions in this module operate on slices so that they are usable both by the
//! engine and by custom strategies.
use crate::error::{FilterError, Result};
use crate::state::State;

use std::fmt::{self, Debug, Display};

/// One weighted hypothesis.
#[derive(Clone, Debug, PartialEq)]
pub struct Particle<S> {
    /// Importance weight, finite and non-negative.
    pub weight: f64,
    pub state: S,
}

impl<S: State> Particle<S> {
    pub fn new(state: S, weight: f64) -> Particle<S> {
        Particle { weight, state }
    }
    /// A particle holding the zero state with zero weight, as created by a freshly
    /// constructed filter.
    pub fn zero() -> Particle<S> {
        Particle {
            weight: 0.0,
            state: S::zero(),
        }
    }
}

impl<S: Debug> Display for Particle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Particle")
            .field("weight", &format_args!("{:.4e}", self.weight))
            .field("state", &self.state)
            .finish()
    }
}

/// Check that every weight is finite and non-negative.
pub fn validate_weights<S>(particles: &[Particle<S>]) -> Result<()> {
    match particles
        .iter()
        .enumerate()
        .find(|(_, p)| !p.weight.is_finite() || p.weight < 0.0)
    {
        Some((index, p)) => Err(FilterError::InvalidWeight {
            index,
            weight: p.weight,
        }),
        None => Ok(()),
    }
}

/// Sum of all particle weights.
pub fn weight_sum<S>(particles: &[Particle<S>]) -> f64 {
    particles.iter().map(|p| p.weight).sum()
}

/// Normalize the weights to sum to one and return the resulting effective sample size.
///
/// Fails with [`FilterError::Degenerate`] if the weight sum is zero or not finite and with
/// [`FilterError::InvalidWeight`] if an individual weight is negative or not finite. The
/// weights are left untouched on failure.
pub fn normalize_weights<S>(particles: &mut [Particle<S>]) -> Result<f64> {
    let sum = weight_sum(particles);
    if !sum.is_finite() || sum == 0.0 {
        return Err(FilterError::Degenerate { weight_sum: sum });
    }
    validate_weights(particles)?;
    let mut sum_of_squares = 0.0;
    for particle in particles.iter_mut() {
        particle.weight /= sum;
        sum_of_squares += particle.weight * particle.weight;
    }
    Ok(1.0 / sum_of_squares)
}

/// Effective sample size `1 / Σ wᵢ²` of the current weights.
///
/// Only meaningful for normalized weights, where it lies in `[1, N]`. Returns 0 when every
/// weight is zero.
pub fn effective_sample_size<S>(particles: &[Particle<S>]) -> f64 {
    let sum_of_squares: f64 = particles.iter().map(|p| p.weight * p.weight).sum();
    if sum_of_squares > 0.0 {
        1.0 / sum_of_squares
    } else {
        0.0
    }
}
