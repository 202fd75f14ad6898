//! Point estimates from a weighted population.
//!
//! [`EstimationStrategy`] is the seam for custom estimators. [`ParticleAveragingStrategy`]
//! collects the built-in ones and is what [`FilterConfig`](crate::config::FilterConfig) selects
//! from.
use serde::{Deserialize, Serialize};

use crate::error::{FilterError, Result};
use crate::particle::Particle;
use crate::state::State;

/// Combines a population into one point estimate.
pub trait EstimationStrategy<S> {
    fn estimate(&self, particles: &[Particle<S>]) -> Result<S>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ParticleAveragingStrategy {
    /// Weighted mean in state space. Requires normalized weights, see [`weighted_average`].
    #[default]
    WeightedAverage,
    /// Arithmetic mean, ignoring weights.
    UnweightedAverage,
    /// State of the particle with the largest weight. Ties go to the first such particle.
    HighestWeight,
}

impl<S: State> EstimationStrategy<S> for ParticleAveragingStrategy {
    fn estimate(&self, particles: &[Particle<S>]) -> Result<S> {
        match self {
            ParticleAveragingStrategy::WeightedAverage => weighted_average(particles),
            ParticleAveragingStrategy::UnweightedAverage => unweighted_average(particles),
            ParticleAveragingStrategy::HighestWeight => highest_weight(particles),
        }
    }
}

/// Weighted mean of the particle states, built only from the [`State`] operations.
///
/// Each state is cloned, scaled by `N * w` (its weight relative to the uniform weight `1/N`)
/// and accumulated; the accumulator is then scaled by `1/N`.
///
/// # Precondition
///
/// The weights must already sum to one. The final division is by the particle count, not by
/// the weight sum, so unnormalized weights give a result scaled by their sum. Inside
/// [`ParticleFilter::update`](crate::ParticleFilter::update) normalization always runs
/// immediately before estimation.
pub fn weighted_average<S: State>(particles: &[Particle<S>]) -> Result<S> {
    if particles.is_empty() {
        return Err(FilterError::EmptyPopulation);
    }
    let n = particles.len() as f64;
    let mut result = S::zero();
    for particle in particles {
        let mut tmp = particle.state.clone();
        tmp.scale(particle.weight * n);
        tmp.accumulate_into(&mut result);
    }
    result.scale(1.0 / n);
    Ok(result)
}

/// Arithmetic mean of the particle states.
pub fn unweighted_average<S: State>(particles: &[Particle<S>]) -> Result<S> {
    if particles.is_empty() {
        return Err(FilterError::EmptyPopulation);
    }
    let mut result = S::zero();
    for particle in particles {
        particle.state.accumulate_into(&mut result);
    }
    result.scale(1.0 / particles.len() as f64);
    Ok(result)
}

/// Copy of the state of the highest-weight particle.
pub fn highest_weight<S: State>(particles: &[Particle<S>]) -> Result<S> {
    let mut best: Option<&Particle<S>> = None;
    for particle in particles {
        match best {
            Some(b) if particle.weight.total_cmp(&b.weight).is_le() => {}
            _ => best = Some(particle),
        }
    }
    best.map(|p| p.state.clone())
        .ok_or(FilterError::EmptyPopulation)
}
