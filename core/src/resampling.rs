//! Resampling: replacing a weighted population with an equally weighted one.
//!
//! Every scheme here reduces to choosing `N` ancestor indices from the current weights. The
//! index selection lives in free functions (`multinomial_resample`, `systematic_resample`,
//! `stratified_resample`, `residual_resample`) so custom strategies can reuse them;
//! [`ParticleResamplingStrategy`] wraps them as a [`ResamplingStrategy`].
//!
//! # Selection rule
//!
//! All schemes search a cumulative-weight array that is built separately from the particles, so
//! the original weights survive for inspection. For a draw `r` in `[0, total)` the selected
//! ancestor is the first index whose cumulative weight is strictly greater than `r`. A
//! zero-weight particle has the same cumulative weight as its predecessor and can therefore
//! never be selected, including at exact ties. If rounding pushes a draw to `total` or beyond,
//! the last particle with positive weight is selected.
//!
//! When the total weight is zero or not finite every scheme falls back to drawing ancestors
//! uniformly.
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::{FilterError, Result};
use crate::particle::Particle;

/// Replaces a population by drawing from it.
pub trait ResamplingStrategy<S> {
    /// Return a new population of exactly `particles.len()` particles. The engine swaps it in
    /// for the old one as a whole.
    fn resample(
        &mut self,
        particles: &[Particle<S>],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Particle<S>>>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ParticleResamplingStrategy {
    /// Multinomial: `N` independent draws proportional to weight.
    #[default]
    Simple,
    /// One uniform offset, `N` evenly spaced positions.
    Systematic,
    /// One uniform draw inside each of `N` equal strata.
    Stratified,
    /// Deterministic `floor(N w)` copies, remainder drawn systematically from the residuals.
    Residual,
}

impl ParticleResamplingStrategy {
    /// Ancestor indices for `weights` under this scheme.
    pub fn indices<R: Rng + ?Sized>(&self, weights: &[f64], rng: &mut R) -> Vec<usize> {
        match self {
            ParticleResamplingStrategy::Simple => multinomial_resample(weights, rng),
            ParticleResamplingStrategy::Systematic => systematic_resample(weights, rng),
            ParticleResamplingStrategy::Stratified => stratified_resample(weights, rng),
            ParticleResamplingStrategy::Residual => residual_resample(weights, rng),
        }
    }
}

impl<S: Clone> ResamplingStrategy<S> for ParticleResamplingStrategy {
    fn resample(
        &mut self,
        particles: &[Particle<S>],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Particle<S>>> {
        if particles.is_empty() {
            return Err(FilterError::EmptyPopulation);
        }
        let weights: Vec<f64> = particles.iter().map(|p| p.weight).collect();
        let indices = self.indices(&weights, rng);
        Ok(rebuild(particles, &indices))
    }
}

/// Clone the selected ancestors into a new population with weight `1/N` each.
pub fn rebuild<S: Clone>(particles: &[Particle<S>], indices: &[usize]) -> Vec<Particle<S>> {
    let equal_weight = 1.0 / indices.len() as f64;
    indices
        .iter()
        .map(|&i| {
            let mut particle = particles[i].clone();
            particle.weight = equal_weight;
            particle
        })
        .collect()
}

/// Running sum of `weights`. Non-decreasing for non-negative weights; the last element is the
/// total weight.
pub fn cumulative_weights(weights: &[f64]) -> Vec<f64> {
    let mut total = 0.0;
    weights
        .iter()
        .map(|w| {
            total += w;
            total
        })
        .collect()
}

/// First index whose cumulative weight is strictly greater than `r`, or the last particle with
/// positive weight when none is. `cumulative` must not be empty.
pub fn select(cumulative: &[f64], r: f64) -> usize {
    let total = cumulative[cumulative.len() - 1];
    // Trailing zero weights repeat `total`; the first index reaching it carries weight.
    let last_positive = cumulative.partition_point(|&c| c < total);
    cumulative
        .partition_point(|&c| c <= r)
        .min(last_positive)
        .min(cumulative.len() - 1)
}

fn is_degenerate(total: f64) -> bool {
    !(total > 0.0 && total.is_finite())
}

fn uniform_indices<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<usize> {
    (0..n).map(|_| rng.random_range(0..n)).collect()
}

/// Multinomial resampling: `N` independent draws `r ~ U[0, total)`.
pub fn multinomial_resample<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Vec<usize> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }
    let cumulative = cumulative_weights(weights);
    let total = cumulative[n - 1];
    if is_degenerate(total) {
        return uniform_indices(n, rng);
    }
    (0..n)
        .map(|_| select(&cumulative, rng.random::<f64>() * total))
        .collect()
}

/// Systematic resampling: positions `(u + k) * total / N` for a single `u ~ U[0, 1)`.
pub fn systematic_resample<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Vec<usize> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }
    let cumulative = cumulative_weights(weights);
    let total = cumulative[n - 1];
    if is_degenerate(total) {
        return uniform_indices(n, rng);
    }
    let step = total / n as f64;
    let offset = rng.random::<f64>();
    (0..n)
        .map(|k| select(&cumulative, (offset + k as f64) * step))
        .collect()
}

/// Stratified resampling: positions `(uₖ + k) * total / N` with an independent `uₖ` per stratum.
pub fn stratified_resample<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Vec<usize> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }
    let cumulative = cumulative_weights(weights);
    let total = cumulative[n - 1];
    if is_degenerate(total) {
        return uniform_indices(n, rng);
    }
    let step = total / n as f64;
    (0..n)
        .map(|k| select(&cumulative, (rng.random::<f64>() + k as f64) * step))
        .collect()
}

/// Residual resampling: each particle is first copied `floor(N w / total)` times, and the
/// remaining slots are filled by systematic resampling over the fractional residuals.
pub fn residual_resample<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Vec<usize> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }
    let total: f64 = weights.iter().sum();
    if is_degenerate(total) {
        return uniform_indices(n, rng);
    }
    let mut indices = Vec::with_capacity(n);
    let mut residual = vec![0.0; n];
    for (i, &w) in weights.iter().enumerate() {
        let expected = w / total * n as f64;
        let copies = expected.floor();
        residual[i] = expected - copies;
        for _ in 0..copies as usize {
            indices.push(i);
        }
    }
    // Rounding in `expected` can overshoot by a copy.
    indices.truncate(n);
    let remaining = n - indices.len();
    if remaining > 0 {
        let cumulative = cumulative_weights(&residual);
        let residual_total = cumulative[n - 1];
        if is_degenerate(residual_total) {
            indices.extend((0..remaining).map(|_| rng.random_range(0..n)));
        } else {
            let step = residual_total / remaining as f64;
            let offset = rng.random::<f64>();
            indices.extend(
                (0..remaining).map(|k| select(&cumulative, (offset + k as f64) * step)),
            );
        }
    }
    indices
}
