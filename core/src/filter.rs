//! The particle filter engine.
//!
//! [`ParticleFilter`] owns a fixed-size population, an injectable random source and one object
//! for each strategy role. Each call to [`ParticleFilter::update`] runs one full cycle:
//!
//! 1. resample, if the effective sample size recorded at the end of the previous cycle fell
//!    below `N * neff_threshold`;
//! 2. propagate every particle through the [`TransitionModel`];
//! 3. re-weight every particle through the [`ObservationModel`];
//! 4. normalize the weights and record the new effective sample size;
//! 5. return the [`EstimationStrategy`]'s point estimate.
//!
//! ```rust
//! use rand::RngCore;
//! use rand_distr::{Distribution, Normal};
//! use smc::{FilterError, Particle, ParticleAveragingStrategy, ParticleFilter,
//!           ParticleResamplingStrategy};
//!
//! // Random walk with unit-variance Gaussian observations of the state itself.
//! let walk = |particles: &mut [Particle<f64>], std: &f64, rng: &mut dyn RngCore| {
//!     let noise = Normal::new(0.0, *std).map_err(FilterError::model)?;
//!     for p in particles.iter_mut() {
//!         p.state += noise.sample(rng);
//!     }
//!     Ok::<(), FilterError>(())
//! };
//! let likelihood = |particles: &mut [Particle<f64>], z: &f64| {
//!     for p in particles.iter_mut() {
//!         p.weight *= (-0.5 * (p.state - z).powi(2)).exp();
//!     }
//!     Ok::<(), FilterError>(())
//! };
//! let mut pf = ParticleFilter::new_with_seed(
//!     500,
//!     walk,
//!     likelihood,
//!     ParticleAveragingStrategy::WeightedAverage,
//!     ParticleResamplingStrategy::Simple,
//!     42,
//! )
//! .unwrap();
//! pf.set_neff_threshold(0.5);
//! pf.init_with(&mut smc::UniformInitializer { state: 0.0 }).unwrap();
//! for z in [0.5, 1.0, 1.5, 2.0] {
//!     let estimate = pf.update(&0.2, &z).unwrap();
//!     assert!(estimate.is_finite());
//! }
//! ```
use log::{debug, info, trace, warn};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::config::FilterConfig;
use crate::error::{FilterError, Result};
use crate::estimation::EstimationStrategy;
use crate::models::{Initializer, ObservationModel, TransitionModel};
use crate::particle::{Particle, effective_sample_size, normalize_weights, validate_weights};
use crate::resampling::ResamplingStrategy;
use crate::state::State;

use std::fmt::{self, Debug};

/// Default fraction of `N` below which the next cycle resamples.
pub const DEFAULT_NEFF_THRESHOLD: f64 = 0.25;

/// Generic sequential Monte Carlo filter over states `S`, controls `C` and observations `O`,
/// drawing randomness from `R`.
pub struct ParticleFilter<S, C, O, R = StdRng> {
    particles: Vec<Particle<S>>,
    transition: Box<dyn TransitionModel<S, C>>,
    evaluation: Box<dyn ObservationModel<S, O>>,
    estimation: Box<dyn EstimationStrategy<S>>,
    resampling: Box<dyn ResamplingStrategy<S>>,
    rng: R,
    neff_threshold: f64,
    last_neff: f64,
    resampled: bool,
    step_count: u64,
}

impl<S, C, O, R> Debug for ParticleFilter<S, C, O, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let min_weight = self
            .particles
            .iter()
            .map(|p| p.weight)
            .fold(f64::INFINITY, f64::min);
        let max_weight = self.particles.iter().map(|p| p.weight).fold(0.0, f64::max);
        f.debug_struct("ParticleFilter")
            .field("num_particles", &self.particles.len())
            .field("neff_threshold", &self.neff_threshold)
            .field("last_neff", &self.last_neff)
            .field(
                "weight_range",
                &format_args!("[{:.4e}, {:.4e}]", min_weight, max_weight),
            )
            .field("step_count", &self.step_count)
            .finish()
    }
}

impl<S: State, C, O> ParticleFilter<S, C, O, StdRng> {
    /// Create a filter of `num_particles` zero-state, zero-weight particles with a random
    /// source seeded from system entropy.
    ///
    /// Fails with [`FilterError::EmptyPopulation`] if `num_particles` is zero. The population is
    /// not usable until [`init_with`](Self::init_with) has assigned states and weights.
    pub fn new(
        num_particles: usize,
        transition: impl TransitionModel<S, C> + 'static,
        evaluation: impl ObservationModel<S, O> + 'static,
        estimation: impl EstimationStrategy<S> + 'static,
        resampling: impl ResamplingStrategy<S> + 'static,
    ) -> Result<Self> {
        Self::new_with_seed(
            num_particles,
            transition,
            evaluation,
            estimation,
            resampling,
            rand::random(),
        )
    }

    /// Like [`new`](Self::new) but with a fixed seed, for reproducible runs.
    pub fn new_with_seed(
        num_particles: usize,
        transition: impl TransitionModel<S, C> + 'static,
        evaluation: impl ObservationModel<S, O> + 'static,
        estimation: impl EstimationStrategy<S> + 'static,
        resampling: impl ResamplingStrategy<S> + 'static,
        seed: u64,
    ) -> Result<Self> {
        Self::with_rng(
            num_particles,
            transition,
            evaluation,
            estimation,
            resampling,
            StdRng::seed_from_u64(seed),
        )
    }

    /// Build a filter from a validated [`FilterConfig`]. The config selects the particle count,
    /// threshold, seed and the built-in estimation and resampling strategies; the models are
    /// supplied by the caller.
    pub fn from_config(
        config: &FilterConfig,
        transition: impl TransitionModel<S, C> + 'static,
        evaluation: impl ObservationModel<S, O> + 'static,
    ) -> Result<Self> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut filter = Self::new_with_seed(
            config.num_particles,
            transition,
            evaluation,
            config.estimation,
            config.resampling,
            seed,
        )?;
        filter.set_neff_threshold(config.neff_threshold);
        Ok(filter)
    }
}

impl<S: State, C, O, R: RngCore> ParticleFilter<S, C, O, R> {
    /// Create a filter drawing all randomness from `rng`.
    pub fn with_rng(
        num_particles: usize,
        transition: impl TransitionModel<S, C> + 'static,
        evaluation: impl ObservationModel<S, O> + 'static,
        estimation: impl EstimationStrategy<S> + 'static,
        resampling: impl ResamplingStrategy<S> + 'static,
        rng: R,
    ) -> Result<Self> {
        if num_particles == 0 {
            return Err(FilterError::EmptyPopulation);
        }
        info!("Creating particle filter with {num_particles} particles");
        Ok(ParticleFilter {
            particles: (0..num_particles).map(|_| Particle::zero()).collect(),
            transition: Box::new(transition),
            evaluation: Box::new(evaluation),
            estimation: Box::new(estimation),
            resampling: Box::new(resampling),
            rng,
            neff_threshold: DEFAULT_NEFF_THRESHOLD,
            last_neff: f64::INFINITY,
            resampled: false,
            step_count: 0,
        })
    }

    /// Set the fraction of `N` below which the next cycle resamples.
    ///
    /// Meaningful values lie in `(0, 1]`: `1.0` resamples before every cycle whose predecessor
    /// ended with non-uniform weights, values near zero almost never resample. Other values are
    /// stored as given (0 or less disables resampling, above 1 resamples unconditionally) but
    /// are a caller error and are logged as such.
    pub fn set_neff_threshold(&mut self, fraction: f64) {
        if !(fraction > 0.0 && fraction <= 1.0) {
            warn!("Effective sample size threshold {fraction} is outside (0, 1]");
        }
        self.neff_threshold = fraction;
    }

    /// Let `initializer` assign a state and weight to every particle.
    ///
    /// Fails with [`FilterError::InvalidWeight`] if a resulting weight is negative or not
    /// finite. The stored effective sample size is reset, so the next update does not resample.
    pub fn init_with<I>(&mut self, initializer: &mut I) -> Result<()>
    where
        I: Initializer<S> + ?Sized,
    {
        initializer.init(&mut self.particles, &mut self.rng)?;
        validate_weights(&self.particles)?;
        self.last_neff = f64::INFINITY;
        self.resampled = false;
        debug!(
            "Initialized {} particles, effective sample size {:.2}",
            self.particles.len(),
            effective_sample_size(&self.particles)
        );
        Ok(())
    }

    /// Run one filter cycle and return the point estimate.
    ///
    /// Fails with [`FilterError::Degenerate`] when every particle ends up with zero weight (or
    /// the weights stop being finite), and with [`FilterError::PopulationSize`] if the
    /// resampling strategy returns the wrong number of particles. Errors from the strategies
    /// are passed through unchanged. A failed cycle may leave the population partially updated.
    pub fn update(&mut self, control: &C, observations: &O) -> Result<S> {
        let n = self.particles.len();
        self.resampled = self.last_neff < n as f64 * self.neff_threshold;
        if self.resampled {
            debug!(
                "Resampling at step {}: effective sample size {:.2} below {:.2}",
                self.step_count,
                self.last_neff,
                n as f64 * self.neff_threshold
            );
            let resampled = self.resampling.resample(&self.particles, &mut self.rng)?;
            if resampled.len() != n {
                return Err(FilterError::PopulationSize {
                    expected: n,
                    actual: resampled.len(),
                });
            }
            self.particles = resampled;
        }
        self.transition
            .apply(&mut self.particles, control, &mut self.rng)?;
        self.evaluation.evaluate(&mut self.particles, observations)?;
        self.last_neff = normalize_weights(&mut self.particles)?;
        self.step_count += 1;
        trace!(
            "Step {} complete: effective sample size {:.2}",
            self.step_count, self.last_neff
        );
        self.estimation.estimate(&self.particles)
    }

    /// The current population. Never observed mid-update.
    pub fn particles(&self) -> &[Particle<S>] {
        &self.particles
    }

    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    pub fn neff_threshold(&self) -> f64 {
        self.neff_threshold
    }

    /// Effective sample size recorded at the end of the last update, `+inf` before the first.
    pub fn last_neff(&self) -> f64 {
        self.last_neff
    }

    /// Effective sample size of the current weights.
    pub fn effective_sample_size(&self) -> f64 {
        effective_sample_size(&self.particles)
    }

    /// Whether the most recent update started by resampling.
    pub fn resampled(&self) -> bool {
        self.resampled
    }

    /// Number of completed updates.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }
}
