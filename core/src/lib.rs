//! Sequential Monte Carlo toolbox: a generic particle filter engine
//!
//! This crate provides a particle filter engine that is agnostic to the system being tracked. The engine maintains
//! a weighted population of hypothesis states, advances it through a pluggable motion model, re-weights it against
//! observations through a pluggable likelihood model, watches the effective sample size for weight collapse,
//! resamples adaptively and produces a point estimate every cycle. Everything problem specific (what a state is,
//! how it moves, how it is observed, how the population is seeded) is supplied by the caller through traits.
//!
//! This crate is primarily built off of the following dependencies:
//! - [`rand`](https://crates.io/crates/rand) and [`rand_distr`](https://crates.io/crates/rand_distr): Provides the
//!   injectable random source used by the engine and its strategies, and the distributions motion models draw from.
//! - [`nalgebra`](https://crates.io/crates/nalgebra): Statically sized vectors implement [`State`] out of the box.
//! - [`serde`](https://crates.io/crates/serde): Serializable configuration of the built-in strategies.
//!
//! ## Crate overview
//!
//! This crate is organized into several modules:
//! - [state]: The [`State`] capability contract every tracked state type implements.
//! - [particle]: Weighted particles, weight normalization and the effective sample size.
//! - [models]: The problem-specific interfaces: [`Initializer`], [`TransitionModel`] and [`ObservationModel`].
//! - [estimation]: Point estimates from a population ([`EstimationStrategy`], [`ParticleAveragingStrategy`]).
//! - [resampling]: Resampling schemes ([`ResamplingStrategy`], [`ParticleResamplingStrategy`]).
//! - [filter]: The [`ParticleFilter`] engine.
//! - [config]: File-backed configuration of a filter.
//! - [error]: The [`FilterError`] type.
//!
//! ## The update cycle
//!
//! A driver constructs a [`ParticleFilter`] with a particle count and one object per strategy role, seeds the
//! population once with [`ParticleFilter::init_with`], then calls [`ParticleFilter::update`] once per time step.
//! Each update executes, in this order:
//!
//! 1. Resample, if the effective sample size from the previous cycle fell below `N * neff_threshold`.
//! 2. Apply the transition model (states only).
//! 3. Apply the observation model (weights only).
//! 4. Normalize the weights to sum to one and record the effective sample size
//!
//! $$
//! N_{eff} = \frac{1}{\sum_i w_i^2}
//! $$
//!
//! which lies in $[1, N]$: $N$ when all weights are equal, $1$ when a single particle carries all of the weight.
//! 5. Return the estimation strategy's point estimate.
//!
//! A cycle whose observation model assigns zero likelihood to every particle fails with [`FilterError::Degenerate`]
//! instead of producing an estimate.
//!
//! ## Randomness
//!
//! All randomness flows through a single generator owned by the filter and lent to the strategies as
//! `&mut dyn RngCore`. Construct the filter with [`ParticleFilter::new_with_seed`] or [`ParticleFilter::with_rng`]
//! and identical inputs reproduce identical estimates and particle traces.
pub mod config;
pub mod error;
pub mod estimation;
pub mod filter;
pub mod models;
pub mod particle;
pub mod resampling;
pub mod state;

pub use config::FilterConfig;
pub use error::{BoxError, FilterError};
pub use estimation::{EstimationStrategy, ParticleAveragingStrategy};
pub use filter::{DEFAULT_NEFF_THRESHOLD, ParticleFilter};
pub use models::{Initializer, ObservationModel, TransitionModel, UniformInitializer};
pub use particle::{Particle, effective_sample_size, normalize_weights};
pub use resampling::{ParticleResamplingStrategy, ResamplingStrategy};
pub use state::State;
