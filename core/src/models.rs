//! Model interfaces for the problem-specific parts of a particle filter.
//!
//! The engine knows nothing about the system being tracked. The three traits here carry that
//! knowledge: an [`Initializer`] seeds the population, a [`TransitionModel`] advances every
//! particle by one step given a control input, and an [`ObservationModel`] scores every
//! particle against a set of observations. Each receives the whole population as a slice that
//! is valid for the duration of the call only.
//!
//! Closures with matching signatures implement the traits directly, which is convenient for
//! small drivers and tests:
//!
//! ```rust
//! use rand::RngCore;
//! use smc::{FilterError, Particle, TransitionModel};
//!
//! let mut drift = |particles: &mut [Particle<f64>], dt: &f64, _rng: &mut dyn RngCore| {
//!     for p in particles.iter_mut() {
//!         p.state += 2.0 * dt;
//!     }
//!     Ok::<(), FilterError>(())
//! };
//! let mut particles = vec![Particle::new(1.0, 0.5), Particle::new(3.0, 0.5)];
//! let mut rng = rand::rng();
//! drift.apply(&mut particles, &0.5, &mut rng).unwrap();
//! assert_eq!(particles[0].state, 2.0);
//! ```
use rand::RngCore;

use crate::error::Result;
use crate::particle::Particle;

/// Seeds a population.
pub trait Initializer<S> {
    /// Assign both state and weight to every particle. The resulting weights must be finite
    /// and non-negative, and must not all be zero.
    fn init(&mut self, particles: &mut [Particle<S>], rng: &mut dyn RngCore) -> Result<()>;
}

/// Motion model: advances every particle's state by one time step.
pub trait TransitionModel<S, C> {
    /// Propagate the state of every particle under `control`. May be stochastic (draw from
    /// `rng`), must not modify weights.
    fn apply(
        &mut self,
        particles: &mut [Particle<S>],
        control: &C,
        rng: &mut dyn RngCore,
    ) -> Result<()>;
}

/// Likelihood model: re-weights every particle against observations.
pub trait ObservationModel<S, O> {
    /// Multiply each particle's weight by a non-negative likelihood of `observations` given
    /// its state. Must not modify states.
    fn evaluate(&mut self, particles: &mut [Particle<S>], observations: &O) -> Result<()>;
}

impl<S, F> Initializer<S> for F
where
    F: FnMut(&mut [Particle<S>], &mut dyn RngCore) -> Result<()>,
{
    fn init(&mut self, particles: &mut [Particle<S>], rng: &mut dyn RngCore) -> Result<()> {
        self(particles, rng)
    }
}

impl<S, C, F> TransitionModel<S, C> for F
where
    F: FnMut(&mut [Particle<S>], &C, &mut dyn RngCore) -> Result<()>,
{
    fn apply(
        &mut self,
        particles: &mut [Particle<S>],
        control: &C,
        rng: &mut dyn RngCore,
    ) -> Result<()> {
        self(particles, control, rng)
    }
}

impl<S, O, F> ObservationModel<S, O> for F
where
    F: FnMut(&mut [Particle<S>], &O) -> Result<()>,
{
    fn evaluate(&mut self, particles: &mut [Particle<S>], observations: &O) -> Result<()> {
        self(particles, observations)
    }
}

/// Initializer that places every particle at a copy of one state with uniform weight.
#[derive(Clone, Debug)]
pub struct UniformInitializer<S> {
    pub state: S,
}

impl<S: Clone> Initializer<S> for UniformInitializer<S> {
    fn init(&mut self, particles: &mut [Particle<S>], _rng: &mut dyn RngCore) -> Result<()> {
        let weight = 1.0 / particles.len() as f64;
        for particle in particles.iter_mut() {
            particle.state = self.state.clone();
            particle.weight = weight;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FilterError;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn closure_initializer() {
        let mut init = |particles: &mut [Particle<f64>], _rng: &mut dyn RngCore| {
            for (i, p) in particles.iter_mut().enumerate() {
                p.state = i as f64;
                p.weight = 1.0;
            }
            Ok::<(), FilterError>(())
        };
        let mut particles = vec![Particle::<f64>::zero(); 3];
        let mut rng = StdRng::seed_from_u64(42);
        init.init(&mut particles, &mut rng).unwrap();
        assert_eq!(particles[2].state, 2.0);
        assert_eq!(particles[2].weight, 1.0);
    }

    #[test]
    fn closure_observation_model_propagates_errors() {
        let mut reject = |_particles: &mut [Particle<f64>], obs: &Option<f64>| match obs {
            Some(_) => Ok(()),
            None => Err(FilterError::model("missing observation")),
        };
        let mut particles = vec![Particle::new(0.0, 1.0)];
        assert!(reject.evaluate(&mut particles, &Some(1.0)).is_ok());
        let err = reject.evaluate(&mut particles, &None).unwrap_err();
        assert_eq!(err.to_string(), "missing observation");
    }

    #[test]
    fn uniform_initializer() {
        let mut init = UniformInitializer { state: 7.5 };
        let mut particles = vec![Particle::<f64>::zero(); 4];
        let mut rng = StdRng::seed_from_u64(42);
        init.init(&mut particles, &mut rng).unwrap();
        for p in &particles {
            assert_eq!(p.state, 7.5);
            assert_eq!(p.weight, 0.25);
        }
    }
}
