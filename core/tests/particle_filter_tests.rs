//! End-to-end tests of the particle filter engine
//!
//! These tests drive complete filters through the public API only: construction, seeding,
//! repeated update cycles with every built-in strategy, and reproducibility under a fixed seed.
//! The tracking bounds are empirical regression checks, not theoretical guarantees.
use assert_approx_eq::assert_approx_eq;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Distribution, Normal};
use tempfile::NamedTempFile;

use smc::{
    FilterConfig, FilterError, Initializer, Particle, ParticleAveragingStrategy, ParticleFilter,
    ParticleResamplingStrategy, UniformInitializer,
};

type Result<T> = std::result::Result<T, FilterError>;

const ALL_RESAMPLERS: [ParticleResamplingStrategy; 4] = [
    ParticleResamplingStrategy::Simple,
    ParticleResamplingStrategy::Systematic,
    ParticleResamplingStrategy::Stratified,
    ParticleResamplingStrategy::Residual,
];

fn gaussian(x: f64, mean: f64, std: f64) -> f64 {
    (-0.5 * ((x - mean) / std).powi(2)).exp()
}

fn identity(_particles: &mut [Particle<f64>], _control: &(), _rng: &mut dyn RngCore) -> Result<()> {
    Ok(())
}

/// Gaussian likelihood of a direct, unit-variance observation of the state.
fn direct_observation(particles: &mut [Particle<f64>], z: &f64) -> Result<()> {
    for p in particles.iter_mut() {
        p.weight *= gaussian(p.state, *z, 1.0);
    }
    Ok(())
}

/// Drift by the control plus N(0, 0.3) process noise.
fn drift(particles: &mut [Particle<f64>], velocity: &f64, rng: &mut dyn RngCore) -> Result<()> {
    let noise = Normal::new(0.0, 0.3).map_err(FilterError::model)?;
    for p in particles.iter_mut() {
        p.state += velocity + noise.sample(rng);
    }
    Ok(())
}

/// Places particle `i` at state `i` with uniform weight.
struct Ladder;

impl Initializer<f64> for Ladder {
    fn init(&mut self, particles: &mut [Particle<f64>], _rng: &mut dyn RngCore) -> Result<()> {
        let w = 1.0 / particles.len() as f64;
        for (i, p) in particles.iter_mut().enumerate() {
            p.state = i as f64;
            p.weight = w;
        }
        Ok(())
    }
}

/// Scatters particles uniformly over `[-half_width, half_width]`.
struct Scatter {
    half_width: f64,
}

impl Initializer<f64> for Scatter {
    fn init(&mut self, particles: &mut [Particle<f64>], rng: &mut dyn RngCore) -> Result<()> {
        let w = 1.0 / particles.len() as f64;
        for p in particles.iter_mut() {
            p.state = rng.random_range(-self.half_width..=self.half_width);
            p.weight = w;
        }
        Ok(())
    }
}

fn tracking_filter(
    resampling: ParticleResamplingStrategy,
    estimation: ParticleAveragingStrategy,
    seed: u64,
) -> ParticleFilter<f64, f64, f64> {
    let mut pf: ParticleFilter<f64, f64, f64> =
        ParticleFilter::new_with_seed(500, drift, direct_observation, estimation, resampling, seed)
            .unwrap();
    pf.set_neff_threshold(0.5);
    pf.init_with(&mut Scatter { half_width: 5.0 }).unwrap();
    pf
}

/// Runs `steps` cycles against a target moving at 0.5 per step, observed with unit-variance
/// noise. Returns the absolute estimation error of every step.
fn track(pf: &mut ParticleFilter<f64, f64, f64>, steps: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let sensor = Normal::new(0.0, 1.0).unwrap();
    let mut truth = 0.0;
    let mut errors = Vec::with_capacity(steps);
    for _ in 0..steps {
        truth += 0.5;
        let z = truth + sensor.sample(&mut rng);
        let estimate = pf.update(&0.5, &z).unwrap();
        errors.push((estimate - truth).abs());
    }
    errors
}

#[test]
fn four_particles_concentrate_on_the_observation() {
    let mut pf: ParticleFilter<f64, (), f64> = ParticleFilter::new_with_seed(
        4,
        identity,
        direct_observation,
        ParticleAveragingStrategy::WeightedAverage,
        ParticleResamplingStrategy::Simple,
        42,
    )
    .unwrap();
    pf.init_with(&mut Ladder).unwrap();
    let estimate = pf.update(&(), &2.0).unwrap();

    let weights: Vec<f64> = pf.particles().iter().map(|p| p.weight).collect();
    let heaviest = weights
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    assert_eq!(heaviest, 2);
    assert!(estimate > 1.0 && estimate < 3.0, "estimate {estimate}");
    assert!((estimate - 2.0).abs() < 1.5);

    let likelihoods: Vec<f64> = (0..4).map(|i| gaussian(i as f64, 2.0, 1.0)).collect();
    let total: f64 = likelihoods.iter().sum();
    let expected: f64 = likelihoods
        .iter()
        .enumerate()
        .map(|(i, l)| i as f64 * l / total)
        .sum();
    assert_approx_eq!(estimate, expected, 1e-12);
}

#[test]
fn neff_after_resampling_reflects_only_the_new_likelihoods() {
    let mut pf: ParticleFilter<f64, (), f64> = ParticleFilter::new_with_seed(
        8,
        identity,
        direct_observation,
        ParticleAveragingStrategy::WeightedAverage,
        ParticleResamplingStrategy::Systematic,
        42,
    )
    .unwrap();
    pf.set_neff_threshold(1.0);
    pf.init_with(&mut Ladder).unwrap();

    pf.update(&(), &3.0).unwrap();
    assert!(!pf.resampled());
    let neff_before_resampling = pf.last_neff();
    assert!(neff_before_resampling < 8.0);

    pf.update(&(), &4.0).unwrap();
    assert!(pf.resampled());
    assert_ne!(pf.last_neff(), neff_before_resampling);
    // Resampling reset the weights to 1/N, so the recorded value depends only on the
    // likelihoods of the surviving states under the second observation.
    let likelihoods: Vec<f64> = pf
        .particles()
        .iter()
        .map(|p| gaussian(p.state, 4.0, 1.0))
        .collect();
    let sum: f64 = likelihoods.iter().sum();
    let sum_sq: f64 = likelihoods.iter().map(|l| l * l).sum();
    assert_approx_eq!(pf.last_neff(), sum * sum / sum_sq, 1e-9);
}

#[test]
fn identical_seeds_reproduce_identical_runs() {
    let mut a = tracking_filter(
        ParticleResamplingStrategy::Simple,
        ParticleAveragingStrategy::WeightedAverage,
        42,
    );
    let mut b = tracking_filter(
        ParticleResamplingStrategy::Simple,
        ParticleAveragingStrategy::WeightedAverage,
        42,
    );
    assert_eq!(a.particles(), b.particles());
    for (step, z) in [0.4, 1.2, 1.3, 2.1, 2.6, 3.0, 3.4, 4.2].iter().enumerate() {
        let ea = a.update(&0.5, z).unwrap();
        let eb = b.update(&0.5, z).unwrap();
        assert_eq!(ea, eb, "estimates diverged at step {step}");
        assert_eq!(a.particles(), b.particles(), "particles diverged at step {step}");
        assert_eq!(a.resampled(), b.resampled());
    }
}

#[test]
fn different_seeds_produce_different_populations() {
    let a = tracking_filter(
        ParticleResamplingStrategy::Simple,
        ParticleAveragingStrategy::WeightedAverage,
        1,
    );
    let b = tracking_filter(
        ParticleResamplingStrategy::Simple,
        ParticleAveragingStrategy::WeightedAverage,
        2,
    );
    assert_ne!(a.particles(), b.particles());
}

#[test]
fn with_rng_matches_new_with_seed() {
    let mut seeded = tracking_filter(
        ParticleResamplingStrategy::Stratified,
        ParticleAveragingStrategy::WeightedAverage,
        7,
    );
    let mut injected: ParticleFilter<f64, f64, f64> = ParticleFilter::with_rng(
        500,
        drift,
        direct_observation,
        ParticleAveragingStrategy::WeightedAverage,
        ParticleResamplingStrategy::Stratified,
        StdRng::seed_from_u64(7),
    )
    .unwrap();
    injected.set_neff_threshold(0.5);
    injected.init_with(&mut Scatter { half_width: 5.0 }).unwrap();
    assert_eq!(track(&mut seeded, 10, 3), track(&mut injected, 10, 3));
}

#[test]
fn all_zero_likelihood_is_degenerate() {
    let reject_all = |particles: &mut [Particle<f64>], _z: &f64| -> Result<()> {
        for p in particles.iter_mut() {
            p.weight *= 0.0;
        }
        Ok(())
    };
    let mut pf: ParticleFilter<f64, (), f64> = ParticleFilter::new_with_seed(
        16,
        identity,
        reject_all,
        ParticleAveragingStrategy::WeightedAverage,
        ParticleResamplingStrategy::Simple,
        42,
    )
    .unwrap();
    pf.init_with(&mut Ladder).unwrap();
    let err = pf.update(&(), &0.0).unwrap_err();
    assert!(matches!(err, FilterError::Degenerate { .. }));
}

#[test]
fn far_observation_underflows_to_degenerate() {
    let mut pf: ParticleFilter<f64, (), f64> = ParticleFilter::new_with_seed(
        4,
        identity,
        direct_observation,
        ParticleAveragingStrategy::WeightedAverage,
        ParticleResamplingStrategy::Simple,
        42,
    )
    .unwrap();
    pf.init_with(&mut Ladder).unwrap();
    assert!(matches!(
        pf.update(&(), &1.0e6),
        Err(FilterError::Degenerate { weight_sum }) if weight_sum == 0.0
    ));
}

#[test]
fn weights_stay_normalized_and_neff_bounded() {
    for resampling in ALL_RESAMPLERS {
        let mut pf = tracking_filter(resampling, ParticleAveragingStrategy::WeightedAverage, 42);
        let mut rng = StdRng::seed_from_u64(11);
        let n = pf.num_particles() as f64;
        let mut resample_count = 0;
        for step in 1..=25 {
            let z = 0.5 * step as f64 + rng.random_range(-1.0..1.0);
            pf.update(&0.5, &z).unwrap();
            let sum: f64 = pf.particles().iter().map(|p| p.weight).sum();
            assert_approx_eq!(sum, 1.0, 1e-9);
            assert!(pf.particles().iter().all(|p| p.weight >= 0.0));
            let neff = pf.last_neff();
            assert!((1.0 - 1e-9..=n + 1e-9).contains(&neff), "{resampling:?}: Neff {neff}");
            assert_approx_eq!(neff, pf.effective_sample_size(), 1e-9);
            assert_eq!(pf.num_particles(), 500);
            if pf.resampled() {
                resample_count += 1;
            }
        }
        assert_eq!(pf.step_count(), 25);
        assert!(resample_count > 0, "{resampling:?} never resampled");
    }
}

#[test]
fn uniform_weights_average_to_the_mean() {
    let flat = |_particles: &mut [Particle<f64>], _z: &()| -> Result<()> { Ok(()) };
    let mut pf: ParticleFilter<f64, (), ()> = ParticleFilter::new_with_seed(
        10,
        identity,
        flat,
        ParticleAveragingStrategy::WeightedAverage,
        ParticleResamplingStrategy::Simple,
        42,
    )
    .unwrap();
    pf.init_with(&mut Ladder).unwrap();
    let estimate = pf.update(&(), &()).unwrap();
    assert_approx_eq!(estimate, 4.5, 1e-12);
    assert_approx_eq!(pf.last_neff(), 10.0, 1e-9);
}

#[test]
fn every_resampler_tracks_a_moving_target() {
    for resampling in ALL_RESAMPLERS {
        let mut pf = tracking_filter(resampling, ParticleAveragingStrategy::WeightedAverage, 42);
        let errors = track(&mut pf, 40, 5);
        let late: f64 = errors[30..].iter().sum::<f64>() / 10.0;
        assert!(late < 1.0, "{resampling:?}: mean late error {late}");
    }
}

#[test]
fn every_estimator_tracks_a_moving_target() {
    for estimation in [
        ParticleAveragingStrategy::WeightedAverage,
        ParticleAveragingStrategy::UnweightedAverage,
        ParticleAveragingStrategy::HighestWeight,
    ] {
        let mut pf = tracking_filter(ParticleResamplingStrategy::Systematic, estimation, 42);
        let errors = track(&mut pf, 40, 5);
        let late: f64 = errors[30..].iter().sum::<f64>() / 10.0;
        assert!(late < 1.25, "{estimation:?}: mean late error {late}");
    }
}

#[test]
fn highest_weight_returns_a_population_member() {
    let mut pf = tracking_filter(
        ParticleResamplingStrategy::Simple,
        ParticleAveragingStrategy::HighestWeight,
        42,
    );
    let estimate = pf.update(&0.5, &1.0).unwrap();
    let best = pf
        .particles()
        .iter()
        .max_by(|a, b| a.weight.total_cmp(&b.weight))
        .unwrap();
    assert_eq!(estimate, best.state);
}

#[test]
fn reinitializing_resets_the_resampling_trigger() {
    let mut pf: ParticleFilter<f64, (), f64> = ParticleFilter::new_with_seed(
        4,
        identity,
        direct_observation,
        ParticleAveragingStrategy::WeightedAverage,
        ParticleResamplingStrategy::Simple,
        42,
    )
    .unwrap();
    pf.set_neff_threshold(1.0);
    pf.init_with(&mut Ladder).unwrap();
    pf.update(&(), &0.0).unwrap();
    pf.init_with(&mut UniformInitializer { state: 1.0 }).unwrap();
    assert!(pf.last_neff().is_infinite());
    let estimate = pf.update(&(), &1.0).unwrap();
    assert!(!pf.resampled());
    assert_approx_eq!(estimate, 1.0, 1e-12);
}

#[test]
fn vector_states_track_position_and_velocity() {
    use nalgebra::Vector2;

    let constant_velocity =
        |particles: &mut [Particle<Vector2<f64>>], dt: &f64, rng: &mut dyn RngCore| -> Result<()> {
            let accel = Normal::new(0.0, 0.05).map_err(FilterError::model)?;
            for p in particles.iter_mut() {
                let a = accel.sample(rng);
                p.state[0] += p.state[1] * dt + 0.5 * a * dt * dt;
                p.state[1] += a * dt;
            }
            Ok(())
        };
    let position_fix = |particles: &mut [Particle<Vector2<f64>>], z: &f64| -> Result<()> {
        for p in particles.iter_mut() {
            p.weight *= gaussian(p.state[0], *z, 0.5);
        }
        Ok(())
    };
    let mut spread =
        |particles: &mut [Particle<Vector2<f64>>], rng: &mut dyn RngCore| -> Result<()> {
            let w = 1.0 / particles.len() as f64;
            for p in particles.iter_mut() {
                p.state = Vector2::new(rng.random_range(-2.0..2.0), rng.random_range(-2.0..2.0));
                p.weight = w;
            }
            Ok(())
        };

    let mut pf: ParticleFilter<Vector2<f64>, f64, f64> = ParticleFilter::new_with_seed(
        1000,
        constant_velocity,
        position_fix,
        ParticleAveragingStrategy::WeightedAverage,
        ParticleResamplingStrategy::Systematic,
        42,
    )
    .unwrap();
    pf.set_neff_threshold(0.5);
    pf.init_with(&mut spread).unwrap();

    let mut rng = StdRng::seed_from_u64(9);
    let sensor = Normal::new(0.0, 0.5).unwrap();
    let mut estimate = Vector2::zeros();
    for step in 1..=40 {
        let truth = step as f64;
        estimate = pf.update(&1.0, &(truth + sensor.sample(&mut rng))).unwrap();
    }
    assert!((estimate[0] - 40.0).abs() < 1.5, "position {}", estimate[0]);
    assert!((estimate[1] - 1.0).abs() < 0.3, "velocity {}", estimate[1]);
}

#[test]
fn filter_builds_from_a_config_file() {
    let config = FilterConfig {
        num_particles: 300,
        neff_threshold: 0.6,
        seed: Some(42),
        resampling: ParticleResamplingStrategy::Residual,
        estimation: ParticleAveragingStrategy::WeightedAverage,
    };
    let f = NamedTempFile::new().unwrap();
    let path = f.path().with_extension("toml");
    config.to_file(&path).unwrap();
    let loaded = FilterConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);

    let build = |cfg: &FilterConfig| {
        let mut pf: ParticleFilter<f64, f64, f64> =
            ParticleFilter::from_config(cfg, drift, direct_observation).unwrap();
        pf.init_with(&mut Scatter { half_width: 5.0 }).unwrap();
        pf
    };
    let mut a = build(&config);
    let mut b = build(&loaded);
    assert_eq!(a.num_particles(), 300);
    assert_eq!(a.neff_threshold(), 0.6);
    assert_eq!(track(&mut a, 15, 1), track(&mut b, 15, 1));
}
