//! Error type shared by the engine and every strategy.
use thiserror::Error;

/// Boxed error raised by a user-supplied model or strategy.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum FilterError {
    /// A filter was requested with zero particles.
    #[error("particle count must be positive")]
    EmptyPopulation,
    /// The weight sum after evaluation is zero or not finite. Every hypothesis
    /// was assigned zero likelihood, or the numerics broke down upstream.
    #[error("particle weight sum is {weight_sum}, population is degenerate")]
    Degenerate { weight_sum: f64 },
    /// A single particle weight is negative or not finite.
    #[error("particle {index} has invalid weight {weight}")]
    InvalidWeight { index: usize, weight: f64 },
    /// A resampling strategy returned a population of the wrong size.
    #[error("resampling produced {actual} particles, expected {expected}")]
    PopulationSize { expected: usize, actual: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Domain error raised by a model or strategy, forwarded unchanged.
    #[error(transparent)]
    Model(BoxError),
}

impl FilterError {
    /// Wrap a model-specific error so it can be returned through the engine.
    pub fn model<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        FilterError::Model(error.into())
    }
}

pub type Result<T> = std::result::Result<T, FilterError>;
