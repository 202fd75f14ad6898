//! The capability contract for tracked states.
//!
//! The engine and the built-in strategies never look inside a state. Everything they need is
//! expressed through [`State`]: a zero value to start accumulators from, multiplication by a
//! scalar, in-place addition into another state, and an independent copy via [`Clone`].
//!
//! Implementations are provided for plain scalars and for statically sized `nalgebra` vectors.
//! Any struct of named fields (a pose, a position/velocity pair, ...) implements it directly:
//!
//! ```rust
//! use smc::State;
//!
//! #[derive(Clone, Debug)]
//! struct Pose {
//!     x: f64,
//!     y: f64,
//!     heading: f64,
//! }
//!
//! impl State for Pose {
//!     fn zero() -> Self {
//!         Pose { x: 0.0, y: 0.0, heading: 0.0 }
//!     }
//!     fn scale(&mut self, factor: f64) {
//!         self.x *= factor;
//!         self.y *= factor;
//!         self.heading *= factor;
//!     }
//!     fn accumulate_into(&self, other: &mut Self) {
//!         other.x += self.x;
//!         other.y += self.y;
//!         other.heading += self.heading;
//!     }
//! }
//! ```
use nalgebra::SVector;

/// A hypothesis state carried by a particle.
///
/// `clone()` must produce a copy that shares no mutable storage with the original, since
/// resampling duplicates states and the copies are then propagated independently.
pub trait State: Clone {
    /// The zero (default) state. Used to populate a freshly constructed filter and as the
    /// starting accumulator for estimates.
    fn zero() -> Self;
    /// Multiply every numeric field by `factor`.
    ///
    /// On a concrete nalgebra vector, `v.scale(f)` resolves to the inherent
    /// `Matrix::scale`, which returns a scaled copy and leaves `v` as is. Call
    /// `State::scale(&mut v, f)` there; generic code over `S: State` is unaffected.
    fn scale(&mut self, factor: f64);
    /// Add the fields of `self` into `other`.
    fn accumulate_into(&self, other: &mut Self);
}

impl State for f64 {
    fn zero() -> Self {
        0.0
    }
    fn scale(&mut self, factor: f64) {
        *self *= factor;
    }
    fn accumulate_into(&self, other: &mut Self) {
        *other += *self;
    }
}

impl<const D: usize> State for SVector<f64, D> {
    fn zero() -> Self {
        SVector::<f64, D>::zeros()
    }
    fn scale(&mut self, factor: f64) {
        *self *= factor;
    }
    fn accumulate_into(&self, other: &mut Self) {
        *other += *self;
    }
}
