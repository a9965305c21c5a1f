//! # Kinetics Module
//!
//! Linear algebra for the master equation `dp/dt = R·p` over a coarse-grained
//! landscape.
//!
//! - [`rate_matrix`] holds the transition rates `R[target][source]`.
//! - [`equilibrium`] computes the stationary distribution via detailed balance.
//! - [`propagator`] advances a probability vector in time, either exactly by
//!   spectral decomposition of a reversible generator or with an adaptive
//!   Dormand-Prince integrator.
//! - [`trajectory`] exposes the forward simulation as a lazy, ordered sequence
//!   of samples.

pub mod equilibrium;
pub mod propagator;
pub mod rate_matrix;
pub mod trajectory;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum KineticsError {
    #[error("Rate matrix is empty")]
    Empty,

    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Invalid rate {value} for transition {source_index} -> {target}")]
    InvalidRate {
        source_index: usize,
        target: usize,
        value: f64,
    },

    #[error("Transition {source_index} -> {target} has no reverse transition")]
    NotReversible { source_index: usize, target: usize },

    #[error("Rate matrix is disconnected: {reachable} of {dim} states reachable")]
    Disconnected { reachable: usize, dim: usize },

    #[error("Stationary distribution is too small to symmetrize the generator")]
    IllConditioned,

    #[error("Invalid time schedule: {0}")]
    InvalidTimes(String),

    #[error("Integration did not reach t = {time} within {steps} steps")]
    StepLimitExceeded { time: f64, steps: usize },
}

/// Absolute and relative error tolerances of the forward simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub atol: f64,
    pub rtol: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            atol: 1e-4,
            rtol: 1e-4,
        }
    }
}
