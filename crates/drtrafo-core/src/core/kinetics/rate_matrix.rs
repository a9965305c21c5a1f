use super::KineticsError;
use nalgebra::DMatrix;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Transition rates between states, stored as `R[(target, source)]`.
///
/// The diagonal is kept at zero; [`RateMatrix::generator`] fills it with the
/// negative total outflow of each state.
#[derive(Debug, Clone, PartialEq)]
pub struct RateMatrix {
    rates: DMatrix<f64>,
}

impl RateMatrix {
    /// Builds a matrix from a rate function `rate(source, target)`.
    pub fn from_fn<F>(dim: usize, rate: F) -> Result<Self, KineticsError>
    where
        F: Fn(usize, usize) -> f64 + Sync,
    {
        let column = |source: usize| -> Vec<f64> {
            (0..dim)
                .map(|target| {
                    if source == target {
                        0.0
                    } else {
                        rate(source, target)
                    }
                })
                .collect()
        };

        #[cfg(not(feature = "parallel"))]
        let columns: Vec<Vec<f64>> = (0..dim).map(column).collect();

        #[cfg(feature = "parallel")]
        let columns: Vec<Vec<f64>> = (0..dim).into_par_iter().map(column).collect();

        Self::from_matrix(DMatrix::from_fn(dim, dim, |target, source| {
            columns[source][target]
        }))
    }

    /// Wraps a square matrix of non-negative, finite off-diagonal rates.
    pub fn from_matrix(matrix: DMatrix<f64>) -> Result<Self, KineticsError> {
        if matrix.nrows() != matrix.ncols() {
            return Err(KineticsError::DimensionMismatch {
                expected: matrix.nrows(),
                found: matrix.ncols(),
            });
        }
        let mut rates = matrix;
        for source in 0..rates.ncols() {
            for target in 0..rates.nrows() {
                if source == target {
                    rates[(target, source)] = 0.0;
                    continue;
                }
                let value = rates[(target, source)];
                if !value.is_finite() || value < 0.0 {
                    return Err(KineticsError::InvalidRate {
                        source_index: source,
                        target,
                        value,
                    });
                }
            }
        }
        Ok(Self { rates })
    }

    pub fn dim(&self) -> usize {
        self.rates.nrows()
    }

    pub fn rate(&self, source: usize, target: usize) -> f64 {
        self.rates[(target, source)]
    }

    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.rates
    }

    /// The master-equation generator: off-diagonal rates with each diagonal
    /// entry set to the negative column sum, so probability is conserved.
    pub fn generator(&self) -> DMatrix<f64> {
        let mut generator = self.rates.clone();
        for source in 0..self.dim() {
            let outflow: f64 = self.rates.column(source).sum();
            generator[(source, source)] = -outflow;
        }
        generator
    }

    /// True if every transition has a reverse transition.
    pub fn is_reversible(&self) -> bool {
        (0..self.dim()).all(|i| {
            (0..self.dim()).all(|j| (self.rate(i, j) > 0.0) == (self.rate(j, i) > 0.0))
        })
    }
}
