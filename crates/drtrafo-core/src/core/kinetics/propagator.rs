use super::equilibrium::stationary_distribution;
use super::rate_matrix::RateMatrix;
use super::{KineticsError, Tolerance};
use nalgebra::{DMatrix, DVector, SymmetricEigen};

/// Advances a probability vector under the master equation.
pub trait Propagator {
    /// Returns `p(t + dt)` given `p(t)`.
    fn propagate(&mut self, p: &DVector<f64>, dt: f64) -> Result<DVector<f64>, KineticsError>;
}

/// Exact propagation for reversible rate matrices.
///
/// With `D = diag(p_eq)`, the generator `Q` is similar to the symmetric matrix
/// `S = D^-1/2 · Q · D^1/2`, so `exp(Q·t) = D^1/2 · V · exp(Λ·t) · Vᵀ · D^-1/2`
/// where `S = V·Λ·Vᵀ`. Stiff systems cost the same as soft ones.
#[derive(Debug, Clone)]
pub struct SpectralPropagator {
    sqrt_p: DVector<f64>,
    eigenvalues: DVector<f64>,
    eigenvectors: DMatrix<f64>,
}

impl SpectralPropagator {
    pub fn new(matrix: &RateMatrix) -> Result<Self, KineticsError> {
        let p_eq = stationary_distribution(matrix)?;
        if p_eq.iter().any(|&value| value < f64::MIN_POSITIVE) {
            return Err(KineticsError::IllConditioned);
        }

        let sqrt_p = p_eq.map(f64::sqrt);
        let generator = matrix.generator();
        let dim = matrix.dim();
        let similar = DMatrix::from_fn(dim, dim, |i, j| generator[(i, j)] * sqrt_p[j] / sqrt_p[i]);
        let symmetric = (&similar + similar.transpose()) * 0.5;
        let eigen = SymmetricEigen::new(symmetric);

        Ok(Self {
            sqrt_p,
            // Positive eigenvalues are round-off around the zero mode.
            eigenvalues: eigen.eigenvalues.map(|lambda| lambda.min(0.0)),
            eigenvectors: eigen.eigenvectors,
        })
    }

    pub fn dim(&self) -> usize {
        self.sqrt_p.len()
    }
}

impl Propagator for SpectralPropagator {
    fn propagate(&mut self, p: &DVector<f64>, dt: f64) -> Result<DVector<f64>, KineticsError> {
        check_dimension(self.dim(), p)?;
        let scaled = p.component_div(&self.sqrt_p);
        let mut modes = self.eigenvectors.tr_mul(&scaled);
        for (mode, lambda) in modes.iter_mut().zip(self.eigenvalues.iter()) {
            *mode *= (lambda * dt).exp();
        }
        Ok((&self.eigenvectors * modes).component_mul(&self.sqrt_p))
    }
}

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

/// Adaptive explicit Runge-Kutta 5(4) integration of `dp/dt = Q·p`.
///
/// Works for any generator, reversible or not, but the step size is bounded
/// by the fastest rate in the system.
#[derive(Debug, Clone)]
pub struct DormandPrince {
    generator: DMatrix<f64>,
    tolerance: Tolerance,
    max_steps: usize,
    step: Option<f64>,
}

impl DormandPrince {
    pub const DEFAULT_MAX_STEPS: usize = 1_000_000;

    pub fn new(generator: DMatrix<f64>, tolerance: Tolerance) -> Self {
        Self {
            generator,
            tolerance,
            max_steps: Self::DEFAULT_MAX_STEPS,
            step: None,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn dim(&self) -> usize {
        self.generator.nrows()
    }

    fn initial_step(&self, dt: f64) -> f64 {
        let stiffness = self
            .generator
            .diagonal()
            .iter()
            .fold(0.0_f64, |acc, value| acc.max(value.abs()));
        if stiffness > 0.0 {
            (1.0 / stiffness).min(dt)
        } else {
            dt
        }
    }

    fn trial_step(&self, y: &DVector<f64>, h: f64) -> (DVector<f64>, f64) {
        let q = &self.generator;
        let k1 = q * y;
        let k2 = q * (y + &k1 * (h * A21));
        let k3 = q * (y + (&k1 * A31 + &k2 * A32) * h);
        let k4 = q * (y + (&k1 * A41 + &k2 * A42 + &k3 * A43) * h);
        let k5 = q * (y + (&k1 * A51 + &k2 * A52 + &k3 * A53 + &k4 * A54) * h);
        let k6 = q * (y + (&k1 * A61 + &k2 * A62 + &k3 * A63 + &k4 * A64 + &k5 * A65) * h);
        let y_next = y + (&k1 * B1 + &k3 * B3 + &k4 * B4 + &k5 * B5 + &k6 * B6) * h;
        let k7 = q * &y_next;
        let error = (&k1 * E1 + &k3 * E3 + &k4 * E4 + &k5 * E5 + &k6 * E6 + &k7 * E7) * h;

        let Tolerance { atol, rtol } = self.tolerance;
        let sum_sq: f64 = error
            .iter()
            .zip(y.iter().zip(y_next.iter()))
            .map(|(e, (a, b))| {
                let scale = atol + rtol * a.abs().max(b.abs());
                (e / scale).powi(2)
            })
            .sum();
        let norm = (sum_sq / y.len().max(1) as f64).sqrt();
        (y_next, norm)
    }
}

impl Propagator for DormandPrince {
    fn propagate(&mut self, p: &DVector<f64>, dt: f64) -> Result<DVector<f64>, KineticsError> {
        check_dimension(self.dim(), p)?;
        if dt <= 0.0 {
            return Ok(p.clone());
        }

        let mut y = p.clone();
        let mut t = 0.0;
        let mut h = self.step.unwrap_or_else(|| self.initial_step(dt));
        let mut steps = 0;

        while t < dt {
            if steps >= self.max_steps {
                return Err(KineticsError::StepLimitExceeded { time: dt, steps });
            }
            steps += 1;

            let remaining = dt - t;
            let last = h >= remaining;
            let h_try = if last { remaining } else { h };
            let (y_next, error) = self.trial_step(&y, h_try);

            let factor = if error == 0.0 {
                MAX_FACTOR
            } else if error.is_finite() {
                (SAFETY * error.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
            } else {
                MIN_FACTOR
            };

            if error <= 1.0 {
                y = y_next;
                t = if last { dt } else { t + h_try };
                if !last {
                    self.step = Some(h_try * factor);
                }
            }
            h = h_try * factor;
        }
        Ok(y)
    }
}

fn check_dimension(expected: usize, p: &DVector<f64>) -> Result<(), KineticsError> {
    if p.len() != expected {
        return Err(KineticsError::DimensionMismatch {
            expected,
            found: p.len(),
        });
    }
    Ok(())
}
