use super::propagator::{DormandPrince, Propagator, SpectralPropagator};
use super::rate_matrix::RateMatrix;
use super::{KineticsError, Tolerance};
use nalgebra::DVector;
use tracing::{debug, warn};

enum Stepper {
    Trivial,
    Spectral(SpectralPropagator),
    Adaptive(DormandPrince),
}

/// Lazy forward simulation over an ascending list of sample times.
///
/// The initial distribution sits at `t = 0`. Each call to `next` advances the
/// state to the following sample time and yields `(time, p(time))`. Dropping the
/// trajectory early has no side effects. After an error the trajectory is
/// exhausted.
pub struct Trajectory {
    samples: std::vec::IntoIter<f64>,
    clock: f64,
    state: DVector<f64>,
    stepper: Stepper,
    generator: Option<nalgebra::DMatrix<f64>>,
    tolerance: Tolerance,
    finished: bool,
}

impl Trajectory {
    pub fn new(
        matrix: &RateMatrix,
        p0: DVector<f64>,
        times: &[f64],
        tolerance: Tolerance,
    ) -> Result<Self, KineticsError> {
        let dim = matrix.dim();
        if dim == 0 {
            return Err(KineticsError::Empty);
        }
        if p0.len() != dim {
            return Err(KineticsError::DimensionMismatch {
                expected: dim,
                found: p0.len(),
            });
        }
        validate_times(times)?;

        let stepper = if dim == 1 {
            Stepper::Trivial
        } else {
            match SpectralPropagator::new(matrix) {
                Ok(spectral) => Stepper::Spectral(spectral),
                Err(reason) => {
                    debug!(%reason, "Spectral propagation unavailable, integrating adaptively.");
                    Stepper::Adaptive(DormandPrince::new(matrix.generator(), tolerance))
                }
            }
        };
        let generator = match stepper {
            Stepper::Spectral(_) => Some(matrix.generator()),
            _ => None,
        };

        Ok(Self {
            samples: times.to_vec().into_iter(),
            clock: 0.0,
            state: p0,
            stepper,
            generator,
            tolerance,
            finished: false,
        })
    }

    fn advance(&mut self, time: f64) -> Result<DVector<f64>, KineticsError> {
        let dt = time - self.clock;
        match &mut self.stepper {
            Stepper::Trivial => Ok(DVector::from_element(1, 1.0)),
            _ if dt <= 0.0 => Ok(self.state.clone()),
            Stepper::Spectral(spectral) => {
                let p = spectral.propagate(&self.state, dt)?;
                if is_probability(&p, &self.tolerance) {
                    return Ok(clamp(p));
                }
                warn!(
                    time,
                    "Spectral propagation lost accuracy, switching to adaptive integration."
                );
                let generator = self.generator.take().ok_or(KineticsError::Empty)?;
                let mut adaptive = DormandPrince::new(generator, self.tolerance);
                let p = adaptive.propagate(&self.state, dt)?;
                self.stepper = Stepper::Adaptive(adaptive);
                Ok(clamp(p))
            }
            Stepper::Adaptive(adaptive) => Ok(clamp(adaptive.propagate(&self.state, dt)?)),
        }
    }
}

impl Iterator for Trajectory {
    type Item = Result<(f64, DVector<f64>), KineticsError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let time = self.samples.next()?;
        match self.advance(time) {
            Ok(p) => {
                self.clock = time;
                self.state = p.clone();
                Some(Ok((time, p)))
            }
            Err(error) => {
                self.finished = true;
                Some(Err(error))
            }
        }
    }
}

fn validate_times(times: &[f64]) -> Result<(), KineticsError> {
    if times.is_empty() {
        return Err(KineticsError::InvalidTimes("no sample times given".into()));
    }
    if let Some(bad) = times.iter().find(|t| !t.is_finite() || **t < 0.0) {
        return Err(KineticsError::InvalidTimes(format!(
            "sample time {bad} is not a finite, non-negative number"
        )));
    }
    if let Some(pair) = times.windows(2).find(|pair| pair[1] <= pair[0]) {
        return Err(KineticsError::InvalidTimes(format!(
            "sample times must increase strictly, found {} after {}",
            pair[1], pair[0]
        )));
    }
    Ok(())
}

fn is_probability(p: &DVector<f64>, tolerance: &Tolerance) -> bool {
    p.iter().all(|value| value.is_finite() && *value >= -tolerance.atol)
        && (p.sum() - 1.0).abs() <= tolerance.atol + tolerance.rtol
}

fn clamp(p: DVector<f64>) -> DVector<f64> {
    p.map(|value| value.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_state(forward: f64, backward: f64) -> RateMatrix {
        RateMatrix::from_fn(2, |s, _| if s == 0 { forward } else { backward }).unwrap()
    }

    #[test]
    fn samples_are_yielded_in_order() {
        let matrix = two_state(1.0, 1.0);
        let p0 = DVector::from_vec(vec![1.0, 0.0]);
        let times = [0.0, 0.5, 1.0, 100.0];
        let samples: Vec<_> = Trajectory::new(&matrix, p0, &times, Tolerance::default())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        let times: Vec<f64> = samples.iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![0.0, 0.5, 1.0, 100.0]);
        assert_eq!(samples[0].1.as_slice(), &[1.0, 0.0]);
        let (_, last) = &samples[3];
        assert_relative_eq!(last[0], 0.5, epsilon = 1e-9);
        assert_relative_eq!(last[1], 0.5, epsilon = 1e-9);
    }

    #[test]
    fn intermediate_samples_follow_the_analytic_solution() {
        let matrix = two_state(3.0, 1.0);
        let p0 = DVector::from_vec(vec![1.0, 0.0]);
        let trajectory =
            Trajectory::new(&matrix, p0, &[0.1, 0.2, 0.4], Tolerance::default()).unwrap();
        for sample in trajectory {
            let (t, p) = sample.unwrap();
            let expected = 0.75 * (1.0 - (-4.0 * t).exp());
            assert_relative_eq!(p[1], expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn single_state_is_certain_at_every_time() {
        let matrix = RateMatrix::from_fn(1, |_, _| 0.0).unwrap();
        let samples: Vec<_> = Trajectory::new(
            &matrix,
            DVector::from_element(1, 1.0),
            &[1.0, 2.0],
            Tolerance::default(),
        )
        .unwrap()
        .map(Result::unwrap)
        .collect();

        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|(_, p)| p.as_slice() == [1.0]));
    }

    #[test]
    fn irreversible_system_is_integrated_adaptively() {
        let matrix = RateMatrix::from_fn(2, |s, _| if s == 0 { 1.0 } else { 0.0 }).unwrap();
        let tolerance = Tolerance {
            atol: 1e-9,
            rtol: 1e-9,
        };
        let (t, p) = Trajectory::new(&matrix, DVector::from_vec(vec![1.0, 0.0]), &[1.0], tolerance)
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(t, 1.0);
        assert_relative_eq!(p[0], (-1.0_f64).exp(), epsilon = 1e-6);
    }

    #[test]
    fn consumer_may_stop_early() {
        let matrix = two_state(1.0, 2.0);
        let mut trajectory = Trajectory::new(
            &matrix,
            DVector::from_vec(vec![0.5, 0.5]),
            &[1.0, 2.0, 3.0],
            Tolerance::default(),
        )
        .unwrap();
        assert!(trajectory.next().is_some());
        drop(trajectory);
    }

    #[test]
    fn invalid_schedules_are_rejected() {
        let matrix = two_state(1.0, 1.0);
        let p0 = DVector::from_vec(vec![1.0, 0.0]);
        for times in [&[][..], &[1.0, 1.0][..], &[2.0, 1.0][..], &[-1.0][..], &[f64::NAN][..]] {
            assert!(matches!(
                Trajectory::new(&matrix, p0.clone(), times, Tolerance::default()),
                Err(KineticsError::InvalidTimes(_))
            ));
        }
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let matrix = two_state(1.0, 1.0);
        assert!(matches!(
            Trajectory::new(
                &matrix,
                DVector::from_element(3, 1.0 / 3.0),
                &[1.0],
                Tolerance::default()
            ),
            Err(KineticsError::DimensionMismatch {
                expected: 2,
                found: 3
            })
        ));
    }
}
