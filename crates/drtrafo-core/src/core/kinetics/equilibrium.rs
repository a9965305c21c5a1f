use super::KineticsError;
use super::rate_matrix::RateMatrix;
use nalgebra::DVector;
use std::collections::VecDeque;

/// Stationary distribution of a reversible rate matrix.
///
/// Walks the transition graph breadth-first from state 0 and assigns
/// `ln p_j = ln p_i + ln k(i→j) - ln k(j→i)` along each discovered edge, then
/// normalizes. Working in log space keeps barriers of many kcal/mol from
/// underflowing.
pub fn stationary_distribution(matrix: &RateMatrix) -> Result<DVector<f64>, KineticsError> {
    let dim = matrix.dim();
    if dim == 0 {
        return Err(KineticsError::Empty);
    }

    let mut log_p: Vec<Option<f64>> = vec![None; dim];
    log_p[0] = Some(0.0);
    let mut queue = VecDeque::from([0]);

    while let Some(i) = queue.pop_front() {
        let Some(log_pi) = log_p[i] else { continue };
        for j in 0..dim {
            if i == j {
                continue;
            }
            let forward = matrix.rate(i, j);
            let backward = matrix.rate(j, i);
            if forward <= 0.0 && backward <= 0.0 {
                continue;
            }
            if forward <= 0.0 || backward <= 0.0 {
                return Err(KineticsError::NotReversible {
                    source_index: if forward > 0.0 { i } else { j },
                    target: if forward > 0.0 { j } else { i },
                });
            }
            if log_p[j].is_none() {
                log_p[j] = Some(log_pi + forward.ln() - backward.ln());
                queue.push_back(j);
            }
        }
    }

    let reachable = log_p.iter().filter(|value| value.is_some()).count();
    if reachable < dim {
        return Err(KineticsError::Disconnected { reachable, dim });
    }

    let logs: Vec<f64> = log_p.into_iter().flatten().collect();
    let max = logs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let weights = DVector::from_iterator(dim, logs.iter().map(|value| (value - max).exp()));
    let total = weights.sum();
    Ok(weights / total)
}
