use crate::core::kinetics::equilibrium::stationary_distribution;
use crate::core::kinetics::rate_matrix::RateMatrix;
use crate::core::kinetics::trajectory::Trajectory;
use crate::core::kinetics::{KineticsError, Tolerance};
use crate::core::models::ids::NodeId;
use crate::core::models::node::NodeAttribute;
use crate::engine::error::LandscapeError;
use crate::engine::landscape::TrafoLandscape;
use nalgebra::DVector;
use tracing::{debug, instrument};

/// Absolute and relative slack of the normalization check on `p0`.
const NORMALIZATION_ATOL: f64 = 1e-8;
const NORMALIZATION_RTOL: f64 = 1e-5;

pub fn occupancies(landscape: &TrafoLandscape) -> (Vec<String>, Vec<f64>) {
    let graph = &landscape.graph;
    let mut minima: Vec<NodeId> = graph
        .nodes_iter()
        .filter(|(_, node)| node.active && node.is_local_minimum())
        .map(|(id, _)| id)
        .collect();
    graph.sort_ids(&mut minima, NodeAttribute::Energy, false);

    minima
        .into_iter()
        .filter_map(|id| graph.node(id))
        .map(|node| (node.key.clone(), node.occupancy))
        .unzip()
}

/// Rate matrix over `nodes` with `R[(target, source)]` set to the coarse rate.
pub fn rate_matrix(
    landscape: &TrafoLandscape,
    nodes: &[String],
) -> Result<RateMatrix, LandscapeError> {
    let graph = &landscape.graph;
    let ids = nodes
        .iter()
        .map(|key| graph.require(key))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RateMatrix::from_fn(ids.len(), |source, target| {
        graph.coarse_rate_by_id(ids[source], ids[target])
    })?)
}

pub fn equilibrium(
    landscape: &TrafoLandscape,
    nodes: &[String],
) -> Result<Vec<f64>, LandscapeError> {
    let matrix = rate_matrix(landscape, nodes)?;
    Ok(stationary_distribution(&matrix)?.as_slice().to_vec())
}

#[instrument(skip_all, name = "simulation_task", fields(dim = nodes.len()))]
pub fn simulate(
    landscape: &TrafoLandscape,
    nodes: &[String],
    p0: &[f64],
    times: &[f64],
    force: &[f64],
    tolerance: Tolerance,
) -> Result<Trajectory, LandscapeError> {
    if nodes.len() != p0.len() {
        return Err(LandscapeError::LengthMismatch {
            nodes: nodes.len(),
            values: p0.len(),
        });
    }
    let sum: f64 = p0.iter().sum();
    if (sum - 1.0).abs() > NORMALIZATION_ATOL + NORMALIZATION_RTOL {
        return Err(LandscapeError::NotNormalized { sum });
    }

    let schedule = sample_times(times, force)?;
    let matrix = rate_matrix(landscape, nodes)?;
    debug!(
        samples = schedule.len(),
        t_max = schedule.last().copied().unwrap_or_default(),
        "Simulating coarse network."
    );
    Ok(Trajectory::new(
        &matrix,
        DVector::from_column_slice(p0),
        &schedule,
        tolerance,
    )?)
}

/// Ascending union of `times` and the `force` times from `times[0]` on.
fn sample_times(times: &[f64], force: &[f64]) -> Result<Vec<f64>, KineticsError> {
    let Some(&first) = times.first() else {
        return Err(KineticsError::InvalidTimes("no sample times given".into()));
    };
    let mut schedule: Vec<f64> = times
        .iter()
        .chain(force.iter().filter(|&&t| t >= first))
        .copied()
        .collect();
    schedule.sort_by(f64::total_cmp);
    schedule.dedup();
    Ok(schedule)
}
