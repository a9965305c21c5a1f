use super::pruning::transfer_occupancy;
use crate::core::energy::thermo::arrhenius_rate;
use crate::core::folding::traits::{NodeEnergies, SaddleEnergies};
use crate::core::models::edge::CoarseEdge;
use crate::core::models::graph::LandscapeGraph;
use crate::core::models::ids::NodeId;
use crate::engine::config::HiddenNodePolicy;
use crate::engine::error::LandscapeError;
use crate::engine::landscape::TrafoLandscape;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument, trace};

#[instrument(skip_all, name = "coarse_graining_task")]
pub fn run(landscape: &mut TrafoLandscape) -> Result<(usize, usize), LandscapeError> {
    let min_barrier = landscape.config.min_barrier;
    let k0 = landscape.config.rate_constant;
    let rt = landscape.config.rt();
    let hidden_policy = landscape.config.hidden_nodes;

    reset_partition(&mut landscape.graph)?;

    let (nodes, edges) = active_subgraph(&landscape.graph);
    let result = landscape
        .toolkit
        .coarse_graining
        .coarse_grain(&nodes, &edges, min_barrier);

    let graph = &mut landscape.graph;
    let mut representatives = HashSet::with_capacity(result.nodes.len());
    for key in result.nodes.keys().chain(result.mapping.keys()) {
        representatives.insert(require_active(graph, key)?);
    }

    let mut partition = Vec::with_capacity(result.mapping.len());
    for (rep_key, hidden_keys) in &result.mapping {
        let rep = require_active(graph, rep_key)?;
        let mut hidden = HashSet::with_capacity(hidden_keys.len());
        for hidden_key in hidden_keys {
            let id = require_active(graph, hidden_key)?;
            if representatives.contains(&id) {
                return Err(LandscapeError::RepresentativeHidden {
                    key: hidden_key.clone(),
                });
            }
            hidden.insert(id);
        }
        partition.push((rep, hidden));
    }

    let mut coarse_edges = HashMap::with_capacity(result.edges.len());
    for ((a, b), &saddle) in &result.edges {
        if a == b || !result.nodes.contains_key(a) || !result.nodes.contains_key(b) {
            return Err(LandscapeError::InvalidCollaboratorOutput(format!(
                "coarse edge ({a}, {b}) does not connect two distinct representatives"
            )));
        }
        let source = require_active(graph, a)?;
        let target = require_active(graph, b)?;
        let energy = graph.require_node(source)?.energy;
        let weight = arrhenius_rate(k0, energy, saddle, rt);
        coarse_edges.insert((source, target), CoarseEdge::new(saddle, weight));
    }

    let coarse_edge_count = coarse_edges.len();
    graph.replace_coarse_edges(coarse_edges);
    for (rep, hidden) in partition {
        for &id in &hidden {
            graph.require_node_mut(id)?.lminreps.insert(rep);
        }
        graph.require_node_mut(rep)?.hiddennodes = hidden;
    }

    migrate_hidden_occupancy(graph, hidden_policy)?;

    let representatives = result.nodes.len();
    info!(
        active = nodes.len(),
        representatives,
        coarse_edges = coarse_edge_count,
        "Built coarse network."
    );
    Ok((representatives, coarse_edge_count))
}

/// Clears the previous partition and releases occupancy still held by
/// inactive nodes to their transfer targets.
fn reset_partition(graph: &mut LandscapeGraph) -> Result<(), LandscapeError> {
    let mut stranded = Vec::new();
    for (id, node) in graph.nodes_iter_mut() {
        node.lminreps.clear();
        node.hiddennodes.clear();
        if !node.active && node.occupancy != 0.0 {
            stranded.push(id);
        }
    }
    if !stranded.is_empty() {
        debug!(nodes = stranded.len(), "Releasing occupancy of inactive nodes.");
    }
    for id in stranded {
        transfer_occupancy(graph, id)?;
    }
    Ok(())
}

/// Energies of the active nodes and saddles of the fine edges between them.
fn active_subgraph(graph: &LandscapeGraph) -> (NodeEnergies, SaddleEnergies) {
    let nodes: NodeEnergies = graph
        .nodes_iter()
        .filter(|(_, node)| node.active)
        .map(|(_, node)| (node.key.clone(), node.energy))
        .collect();
    let edges: SaddleEnergies = graph
        .edges_iter()
        .filter_map(|(&(a, b), edge)| {
            let (source, target) = (graph.node(a)?, graph.node(b)?);
            let saddle = edge.saddle_energy()?;
            (source.active && target.active)
                .then(|| ((source.key.clone(), target.key.clone()), saddle))
        })
        .collect();
    (nodes, edges)
}

fn require_active(graph: &LandscapeGraph, key: &str) -> Result<NodeId, LandscapeError> {
    let Some(id) = graph.id_of(key) else {
        return Err(LandscapeError::UnknownRepresentative {
            key: key.to_string(),
        });
    };
    if !graph.require_node(id)?.active {
        return Err(LandscapeError::InactiveRepresentative {
            key: key.to_string(),
        });
    }
    Ok(id)
}

/// Splits the occupancy of every hidden node evenly among its representatives.
fn migrate_hidden_occupancy(
    graph: &mut LandscapeGraph,
    policy: HiddenNodePolicy,
) -> Result<(), LandscapeError> {
    let hidden: Vec<NodeId> = graph
        .nodes_iter()
        .filter(|(_, node)| node.is_hidden())
        .map(|(id, _)| id)
        .collect();

    for id in hidden {
        let node = graph.require_node(id)?;
        if !node.active && node.occupancy != 0.0 {
            return Err(LandscapeError::HiddenNodeOccupied {
                key: node.key.clone(),
                occupancy: node.occupancy,
            });
        }
        let occupancy = node.occupancy;
        let representatives: Vec<NodeId> = node.lminreps.iter().copied().collect();
        if occupancy != 0.0 {
            let share = occupancy / representatives.len() as f64;
            for rep in representatives {
                graph.require_node_mut(rep)?.occupancy += share;
            }
            trace!(key = graph.key_of(id), occupancy, "Moved hidden occupancy to representatives.");
        }

        let node = graph.require_node_mut(id)?;
        node.occupancy = 0.0;
        if policy == HiddenNodePolicy::Deactivate {
            node.active = false;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::folding::traits::{CoarseGrainedGraph, CoarseGraining};
    use crate::core::models::edge::EdgeUpdate;
    use crate::core::models::node::NodeAttributes;
    use crate::engine::config::{LandscapeConfigBuilder, OccupancyTransfer};
    use crate::testing::{MockToolkit, landscape, landscape_with};
    use approx::assert_relative_eq;
    use std::collections::BTreeSet;

    /// Three nodes where `B` sits in a shallow well next to `A`.
    fn shallow_landscape(min_barrier: i32) -> TrafoLandscape {
        let config = LandscapeConfigBuilder::new()
            .min_barrier(min_barrier)
            .build()
            .unwrap();
        let mut tl = landscape_with("GGGAAACCC", config);
        tl.add_node("A", NodeAttributes::new().with_energy(-300).with_occupancy(0.5))
            .unwrap();
        tl.add_node("B", NodeAttributes::new().with_energy(-100).with_occupancy(0.2))
            .unwrap();
        tl.add_node("C", NodeAttributes::new().with_energy(-250).with_occupancy(0.3))
            .unwrap();
        for (a, b, saddle) in [("A", "B", -80), ("B", "C", 200)] {
            tl.add_edge(a, b, EdgeUpdate::saddle(saddle)).unwrap();
            tl.add_edge(b, a, EdgeUpdate::saddle(saddle)).unwrap();
        }
        tl
    }

    #[test]
    fn zero_barrier_keeps_every_node_as_minimum() {
        let mut tl = shallow_landscape(0);
        let (reps, edges) = tl.build_coarse_network().unwrap();

        assert_eq!(reps, 3);
        assert_eq!(edges, 4);
        assert!(tl.hidden_nodes().is_empty());
        assert_eq!(tl.active_local_minima().len(), 3);
        assert_relative_eq!(tl.node("B").unwrap().occupancy(), 0.2);
    }

    #[test]
    fn coarse_weights_follow_arrhenius() {
        let mut tl = shallow_landscape(0);
        tl.build_coarse_network().unwrap();

        let rt = tl.rt();
        let (_, _, a_to_b) = tl
            .coarse_edges()
            .find(|(a, b, _)| *a == "A" && *b == "B")
            .unwrap();
        assert_eq!(a_to_b.saddle_energy(), -80);
        assert_relative_eq!(a_to_b.weight(), 2e5 * (-2.2 / rt).exp(), max_relative = 1e-12);
        assert_eq!(tl.coarse_saddle("B", "A"), Some(-80));
    }

    #[test]
    fn hidden_node_occupancy_moves_to_its_representative() {
        let mut tl = shallow_landscape(100);
        let (reps, edges) = tl.build_coarse_network().unwrap();

        assert_eq!(reps, 2);
        assert_eq!(edges, 2);
        assert_eq!(tl.hidden_nodes(), vec!["B"]);
        assert_eq!(tl.lminreps("B").unwrap(), BTreeSet::from(["A"]));
        assert_eq!(tl.hiddennodes("A").unwrap(), BTreeSet::from(["B"]));

        let b = tl.node("B").unwrap();
        assert_eq!(b.occupancy(), 0.0);
        assert!(!b.is_active());
        assert_relative_eq!(tl.node("A").unwrap().occupancy(), 0.7);
        assert_relative_eq!(tl.total_occupancy(), 1.0);
        assert_eq!(tl.coarse_saddle("A", "C"), Some(200));
    }

    #[test]
    fn keep_active_policy_leaves_hidden_nodes_active() {
        let config = LandscapeConfigBuilder::new()
            .min_barrier(100)
            .hidden_nodes(HiddenNodePolicy::KeepActive)
            .build()
            .unwrap();
        let mut tl = shallow_landscape(100);
        tl.config = config;
        tl.build_coarse_network().unwrap();

        let b = tl.node("B").unwrap();
        assert!(b.is_active());
        assert_eq!(b.occupancy(), 0.0);
        assert_eq!(tl.active_local_minima(), vec!["A", "C"]);
    }

    #[test]
    fn repeated_coarse_graining_clears_previous_partition() {
        let mut tl = shallow_landscape(100);
        tl.build_coarse_network().unwrap();
        tl.config.min_barrier = 0;
        let (reps, _) = tl.build_coarse_network().unwrap();

        // B was deactivated in the first round and is no longer part of the graph.
        assert_eq!(reps, 2);
        assert!(tl.hidden_nodes().is_empty());
        assert!(tl.hiddennodes("A").unwrap().is_empty());
    }

    #[test]
    fn deferred_occupancy_is_released_before_partitioning() {
        let config = LandscapeConfigBuilder::new()
            .occupancy_transfer(OccupancyTransfer::OnCoarseGraining)
            .build()
            .unwrap();
        let mut tl = landscape_with("GGGAAACCC", config);
        tl.add_node("A", NodeAttributes::new().with_energy(-300).with_occupancy(0.6))
            .unwrap();
        let b = tl
            .add_node("B", NodeAttributes::new().with_energy(-100).with_occupancy(0.4).inactive())
            .unwrap();
        let a = tl.graph.require("A").unwrap();
        tl.graph.node_mut(b).unwrap().occtransfer.insert(a);

        tl.build_coarse_network().unwrap();
        assert_relative_eq!(tl.node("A").unwrap().occupancy(), 1.0);
        assert_eq!(tl.node("B").unwrap().occupancy(), 0.0);
    }

    #[test]
    fn stranded_occupancy_without_targets_is_a_fault() {
        let mut tl = landscape("GGGAAACCC");
        tl.add_node("A", NodeAttributes::new().with_energy(-300).with_occupancy(0.6))
            .unwrap();
        tl.add_node("B", NodeAttributes::new().with_energy(-100).with_occupancy(0.4).inactive())
            .unwrap();

        let error = tl.build_coarse_network().unwrap_err();
        assert!(matches!(error, LandscapeError::NoTransferTarget { ref key } if key == "B"));
        assert!(error.is_internal_fault());
    }

    struct Rogue(CoarseGrainedGraph);

    impl CoarseGraining for Rogue {
        fn coarse_grain(&self, _: &NodeEnergies, _: &SaddleEnergies, _: i32) -> CoarseGrainedGraph {
            self.0.clone()
        }
    }

    fn with_rogue(result: CoarseGrainedGraph) -> TrafoLandscape {
        let toolkit = MockToolkit::default()
            .build()
            .with_coarse_graining(Box::new(Rogue(result)));
        let mut tl = TrafoLandscape::new("GGGAAACCC", Default::default(), toolkit);
        tl.add_node("A", NodeAttributes::new().with_energy(-300).with_occupancy(1.0))
            .unwrap();
        tl.add_node("B", NodeAttributes::new().with_energy(-100).inactive())
            .unwrap();
        tl.add_node("C", NodeAttributes::new().with_energy(-200))
            .unwrap();
        tl
    }

    #[test]
    fn unknown_representatives_are_rejected() {
        let mut result = CoarseGrainedGraph::default();
        result.nodes.insert("Z".into(), -10);
        let error = with_rogue(result).build_coarse_network().unwrap_err();
        assert!(matches!(error, LandscapeError::UnknownRepresentative { .. }));
    }

    #[test]
    fn inactive_representatives_are_rejected() {
        let mut result = CoarseGrainedGraph::default();
        result.nodes.insert("B".into(), -100);
        let error = with_rogue(result).build_coarse_network().unwrap_err();
        assert!(matches!(error, LandscapeError::InactiveRepresentative { .. }));
    }

    #[test]
    fn self_hiding_representative_is_rejected() {
        let mut result = CoarseGrainedGraph::default();
        result.nodes.insert("A".into(), -300);
        result
            .mapping
            .insert("A".into(), BTreeSet::from(["A".to_string()]));
        let error = with_rogue(result).build_coarse_network().unwrap_err();
        assert!(matches!(error, LandscapeError::RepresentativeHidden { .. }));
    }

    #[test]
    fn representative_hidden_by_another_is_rejected_without_side_effects() {
        let mut result = CoarseGrainedGraph::default();
        result.nodes.insert("A".into(), -300);
        result.nodes.insert("C".into(), -200);
        result
            .mapping
            .insert("A".into(), BTreeSet::from(["C".to_string()]));
        result.edges.insert(("A".into(), "C".into()), -50);
        let mut tl = with_rogue(result);

        let error = tl.build_coarse_network().unwrap_err();
        assert!(matches!(error, LandscapeError::RepresentativeHidden { ref key } if key == "C"));
        assert!(error.is_internal_fault());
        assert_eq!(tl.coarse_edge_count(), 0);
        assert!(tl.lminreps("C").unwrap().is_empty());
        assert!(tl.hiddennodes("A").unwrap().is_empty());
        assert!(tl.node("C").unwrap().is_active());
    }
}
