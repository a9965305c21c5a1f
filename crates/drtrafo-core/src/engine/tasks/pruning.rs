use crate::core::models::graph::LandscapeGraph;
use crate::core::models::ids::NodeId;
use crate::core::models::node::NodeAttribute;
use crate::engine::config::OccupancyTransfer;
use crate::engine::error::LandscapeError;
use crate::engine::landscape::TrafoLandscape;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, instrument, trace};

/// Nodes affected by one pruning round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pruning {
    /// Nodes that became inactive during this round, hidden nodes included.
    pub pruned: BTreeSet<String>,
    /// Nodes evicted from the landscape during this round.
    pub deleted: BTreeSet<String>,
}

#[instrument(skip_all, name = "pruning_task", fields(p_min = p_min, delth = delth))]
pub fn run(
    landscape: &mut TrafoLandscape,
    p_min: f64,
    delth: u32,
    keep: &HashSet<String>,
) -> Result<Pruning, LandscapeError> {
    let transfer_policy = landscape.config.occupancy_transfer;
    let graph = &mut landscape.graph;

    let deactivated = deactivate_minima(graph, p_min, keep)?;

    let successors = graph.coarse_successors();
    for &id in &deactivated {
        let targets = nearest_active_successors(graph, &successors, id);
        let node = graph.require_node_mut(id)?;
        if targets.is_empty() {
            return Err(LandscapeError::NoTransferTarget {
                key: node.key.clone(),
            });
        }
        trace!(
            key = node.key.as_str(),
            targets = targets.len(),
            "Assigned occupancy transfer targets."
        );
        node.occtransfer = targets;
    }
    if transfer_policy == OccupancyTransfer::OnPrune {
        for &id in &deactivated {
            transfer_occupancy(graph, id)?;
        }
    }

    let mut result = Pruning::default();
    for id in graph.node_ids() {
        let node = graph.require_node_mut(id)?;
        if node.active {
            node.pruned = 0;
            continue;
        }
        node.pruned += 1;
        if node.pruned == 1 {
            result.pruned.insert(node.key.clone());
        }
        if node.pruned > delth {
            if node.occupancy != 0.0 {
                transfer_occupancy(graph, id)?;
            }
            if let Some(evicted) = graph.remove_node(id) {
                debug!(key = evicted.key(), "Evicted node.");
                result.deleted.insert(evicted.key);
            }
        }
    }

    info!(
        deactivated = deactivated.len(),
        pruned = result.pruned.len(),
        deleted = result.deleted.len(),
        nodes = graph.node_count(),
        "Pruned landscape."
    );
    Ok(result)
}

/// Deactivates the least occupied local minima, together with their hidden
/// nodes, as long as their summed occupancy stays within `p_min`.
fn deactivate_minima(
    graph: &mut LandscapeGraph,
    p_min: f64,
    keep: &HashSet<String>,
) -> Result<Vec<NodeId>, LandscapeError> {
    let mut minima: Vec<NodeId> = graph
        .nodes_iter()
        .filter(|(_, node)| node.active && node.is_local_minimum())
        .map(|(id, _)| id)
        .collect();
    graph.sort_ids(&mut minima, NodeAttribute::Occupancy, false);

    let mut shed = 0.0;
    let mut deactivated = Vec::new();
    for id in minima {
        let node = graph.require_node(id)?;
        if keep.contains(&node.key) {
            continue;
        }
        if shed + node.occupancy > p_min {
            break;
        }
        shed += node.occupancy;

        let hidden: Vec<NodeId> = node.hiddennodes.iter().copied().collect();
        for hidden_id in hidden {
            let hidden_node = graph.require_node_mut(hidden_id)?;
            if hidden_node.occupancy != 0.0 {
                return Err(LandscapeError::HiddenNodeOccupied {
                    key: hidden_node.key.clone(),
                    occupancy: hidden_node.occupancy,
                });
            }
            hidden_node.active = false;
        }
        graph.require_node_mut(id)?.active = false;
        deactivated.push(id);
    }
    Ok(deactivated)
}

/// Active nodes closest to `start` along outgoing coarse edges.
///
/// Searches breadth-first, passing only through inactive nodes, and returns
/// every active node of the first layer that contains any.
fn nearest_active_successors(
    graph: &LandscapeGraph,
    successors: &HashMap<NodeId, Vec<NodeId>>,
    start: NodeId,
) -> HashSet<NodeId> {
    let mut visited = HashSet::from([start]);
    let mut layer = vec![start];

    while !layer.is_empty() {
        let mut found = HashSet::new();
        let mut next = Vec::new();
        for node in layer {
            for &succ in successors.get(&node).into_iter().flatten() {
                if !visited.insert(succ) {
                    continue;
                }
                match graph.node(succ) {
                    Some(target) if target.active => {
                        found.insert(succ);
                    }
                    Some(_) => next.push(succ),
                    None => {}
                }
            }
        }
        if !found.is_empty() {
            return found;
        }
        layer = next;
    }
    HashSet::new()
}

/// Splits the occupancy of `id` evenly among its transfer targets.
pub(crate) fn transfer_occupancy(
    graph: &mut LandscapeGraph,
    id: NodeId,
) -> Result<(), LandscapeError> {
    let node = graph.require_node(id)?;
    if node.occupancy == 0.0 {
        return Ok(());
    }
    let occupancy = node.occupancy;
    let targets: Vec<NodeId> = node.occtransfer.iter().copied().collect();
    if targets.is_empty() {
        return Err(LandscapeError::NoTransferTarget {
            key: node.key.clone(),
        });
    }
    for &target in &targets {
        if !graph.require_node(target)?.active {
            return Err(LandscapeError::InactiveTransferTarget {
                key: graph.key_of(target).unwrap_or_default().to_string(),
                source_key: graph.key_of(id).unwrap_or_default().to_string(),
            });
        }
    }

    let share = occupancy / targets.len() as f64;
    for target in targets {
        graph.require_node_mut(target)?.occupancy += share;
    }
    graph.require_node_mut(id)?.occupancy = 0.0;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::edge::EdgeUpdate;
    use crate::core::models::node::NodeAttributes;
    use crate::engine::config::LandscapeConfigBuilder;
    use crate::testing::{landscape, landscape_with};
    use approx::assert_relative_eq;

    fn connect(tl: &mut TrafoLandscape, a: &str, b: &str, saddle: i32) {
        tl.add_edge(a, b, EdgeUpdate::saddle(saddle)).unwrap();
        tl.add_edge(b, a, EdgeUpdate::saddle(saddle)).unwrap();
    }

    fn two_minima(transfer: OccupancyTransfer) -> TrafoLandscape {
        let config = LandscapeConfigBuilder::new()
            .occupancy_transfer(transfer)
            .build()
            .unwrap();
        let mut tl = landscape_with("GGGAAACCC", config);
        tl.add_node("A", NodeAttributes::new().with_energy(-500).with_occupancy(0.7))
            .unwrap();
        tl.add_node("B", NodeAttributes::new().with_energy(-400).with_occupancy(0.3))
            .unwrap();
        connect(&mut tl, "A", "B", -200);
        tl.build_coarse_network().unwrap();
        tl
    }

    #[test]
    fn low_occupancy_minimum_hands_its_occupancy_to_its_neighbor() {
        let mut tl = two_minima(OccupancyTransfer::OnPrune);
        let result = tl.prune(0.3, 10, &HashSet::new()).unwrap();

        let a = tl.node("A").unwrap();
        let b = tl.node("B").unwrap();
        assert_relative_eq!(a.occupancy(), 1.0);
        assert!(a.is_active());
        assert_eq!(b.occupancy(), 0.0);
        assert!(!b.is_active());
        assert_eq!(b.pruned(), 1);
        assert_eq!(tl.occtransfer("B").unwrap(), BTreeSet::from(["A"]));
        assert_eq!(result.pruned, BTreeSet::from(["B".to_string()]));
        assert!(result.deleted.is_empty());
    }

    #[test]
    fn deferred_transfer_keeps_occupancy_until_next_coarse_graining() {
        let mut tl = two_minima(OccupancyTransfer::OnCoarseGraining);
        tl.prune(0.3, 10, &HashSet::new()).unwrap();

        assert_relative_eq!(tl.node("B").unwrap().occupancy(), 0.3);
        assert_relative_eq!(tl.total_occupancy(), 1.0);

        tl.build_coarse_network().unwrap();
        assert_relative_eq!(tl.node("A").unwrap().occupancy(), 1.0);
        assert_eq!(tl.node("B").unwrap().occupancy(), 0.0);
    }

    #[test]
    fn shedding_stops_before_exceeding_p_min() {
        let mut tl = two_minima(OccupancyTransfer::OnPrune);
        let result = tl.prune(0.29, 10, &HashSet::new()).unwrap();

        assert!(result.pruned.is_empty());
        assert!(tl.node("B").unwrap().is_active());
    }

    #[test]
    fn kept_minima_are_never_deactivated() {
        let mut tl = two_minima(OccupancyTransfer::OnPrune);
        let keep = HashSet::from(["B".to_string()]);
        tl.prune(0.5, 10, &keep).unwrap();
        assert!(tl.node("B").unwrap().is_active());
    }

    #[test]
    fn transfer_searches_through_inactive_minima() {
        // A - B - C chain where B is already inactive: C must reach A through B.
        let mut tl = landscape("GGGAAACCC");
        tl.add_node("A", NodeAttributes::new().with_energy(-500).with_occupancy(0.9))
            .unwrap();
        tl.add_node("B", NodeAttributes::new().with_energy(-400)).unwrap();
        tl.add_node("C", NodeAttributes::new().with_energy(-300).with_occupancy(0.1))
            .unwrap();
        connect(&mut tl, "A", "B", 0);
        connect(&mut tl, "B", "C", 0);
        tl.build_coarse_network().unwrap();

        // First round removes the empty minimum B only.
        tl.prune(0.0, 10, &HashSet::new()).unwrap();
        assert!(!tl.node("B").unwrap().is_active());

        tl.prune(0.1, 10, &HashSet::new()).unwrap();
        assert!(!tl.node("C").unwrap().is_active());
        assert_eq!(tl.occtransfer("C").unwrap(), BTreeSet::from(["A"]));
        assert_relative_eq!(tl.node("A").unwrap().occupancy(), 1.0);
    }

    #[test]
    fn isolated_minimum_cannot_be_deactivated() {
        let mut tl = landscape("GGGAAACCC");
        tl.add_node("A", NodeAttributes::new().with_energy(-500).with_occupancy(0.9))
            .unwrap();
        tl.add_node("B", NodeAttributes::new().with_energy(-400).with_occupancy(0.1))
            .unwrap();
        tl.build_coarse_network().unwrap();

        let error = tl.prune(0.2, 10, &HashSet::new()).unwrap_err();
        assert!(matches!(error, LandscapeError::NoTransferTarget { ref key } if key == "B"));
    }

    #[test]
    fn hidden_nodes_follow_their_representative() {
        let config = LandscapeConfigBuilder::new().min_barrier(100).build().unwrap();
        let mut tl = landscape_with("GGGAAACCC", config);
        tl.add_node("A", NodeAttributes::new().with_energy(-500).with_occupancy(0.95))
            .unwrap();
        tl.add_node("B", NodeAttributes::new().with_energy(-300).with_occupancy(0.04))
            .unwrap();
        tl.add_node("H", NodeAttributes::new().with_energy(-250).with_occupancy(0.01))
            .unwrap();
        connect(&mut tl, "A", "B", 0);
        connect(&mut tl, "B", "H", -240);
        tl.build_coarse_network().unwrap();
        assert_eq!(tl.lminreps("H").unwrap(), BTreeSet::from(["B"]));

        let result = tl.prune(0.06, 10, &HashSet::new()).unwrap();
        assert_eq!(
            result.pruned,
            BTreeSet::from(["B".to_string(), "H".to_string()])
        );
        assert_relative_eq!(tl.node("A").unwrap().occupancy(), 1.0);
    }

    #[test]
    fn inactive_nodes_are_evicted_after_delth_rounds() {
        let mut tl = landscape("GGGAAACCC");
        tl.add_node("A", NodeAttributes::new().with_energy(-500).with_occupancy(1.0))
            .unwrap();
        tl.add_node("X", NodeAttributes::new().with_energy(-100).inactive())
            .unwrap();
        connect(&mut tl, "A", "X", 0);

        for round in 1..=3 {
            let result = tl.prune(0.0, 3, &HashSet::new()).unwrap();
            assert_eq!(tl.node("X").unwrap().pruned(), round);
            assert_eq!(result.pruned.contains("X"), round == 1);
            assert!(result.deleted.is_empty());
            assert_eq!(tl.node("A").unwrap().pruned(), 0);
        }
        assert_eq!(tl.edge_count(), 2);

        let result = tl.prune(0.0, 3, &HashSet::new()).unwrap();
        assert_eq!(result.deleted, BTreeSet::from(["X".to_string()]));
        assert!(!tl.has_node("X"));
        assert_eq!(tl.edge_count(), 0);
        assert!(tl.node("A").is_some());
    }

    #[test]
    fn delth_zero_evicts_deferred_occupancy_holders_without_losing_mass() {
        let mut tl = two_minima(OccupancyTransfer::OnCoarseGraining);
        let result = tl.prune(0.3, 0, &HashSet::new()).unwrap();

        assert_eq!(result.deleted, BTreeSet::from(["B".to_string()]));
        assert_relative_eq!(tl.node("A").unwrap().occupancy(), 1.0);
        assert_relative_eq!(tl.total_occupancy(), 1.0);
    }
}
