use super::traits::{CoarseGrainedGraph, CoarseGraining, NodeEnergies, SaddleEnergies};
use crate::core::energy::Energy;
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Top-down coarse-graining into local minima.
///
/// Nodes are visited from the highest to the lowest free energy. A node with at
/// least one neighbor of lower or equal energy that is reachable over a barrier
/// below `min_barrier` is hidden: every such neighbor becomes one of its
/// representatives and inherits the node's own hidden set, and the node's
/// neighbors are reconnected through it with saddle `max(s(a, n), s(n, b))`,
/// keeping a lower saddle if the pair was already connected.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopDownCoarseGraining;

impl CoarseGraining for TopDownCoarseGraining {
    fn coarse_grain(
        &self,
        nodes: &NodeEnergies,
        edges: &SaddleEnergies,
        min_barrier: Energy,
    ) -> CoarseGrainedGraph {
        let mut graph = WorkingGraph::new(nodes, edges);
        let mut mapping: BTreeMap<String, BTreeSet<String>> = nodes
            .keys()
            .map(|key| (key.clone(), BTreeSet::new()))
            .collect();

        if min_barrier <= 0 {
            return graph.into_result(nodes, mapping);
        }

        let order: Vec<&String> = nodes
            .iter()
            .sorted_by(|(ka, ea), (kb, eb)| eb.cmp(ea).then_with(|| kb.cmp(ka)))
            .map(|(key, _)| key)
            .collect();

        for node in order {
            let energy = nodes[node];
            let neighbors: Vec<String> = graph.neighbors(node).cloned().collect();

            let representatives: Vec<&String> = neighbors
                .iter()
                .filter(|nbr| nodes[nbr.as_str()] <= energy)
                .filter(|nbr| {
                    graph
                        .saddle(node, nbr)
                        .is_some_and(|saddle| saddle - energy < min_barrier)
                })
                .collect();

            if representatives.is_empty() {
                continue;
            }

            for (a, b) in neighbors.iter().tuple_combinations() {
                if let (Some(s_an), Some(s_nb)) = (graph.saddle(a, node), graph.saddle(node, b)) {
                    graph.connect(a, b, s_an.max(s_nb));
                }
                if let (Some(s_bn), Some(s_na)) = (graph.saddle(b, node), graph.saddle(node, a)) {
                    graph.connect(b, a, s_bn.max(s_na));
                }
            }

            let mut hidden = mapping.remove(node).unwrap_or_default();
            hidden.insert(node.clone());
            trace!(
                node = node.as_str(),
                representatives = representatives.len(),
                hidden = hidden.len(),
                "Hiding node behind lower neighbors."
            );
            for rep in representatives {
                if let Some(rep_hidden) = mapping.get_mut(rep.as_str()) {
                    rep_hidden.extend(hidden.iter().cloned());
                }
            }
            graph.remove(node);
        }

        graph.into_result(nodes, mapping)
    }
}

struct WorkingGraph {
    saddles: SaddleEnergies,
    neighbors: BTreeMap<String, BTreeSet<String>>,
}

impl WorkingGraph {
    fn new(nodes: &NodeEnergies, edges: &SaddleEnergies) -> Self {
        let mut graph = Self {
            saddles: SaddleEnergies::new(),
            neighbors: nodes
                .keys()
                .map(|key| (key.clone(), BTreeSet::new()))
                .collect(),
        };
        for ((a, b), &saddle) in edges {
            if a != b && nodes.contains_key(a) && nodes.contains_key(b) {
                graph.connect(a, b, saddle);
            }
        }
        graph
    }

    fn neighbors(&self, node: &str) -> impl Iterator<Item = &String> {
        self.neighbors.get(node).into_iter().flatten()
    }

    /// Saddle of the directed edge, falling back to the reverse direction.
    fn saddle(&self, a: &str, b: &str) -> Option<Energy> {
        let key = (a.to_string(), b.to_string());
        self.saddles
            .get(&key)
            .or_else(|| self.saddles.get(&(key.1, key.0)))
            .copied()
    }

    fn connect(&mut self, a: &str, b: &str, saddle: Energy) {
        self.saddles
            .entry((a.to_string(), b.to_string()))
            .and_modify(|existing| *existing = (*existing).min(saddle))
            .or_insert(saddle);
        self.neighbors
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string());
        self.neighbors
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string());
    }

    fn remove(&mut self, node: &str) {
        let neighbors = self.neighbors.remove(node).unwrap_or_default();
        for nbr in neighbors {
            if let Some(set) = self.neighbors.get_mut(&nbr) {
                set.remove(node);
            }
            self.saddles.remove(&(node.to_string(), nbr.clone()));
            self.saddles.remove(&(nbr, node.to_string()));
        }
    }

    fn into_result(
        self,
        nodes: &NodeEnergies,
        mapping: BTreeMap<String, BTreeSet<String>>,
    ) -> CoarseGrainedGraph {
        let representatives: NodeEnergies = mapping
            .keys()
            .filter_map(|key| nodes.get(key).map(|&energy| (key.clone(), energy)))
            .collect();
        CoarseGrainedGraph {
            nodes: representatives,
            edges: self.saddles,
            mapping,
        }
    }
}
