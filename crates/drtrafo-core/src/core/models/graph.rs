use crate::core::energy::Energy;
use super::edge::{CoarseEdge, Edge, EdgeUpdate};
use super::ids::NodeId;
use super::node::{Node, NodeAttribute, NodeAttributes};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Node '{key}' already exists in the landscape")]
    DuplicateNode { key: String },

    #[error("Node '{key}' not found in the landscape")]
    NodeNotFound { key: String },

    #[error("Node '{key}' has neither an energy nor a structure to derive it from")]
    MissingEnergy { key: String },

    #[error("Node handle {0:?} does not belong to the landscape")]
    StaleNodeId(NodeId),
}

/// Arena-backed store of landscape nodes and their two edge sets.
///
/// Nodes live in a slot map and are indexed by their structure key. Edges are
/// keyed by ordered pairs of node ids; an undirected incidence list makes
/// removing a node together with all its edges proportional to its degree.
#[derive(Debug, Clone, Default)]
pub struct LandscapeGraph {
    /// Primary storage for nodes.
    nodes: SlotMap<NodeId, Node>,
    /// Lookup from structure key to node id.
    key_map: HashMap<String, NodeId>,
    /// Fine-grained transition edges.
    edges: HashMap<(NodeId, NodeId), Edge>,
    /// Edges between local-minimum representatives.
    coarse_edges: HashMap<(NodeId, NodeId), CoarseEdge>,
    /// Nodes sharing a fine or coarse edge with each node, in either direction.
    incidence: SecondaryMap<NodeId, HashSet<NodeId>>,
    identity_prefix: String,
    next_identity: u64,
}

impl LandscapeGraph {
    /// Creates an empty store whose generated identities start with `identity_prefix`.
    pub fn new(identity_prefix: impl Into<String>) -> Self {
        Self {
            identity_prefix: identity_prefix.into(),
            ..Self::default()
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn coarse_edge_count(&self) -> usize {
        self.coarse_edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn id_of(&self, key: &str) -> Option<NodeId> {
        self.key_map.get(key).copied()
    }

    /// Resolves a key, failing with [`ModelError::NodeNotFound`] if it is unknown.
    pub fn require(&self, key: &str) -> Result<NodeId, ModelError> {
        self.id_of(key).ok_or_else(|| ModelError::NodeNotFound {
            key: key.to_string(),
        })
    }

    pub fn key_of(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id).map(|node| node.key.as_str())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn require_node(&self, id: NodeId) -> Result<&Node, ModelError> {
        self.nodes.get(id).ok_or(ModelError::StaleNodeId(id))
    }

    pub(crate) fn require_node_mut(&mut self, id: NodeId) -> Result<&mut Node, ModelError> {
        self.nodes.get_mut(id).ok_or(ModelError::StaleNodeId(id))
    }

    pub fn node_by_key(&self, key: &str) -> Option<&Node> {
        self.id_of(key).and_then(|id| self.nodes.get(id))
    }

    pub fn has_node(&self, key: &str) -> bool {
        self.key_map.contains_key(key)
    }

    /// Returns an iterator over all nodes in arena slot order.
    ///
    /// Slots freed by eviction are reused, so this is not creation order.
    pub fn nodes_iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    pub(crate) fn nodes_iter_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut Node)> {
        self.nodes.iter_mut()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().collect()
    }

    /// Inserts a new node under `key`.
    ///
    /// The energy must already be resolved in `attrs`. If no identity is
    /// given, one is generated from the prefix and a counter that only grows.
    pub fn add_node(&mut self, key: &str, attrs: NodeAttributes) -> Result<NodeId, ModelError> {
        if self.key_map.contains_key(key) {
            return Err(ModelError::DuplicateNode {
                key: key.to_string(),
            });
        }
        let energy = attrs.energy.ok_or_else(|| ModelError::MissingEnergy {
            key: key.to_string(),
        })?;
        let identity = match attrs.identity {
            Some(identity) => identity,
            None => {
                let identity = format!("{}{}", self.identity_prefix, self.next_identity);
                self.next_identity += 1;
                identity
            }
        };

        let node = Node {
            key: key.to_string(),
            structure: attrs.structure,
            occupancy: attrs.occupancy,
            identity,
            energy,
            active: attrs.active,
            pruned: attrs.pruned,
            lminreps: HashSet::new(),
            hiddennodes: HashSet::new(),
            occtransfer: HashSet::new(),
        };
        let id = self.nodes.insert(node);
        self.key_map.insert(key.to_string(), id);
        self.incidence.insert(id, HashSet::new());
        Ok(id)
    }

    /// Creates the edge `n1 -> n2` or updates it in place.
    ///
    /// Repeated calls never duplicate the record; fields set in `update`
    /// overwrite the stored ones.
    pub fn add_edge(&mut self, n1: &str, n2: &str, update: EdgeUpdate) -> Result<(), ModelError> {
        let source = self.require(n1)?;
        let target = self.require(n2)?;
        self.add_edge_by_id(source, target, update);
        Ok(())
    }

    pub(crate) fn add_edge_by_id(&mut self, source: NodeId, target: NodeId, update: EdgeUpdate) {
        update.apply_to(self.edges.entry((source, target)).or_default());
        self.link(source, target);
    }

    fn link(&mut self, a: NodeId, b: NodeId) {
        if let Some(incident) = self.incidence.get_mut(a) {
            incident.insert(b);
        }
        if let Some(incident) = self.incidence.get_mut(b) {
            incident.insert(a);
        }
    }

    pub fn has_edge(&self, n1: &str, n2: &str) -> bool {
        self.edge(n1, n2).is_some()
    }

    pub fn edge(&self, n1: &str, n2: &str) -> Option<&Edge> {
        let source = self.id_of(n1)?;
        let target = self.id_of(n2)?;
        self.edges.get(&(source, target))
    }

    pub fn edge_by_id(&self, source: NodeId, target: NodeId) -> Option<&Edge> {
        self.edges.get(&(source, target))
    }

    pub fn edges_iter(&self) -> impl Iterator<Item = (&(NodeId, NodeId), &Edge)> {
        self.edges.iter()
    }

    /// Direct transition rate, zero when the edge or its weight is unknown.
    pub fn rate(&self, n1: &str, n2: &str) -> f64 {
        self.edge(n1, n2).and_then(Edge::weight).unwrap_or(0.0)
    }

    /// Saddle energy of a fine edge, `None` when the edge does not exist.
    pub fn saddle(&self, n1: &str, n2: &str) -> Option<Energy> {
        self.edge(n1, n2).and_then(Edge::saddle_energy)
    }

    pub fn has_coarse_edge(&self, n1: &str, n2: &str) -> bool {
        self.coarse_edge(n1, n2).is_some()
    }

    pub fn coarse_edge(&self, n1: &str, n2: &str) -> Option<&CoarseEdge> {
        let source = self.id_of(n1)?;
        let target = self.id_of(n2)?;
        self.coarse_edges.get(&(source, target))
    }

    pub fn coarse_edge_by_id(&self, source: NodeId, target: NodeId) -> Option<&CoarseEdge> {
        self.coarse_edges.get(&(source, target))
    }

    /// Saddle energy of a coarse edge, `None` when the edge does not exist.
    pub fn coarse_saddle(&self, n1: &str, n2: &str) -> Option<Energy> {
        self.coarse_edge(n1, n2).map(CoarseEdge::saddle_energy)
    }

    /// Coarse transition rate between two nodes, zero when they are not connected.
    pub fn coarse_rate_by_id(&self, source: NodeId, target: NodeId) -> f64 {
        self.coarse_edges
            .get(&(source, target))
            .map_or(0.0, CoarseEdge::weight)
    }

    pub fn coarse_edges_iter(&self) -> impl Iterator<Item = (&(NodeId, NodeId), &CoarseEdge)> {
        self.coarse_edges.iter()
    }

    /// Replaces the whole coarse edge set.
    pub(crate) fn replace_coarse_edges(
        &mut self,
        coarse_edges: HashMap<(NodeId, NodeId), CoarseEdge>,
    ) {
        self.coarse_edges = coarse_edges;
        let pairs: Vec<_> = self.coarse_edges.keys().copied().collect();
        for (source, target) in pairs {
            self.link(source, target);
        }
    }

    /// Successor lists of the coarse graph, built on demand.
    pub fn coarse_successors(&self) -> HashMap<NodeId, Vec<NodeId>> {
        let mut successors: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for &(source, target) in self.coarse_edges.keys() {
            successors.entry(source).or_default().push(target);
        }
        successors
    }

    /// Removes a node, every edge touching it and every reference to it held
    /// by other nodes.
    ///
    /// # Return
    ///
    /// Returns `Some(Node)` if the node existed and was removed, otherwise `None`.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(id)?;
        self.key_map.remove(&node.key);

        let neighbors = self.incidence.remove(id).unwrap_or_default();
        for neighbor in neighbors {
            self.edges.remove(&(id, neighbor));
            self.edges.remove(&(neighbor, id));
            self.coarse_edges.remove(&(id, neighbor));
            self.coarse_edges.remove(&(neighbor, id));
            if let Some(incident) = self.incidence.get_mut(neighbor) {
                incident.remove(&id);
            }
        }
        // Self-loops are not linked twice, drop them explicitly.
        self.edges.remove(&(id, id));
        self.coarse_edges.remove(&(id, id));

        for (_, other) in self.nodes.iter_mut() {
            other.lminreps.remove(&id);
            other.hiddennodes.remove(&id);
            other.occtransfer.remove(&id);
        }

        Some(node)
    }

    /// Orders `ids` by the given attribute, breaking ties by key.
    pub fn sort_ids(&self, ids: &mut [NodeId], attribute: NodeAttribute, reverse: bool) {
        ids.sort_by(|&a, &b| {
            let (na, nb) = (&self.nodes[a], &self.nodes[b]);
            let ordering = match attribute {
                NodeAttribute::Energy => na.energy.cmp(&nb.energy),
                NodeAttribute::Occupancy => na.occupancy.total_cmp(&nb.occupancy),
                NodeAttribute::Pruned => na.pruned.cmp(&nb.pruned),
            };
            let ordering = if reverse { ordering.reverse() } else { ordering };
            ordering.then_with(|| na.key.cmp(&nb.key))
        });
    }

    /// Sum of all occupancies currently stored in the graph.
    pub fn total_occupancy(&self) -> f64 {
        self.nodes.values().map(|node| node.occupancy).sum()
    }
}
