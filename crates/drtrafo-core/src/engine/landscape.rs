use super::config::LandscapeConfig;
use super::error::LandscapeError;
use super::tasks::expansion::Expansion;
use super::tasks::pruning::Pruning;
use super::tasks::{coarse_graining, expansion, kinetics, pruning};
use crate::core::energy::{Energy, to_dcal};
use crate::core::folding::FoldingToolkit;
use crate::core::folding::structure::structure_prefix;
use crate::core::kinetics::Tolerance;
use crate::core::kinetics::trajectory::Trajectory;
use crate::core::models::edge::{CoarseEdge, Edge, EdgeUpdate};
use crate::core::models::graph::LandscapeGraph;
use crate::core::models::ids::NodeId;
use crate::core::models::node::{Node, NodeAttribute, NodeAttributes};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use tracing::trace;

/// The co-transcriptional folding landscape of one sequence.
///
/// Owns the graph of candidate structures and drives it through the
/// per-nucleotide cycle `expand → build_coarse_network → simulate →
/// set_occupancies → prune`. Every mutation goes through these operations so
/// that total occupancy is conserved and no node is a representative and
/// hidden at the same time.
pub struct TrafoLandscape {
    pub(crate) sequence: String,
    pub(crate) transcript_length: usize,
    pub(crate) graph: LandscapeGraph,
    pub(crate) config: LandscapeConfig,
    pub(crate) toolkit: FoldingToolkit,
}

impl TrafoLandscape {
    pub fn new(
        sequence: impl Into<String>,
        config: LandscapeConfig,
        toolkit: FoldingToolkit,
    ) -> Self {
        Self {
            sequence: sequence.into(),
            transcript_length: 0,
            graph: LandscapeGraph::new(config.identity_prefix.clone()),
            config,
            toolkit,
        }
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence.chars().count()
    }

    pub fn transcript_length(&self) -> usize {
        self.transcript_length
    }

    /// Moves the transcription cursor, clamped to the sequence length.
    pub fn set_transcript_length(&mut self, length: usize) {
        self.transcript_length = length.min(self.sequence_length());
    }

    /// The part of the sequence transcribed so far.
    pub fn transcript(&self) -> &str {
        structure_prefix(&self.sequence, self.transcript_length)
    }

    pub fn config(&self) -> &LandscapeConfig {
        &self.config
    }

    pub fn graph(&self) -> &LandscapeGraph {
        &self.graph
    }

    /// Thermal energy in kcal/mol.
    pub fn rt(&self) -> f64 {
        self.config.rt()
    }

    /// Adds a node, deriving its energy from the structure if none is given.
    pub fn add_node(
        &mut self,
        key: &str,
        mut attrs: NodeAttributes,
    ) -> Result<NodeId, LandscapeError> {
        if attrs.energy.is_none() {
            if let Some(structure) = attrs.structure.as_deref() {
                attrs.energy = Some(self.evaluate(structure)?);
            }
        }
        let id = self.graph.add_node(key, attrs)?;
        trace!(key, "Added node.");
        Ok(id)
    }

    pub fn add_edge(
        &mut self,
        n1: &str,
        n2: &str,
        update: EdgeUpdate,
    ) -> Result<(), LandscapeError> {
        self.graph.add_edge(n1, n2, update)?;
        Ok(())
    }

    /// Free energy of `structure` under the energy model, rounded to dcal/mol.
    pub fn evaluate(&self, structure: &str) -> Result<Energy, LandscapeError> {
        let kcal = self.toolkit.energy_model.eval_structure(structure);
        if !kcal.is_finite() {
            return Err(LandscapeError::InvalidCollaboratorOutput(format!(
                "energy model returned {kcal} for '{structure}'"
            )));
        }
        Ok(to_dcal(kcal))
    }

    pub fn has_node(&self, key: &str) -> bool {
        self.graph.has_node(key)
    }

    pub fn has_edge(&self, n1: &str, n2: &str) -> bool {
        self.graph.has_edge(n1, n2)
    }

    pub fn has_coarse_edge(&self, n1: &str, n2: &str) -> bool {
        self.graph.has_coarse_edge(n1, n2)
    }

    pub fn node(&self, key: &str) -> Option<&Node> {
        self.graph.node_by_key(key)
    }

    /// Direct transition rate, zero if the edge is unknown.
    pub fn rate(&self, n1: &str, n2: &str) -> f64 {
        self.graph.rate(n1, n2)
    }

    pub fn saddle(&self, n1: &str, n2: &str) -> Option<Energy> {
        self.graph.saddle(n1, n2)
    }

    pub fn coarse_saddle(&self, n1: &str, n2: &str) -> Option<Energy> {
        self.graph.coarse_saddle(n1, n2)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn coarse_edge_count(&self) -> usize {
        self.graph.coarse_edge_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.nodes_iter().map(|(_, node)| node)
    }

    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &Edge)> {
        self.graph.edges_iter().filter_map(|(&(a, b), edge)| {
            Some((self.graph.key_of(a)?, self.graph.key_of(b)?, edge))
        })
    }

    pub fn coarse_edges(&self) -> impl Iterator<Item = (&str, &str, &CoarseEdge)> {
        self.graph.coarse_edges_iter().filter_map(|(&(a, b), edge)| {
            Some((self.graph.key_of(a)?, self.graph.key_of(b)?, edge))
        })
    }

    fn keys_where(&self, predicate: impl Fn(&Node) -> bool) -> Vec<String> {
        self.graph
            .nodes_iter()
            .filter(|(_, node)| predicate(node))
            .map(|(_, node)| node.key.clone())
            .collect()
    }

    pub fn local_minima(&self) -> Vec<String> {
        self.keys_where(Node::is_local_minimum)
    }

    pub fn active_local_minima(&self) -> Vec<String> {
        self.keys_where(|node| node.active && node.is_local_minimum())
    }

    pub fn hidden_nodes(&self) -> Vec<String> {
        self.keys_where(Node::is_hidden)
    }

    pub fn active_nodes(&self) -> Vec<String> {
        self.keys_where(|node| node.active)
    }

    pub fn inactive_nodes(&self) -> Vec<String> {
        self.keys_where(|node| !node.active)
    }

    /// Keys ordered by `attribute`, over `subset` or over all nodes.
    pub fn sorted_nodes(
        &self,
        attribute: NodeAttribute,
        reverse: bool,
        subset: Option<&[String]>,
    ) -> Result<Vec<String>, LandscapeError> {
        let mut ids = match subset {
            Some(keys) => keys
                .iter()
                .map(|key| self.graph.require(key))
                .collect::<Result<Vec<_>, _>>()?,
            None => self.graph.node_ids(),
        };
        self.graph.sort_ids(&mut ids, attribute, reverse);
        Ok(ids
            .into_iter()
            .filter_map(|id| self.graph.key_of(id).map(str::to_string))
            .collect())
    }

    fn keys_of(&self, ids: &HashSet<NodeId>) -> BTreeSet<&str> {
        ids.iter().filter_map(|&id| self.graph.key_of(id)).collect()
    }

    /// Representatives a hidden node has been folded into.
    pub fn lminreps(&self, key: &str) -> Option<BTreeSet<&str>> {
        self.node(key).map(|node| self.keys_of(&node.lminreps))
    }

    /// Nodes hidden behind a representative.
    pub fn hiddennodes(&self, key: &str) -> Option<BTreeSet<&str>> {
        self.node(key).map(|node| self.keys_of(&node.hiddennodes))
    }

    /// Nodes receiving the occupancy of a deactivated local minimum.
    pub fn occtransfer(&self, key: &str) -> Option<BTreeSet<&str>> {
        self.node(key).map(|node| self.keys_of(&node.occtransfer))
    }

    pub fn total_occupancy(&self) -> f64 {
        self.graph.total_occupancy()
    }

    /// Grows the transcript by one nucleotide and discovers new structures.
    pub fn expand(&mut self, performance_report: bool) -> Result<Expansion, LandscapeError> {
        expansion::run(self, performance_report)
    }

    /// Partitions the active graph into local minima and rebuilds the coarse
    /// edges. Returns the number of representatives and coarse edges.
    pub fn build_coarse_network(&mut self) -> Result<(usize, usize), LandscapeError> {
        coarse_graining::run(self)
    }

    /// Active local minima by ascending energy and their occupancies.
    pub fn occupancies(&self) -> (Vec<String>, Vec<f64>) {
        kinetics::occupancies(self)
    }

    /// Stationary distribution over `nodes` implied by the coarse rates.
    pub fn equilibrium_occupancies(&self, nodes: &[String]) -> Result<Vec<f64>, LandscapeError> {
        kinetics::equilibrium(self, nodes)
    }

    /// Lazily integrates the master equation over the coarse network.
    ///
    /// Samples are produced at the union of `times` and the `force` times not
    /// earlier than `times[0]`, in ascending order. The returned trajectory
    /// owns its data; consuming it never changes the landscape.
    pub fn simulate(
        &self,
        nodes: &[String],
        p0: &[f64],
        times: &[f64],
        force: &[f64],
        tolerance: Tolerance,
    ) -> Result<Trajectory, LandscapeError> {
        kinetics::simulate(self, nodes, p0, times, force, tolerance)
    }

    /// Writes a probability vector back onto `nodes`.
    pub fn set_occupancies(&mut self, nodes: &[String], p: &[f64]) -> Result<(), LandscapeError> {
        if nodes.len() != p.len() {
            return Err(LandscapeError::LengthMismatch {
                nodes: nodes.len(),
                values: p.len(),
            });
        }
        let ids = nodes
            .iter()
            .zip(p)
            .map(|(key, &value)| {
                if !(value.is_finite() && value >= 0.0) {
                    return Err(LandscapeError::InvalidOccupancy {
                        key: key.clone(),
                        value,
                    });
                }
                Ok(self.graph.require(key)?)
            })
            .collect::<Result<Vec<_>, _>>()?;
        for (id, &value) in ids.into_iter().zip(p) {
            self.graph.require_node_mut(id)?.occupancy = value;
        }
        Ok(())
    }

    /// Deactivates low-occupancy local minima and evicts long-inactive nodes.
    pub fn prune(
        &mut self,
        p_min: f64,
        delth: u32,
        keep: &HashSet<String>,
    ) -> Result<Pruning, LandscapeError> {
        pruning::run(self, p_min, delth, keep)
    }
}

impl fmt::Display for TrafoLandscape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TrafoLandscape({}, nodes={}, edges={})",
            self.sequence,
            self.graph.node_count(),
            self.graph.edge_count()
        )
    }
}

impl fmt::Debug for TrafoLandscape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrafoLandscape")
            .field("sequence", &self.sequence)
            .field("transcript_length", &self.transcript_length)
            .field("nodes", &self.graph.node_count())
            .field("edges", &self.graph.edge_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
