use crate::core::energy::Energy;
use std::collections::{BTreeMap, BTreeSet};

/// Energies of structures, keyed by structure.
pub type NodeEnergies = BTreeMap<String, Energy>;

/// Saddle energies of directed transitions, keyed by `(source, target)`.
pub type SaddleEnergies = BTreeMap<(String, String), Energy>;

/// Directed structure pairs without energy information.
pub type StructurePairs = BTreeSet<(String, String)>;

/// Proposes neighbors of parent structures by melting and reforming short helices.
pub trait FrayingSearch {
    /// Returns, per parent, the candidate structures on the transcript prefix.
    ///
    /// `parents` are already truncated to the transcript length and at most
    /// `max_freed_pairs` base pairs may be opened per candidate.
    fn fraying_neighbors(
        &self,
        transcript: &str,
        parents: &[String],
        max_freed_pairs: usize,
    ) -> BTreeMap<String, BTreeSet<String>>;
}

/// Candidate structures and connections proposed by a guide graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuideGraph {
    pub nodes: Vec<(String, Energy)>,
    pub edges: StructurePairs,
}

/// Builds a coarse guide graph connecting the given structures.
pub trait GuideGraphBuilder {
    /// `structures` and all returned structures span the transcript prefix.
    fn guide_graph(&self, transcript: &str, structures: &[String]) -> GuideGraph;
}

/// Input of a neighborhood flooding run.
#[derive(Debug, Clone, Copy)]
pub struct FloodingRequest<'a> {
    /// The full sequence; all structures span its length.
    pub sequence: &'a str,
    /// Weighted pairing-match parameter forwarded to the flooding algorithm.
    pub fpwm: u32,
    /// Active nodes and their energies.
    pub nodes: &'a NodeEnergies,
    /// Edges proposed by the guide graph.
    pub guide_edges: &'a StructurePairs,
    /// Previously known edges between active nodes.
    pub seed_edges: &'a SaddleEnergies,
    /// Barriers below this height are explored exhaustively.
    pub min_barrier: Energy,
}

/// Locally exhaustive connectivity returned by flooding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Neighborhood {
    pub nodes: NodeEnergies,
    pub edges: SaddleEnergies,
}

/// Computes saddle energies for the neighborhood of the given nodes.
pub trait NeighborhoodFlooding {
    fn flood(&self, request: &FloodingRequest<'_>) -> Neighborhood;
}

/// Result of coarse-graining an active graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoarseGrainedGraph {
    /// Local-minimum representatives and their energies.
    pub nodes: NodeEnergies,
    /// Saddle energies between representatives.
    pub edges: SaddleEnergies,
    /// Hidden dependents of each representative.
    pub mapping: BTreeMap<String, BTreeSet<String>>,
}

/// Partitions a graph into local-minimum representatives and hidden nodes.
pub trait CoarseGraining {
    fn coarse_grain(
        &self,
        nodes: &NodeEnergies,
        edges: &SaddleEnergies,
        min_barrier: Energy,
    ) -> CoarseGrainedGraph;
}
