use super::ids::NodeId;
use crate::core::energy::Energy;
use std::collections::HashSet;

/// A candidate structure in the landscape together with its bookkeeping state.
///
/// Nodes are created once under a unique key and never re-keyed. Their fields
/// are only mutated through the landscape operations, which keeps occupancy
/// conservation and the representative/hidden exclusivity intact.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) key: String,
    pub(crate) structure: Option<String>,
    pub(crate) occupancy: f64,
    pub(crate) identity: String,
    pub(crate) energy: Energy,
    pub(crate) active: bool,
    pub(crate) pruned: u32,
    pub(crate) lminreps: HashSet<NodeId>,
    pub(crate) hiddennodes: HashSet<NodeId>,
    pub(crate) occtransfer: HashSet<NodeId>,
}

impl Node {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The structure this node denotes, `None` for placeholder nodes.
    pub fn structure(&self) -> Option<&str> {
        self.structure.as_deref()
    }

    pub fn occupancy(&self) -> f64 {
        self.occupancy
    }

    /// Stable label assigned at creation, used for reporting across rounds.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Free energy in dcal/mol.
    pub fn energy(&self) -> Energy {
        self.energy
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of consecutive pruning rounds this node has spent inactive.
    pub fn pruned(&self) -> u32 {
        self.pruned
    }

    /// Representatives this node has been folded into by coarse-graining.
    pub fn lminreps(&self) -> &HashSet<NodeId> {
        &self.lminreps
    }

    /// Nodes this node represents as a local minimum.
    pub fn hiddennodes(&self) -> &HashSet<NodeId> {
        &self.hiddennodes
    }

    /// Active neighbors that receive this node's occupancy after deactivation.
    pub fn occtransfer(&self) -> &HashSet<NodeId> {
        &self.occtransfer
    }

    /// A node is a local minimum as long as it is not hidden behind a representative.
    #[inline]
    pub fn is_local_minimum(&self) -> bool {
        self.lminreps.is_empty()
    }

    #[inline]
    pub fn is_hidden(&self) -> bool {
        !self.lminreps.is_empty()
    }
}

/// Attributes used to create a node.
///
/// Exactly one source of energy must be available: either an explicit
/// `energy`, or a `structure` that the landscape evaluates under its energy
/// model. An explicit energy wins when both are given.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeAttributes {
    pub structure: Option<String>,
    pub occupancy: f64,
    pub identity: Option<String>,
    pub energy: Option<Energy>,
    pub active: bool,
    pub pruned: u32,
}

impl Default for NodeAttributes {
    fn default() -> Self {
        Self {
            structure: None,
            occupancy: 0.0,
            identity: None,
            energy: None,
            active: true,
            pruned: 0,
        }
    }
}

impl NodeAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_structure(structure: impl Into<String>) -> Self {
        Self {
            structure: Some(structure.into()),
            ..Self::default()
        }
    }

    pub fn with_energy(mut self, energy: Energy) -> Self {
        self.energy = Some(energy);
        self
    }

    pub fn with_occupancy(mut self, occupancy: f64) -> Self {
        self.occupancy = occupancy;
        self
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn with_pruned(mut self, pruned: u32) -> Self {
        self.pruned = pruned;
        self
    }
}

/// Node attributes that can be used to order node collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAttribute {
    Energy,
    Occupancy,
    Pruned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_attributes_describe_an_active_empty_node() {
        let attrs = NodeAttributes::default();
        assert!(attrs.active);
        assert_eq!(attrs.occupancy, 0.0);
        assert_eq!(attrs.pruned, 0);
        assert!(attrs.energy.is_none());
        assert!(attrs.structure.is_none());
    }

    #[test]
    fn builder_methods_set_each_attribute() {
        let attrs = NodeAttributes::from_structure("((..))")
            .with_energy(-120)
            .with_occupancy(0.5)
            .with_identity("X7")
            .with_pruned(2)
            .inactive();

        assert_eq!(attrs.structure.as_deref(), Some("((..))"));
        assert_eq!(attrs.energy, Some(-120));
        assert_eq!(attrs.occupancy, 0.5);
        assert_eq!(attrs.identity.as_deref(), Some("X7"));
        assert_eq!(attrs.pruned, 2);
        assert!(!attrs.active);
    }
}
