//! # Folding Module
//!
//! Interfaces to the external structure-discovery algorithms consumed by the
//! landscape, together with a reference coarse-graining implementation.
//!
//! ## Overview
//!
//! The landscape does not enumerate structures or compute energy barriers by
//! itself. Instead it delegates to a small set of collaborators that are
//! treated as deterministic pure functions:
//!
//! - [`traits::FrayingSearch`] proposes neighbors of active local minima by
//!   melting and reforming short helices.
//! - [`traits::GuideGraphBuilder`] proposes a coarse set of candidate
//!   structures and their connectivity.
//! - [`traits::NeighborhoodFlooding`] computes saddle energies for a locally
//!   exhaustive set of transitions.
//! - [`traits::CoarseGraining`] partitions the active graph into local-minimum
//!   representatives and hidden dependents; [`coarse_graining::TopDownCoarseGraining`]
//!   is the implementation used by default.
//!
//! All collaborators exchange structures as dot-bracket strings and energies
//! in dcal/mol.

pub mod coarse_graining;
pub mod structure;
pub mod traits;

use crate::core::energy::model::EnergyModel;
use coarse_graining::TopDownCoarseGraining;
use traits::{CoarseGraining, FrayingSearch, GuideGraphBuilder, NeighborhoodFlooding};

/// The set of collaborators a landscape is built on.
pub struct FoldingToolkit {
    pub energy_model: Box<dyn EnergyModel>,
    pub fraying: Box<dyn FrayingSearch>,
    pub guide_graph: Box<dyn GuideGraphBuilder>,
    pub flooding: Box<dyn NeighborhoodFlooding>,
    pub coarse_graining: Box<dyn CoarseGraining>,
}

impl FoldingToolkit {
    /// Bundles the discovery collaborators with the top-down coarse-graining.
    pub fn new(
        energy_model: Box<dyn EnergyModel>,
        fraying: Box<dyn FrayingSearch>,
        guide_graph: Box<dyn GuideGraphBuilder>,
        flooding: Box<dyn NeighborhoodFlooding>,
    ) -> Self {
        Self {
            energy_model,
            fraying,
            guide_graph,
            flooding,
            coarse_graining: Box::new(TopDownCoarseGraining),
        }
    }

    pub fn with_coarse_graining(mut self, coarse_graining: Box<dyn CoarseGraining>) -> Self {
        self.coarse_graining = coarse_graining;
        self
    }
}

impl std::fmt::Debug for FoldingToolkit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FoldingToolkit").finish_non_exhaustive()
    }
}
