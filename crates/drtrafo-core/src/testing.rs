//! Deterministic stand-ins for the folding collaborators, used by unit tests.

use crate::core::energy::Energy;
use crate::core::energy::model::EnergyModel;
use crate::core::folding::FoldingToolkit;
use crate::core::folding::traits::{
    FloodingRequest, FrayingSearch, GuideGraph, GuideGraphBuilder, Neighborhood,
    NeighborhoodFlooding,
};
use crate::engine::config::LandscapeConfig;
use crate::engine::landscape::TrafoLandscape;
use std::collections::{BTreeMap, BTreeSet};

/// Energy model worth -1.5 kcal/mol per base pair, with a scripted MFE per
/// transcript length.
pub(crate) struct PairCountModel {
    mfe: BTreeMap<usize, String>,
}

impl EnergyModel for PairCountModel {
    fn eval_structure(&self, structure: &str) -> f64 {
        -1.5 * structure.chars().filter(|&c| c == '(').count() as f64
    }

    fn mfe_structure(&self, length: usize) -> String {
        self.mfe
            .get(&length)
            .cloned()
            .unwrap_or_else(|| ".".repeat(length))
    }
}

/// Proposes the same scripted candidates for every parent.
pub(crate) struct ScriptedFraying {
    candidates: BTreeMap<usize, Vec<String>>,
}

impl FrayingSearch for ScriptedFraying {
    fn fraying_neighbors(
        &self,
        transcript: &str,
        parents: &[String],
        _max_freed_pairs: usize,
    ) -> BTreeMap<String, BTreeSet<String>> {
        let candidates: BTreeSet<String> = self
            .candidates
            .get(&transcript.len())
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        parents
            .iter()
            .map(|parent| (parent.clone(), candidates.clone()))
            .collect()
    }
}

/// Returns scripted guide structures without edges.
pub(crate) struct ScriptedGuide {
    structures: BTreeMap<usize, Vec<String>>,
}

impl GuideGraphBuilder for ScriptedGuide {
    fn guide_graph(&self, transcript: &str, _structures: &[String]) -> GuideGraph {
        GuideGraph {
            nodes: self
                .structures
                .get(&transcript.len())
                .into_iter()
                .flatten()
                .map(|structure| (structure.clone(), 0))
                .collect(),
            edges: BTreeSet::new(),
        }
    }
}

/// Connects every pair of nodes, over `barrier` above the higher endpoint
/// unless a seed saddle is known.
pub(crate) struct CompleteFlooding {
    barrier: Energy,
    energy_offset: Energy,
}

impl NeighborhoodFlooding for CompleteFlooding {
    fn flood(&self, request: &FloodingRequest<'_>) -> Neighborhood {
        let nodes: BTreeMap<String, Energy> = request
            .nodes
            .iter()
            .map(|(key, &energy)| (key.clone(), energy + self.energy_offset))
            .collect();
        let mut edges = BTreeMap::new();
        for (a, &ea) in &nodes {
            for (b, &eb) in &nodes {
                if a == b {
                    continue;
                }
                let pair = (a.clone(), b.clone());
                let saddle = request
                    .seed_edges
                    .get(&pair)
                    .copied()
                    .unwrap_or(ea.max(eb) + self.barrier);
                edges.insert(pair, saddle);
            }
        }
        Neighborhood { nodes, edges }
    }
}

/// Builder for a toolkit of scripted collaborators.
#[derive(Default)]
pub(crate) struct MockToolkit {
    mfe: BTreeMap<usize, String>,
    fraying: BTreeMap<usize, Vec<String>>,
    guide: BTreeMap<usize, Vec<String>>,
    barrier: Energy,
    energy_offset: Energy,
}

impl MockToolkit {
    pub(crate) fn mfe(mut self, length: usize, structure: &str) -> Self {
        self.mfe.insert(length, structure.to_string());
        self
    }

    pub(crate) fn fraying(mut self, length: usize, structures: &[&str]) -> Self {
        self.fraying
            .insert(length, structures.iter().map(|s| s.to_string()).collect());
        self
    }

    pub(crate) fn guide(mut self, length: usize, structures: &[&str]) -> Self {
        self.guide
            .insert(length, structures.iter().map(|s| s.to_string()).collect());
        self
    }

    pub(crate) fn barrier(mut self, barrier: Energy) -> Self {
        self.barrier = barrier;
        self
    }

    /// Makes the flooding report energies shifted by `offset`.
    pub(crate) fn energy_offset(mut self, offset: Energy) -> Self {
        self.energy_offset = offset;
        self
    }

    pub(crate) fn build(self) -> FoldingToolkit {
        FoldingToolkit::new(
            Box::new(PairCountModel { mfe: self.mfe }),
            Box::new(ScriptedFraying {
                candidates: self.fraying,
            }),
            Box::new(ScriptedGuide {
                structures: self.guide,
            }),
            Box::new(CompleteFlooding {
                barrier: self.barrier,
                energy_offset: self.energy_offset,
            }),
        )
    }
}

pub(crate) fn landscape(sequence: &str) -> TrafoLandscape {
    landscape_with(sequence, LandscapeConfig::default())
}

pub(crate) fn landscape_with(sequence: &str, config: LandscapeConfig) -> TrafoLandscape {
    TrafoLandscape::new(sequence, config, MockToolkit::default().build())
}
