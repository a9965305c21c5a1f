use crate::core::energy::Energy;
use crate::core::folding::structure::{pad_structure, structure_prefix};
use crate::core::folding::traits::{FloodingRequest, NodeEnergies, SaddleEnergies, StructurePairs};
use crate::core::models::edge::EdgeUpdate;
use crate::core::models::node::NodeAttributes;
use crate::engine::error::LandscapeError;
use crate::engine::landscape::TrafoLandscape;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Wall-clock breakdown of one expansion.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExpansionTimings {
    pub total: Duration,
    pub fraying: Duration,
    pub guide_graph: Duration,
    pub flooding: Duration,
}

/// Outcome of one expansion step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expansion {
    /// Keys of nodes created during this step.
    pub new_nodes: BTreeSet<String>,
    /// Keys of previously inactive nodes that became active again.
    pub reactivated: BTreeSet<String>,
    pub timings: Option<ExpansionTimings>,
}

#[instrument(skip_all, name = "expansion_task")]
pub fn run(
    landscape: &mut TrafoLandscape,
    performance_report: bool,
) -> Result<Expansion, LandscapeError> {
    let full_length = landscape.sequence_length();
    landscape.transcript_length = (landscape.transcript_length + 1).min(full_length);
    let length = landscape.transcript_length;
    let transcript = landscape.transcript().to_string();

    let start = Instant::now();
    let mfe = landscape.toolkit.energy_model.mfe_structure(length);
    check_length(&mfe, length)?;
    let mfe = pad_structure(&mfe, full_length);

    let mut expansion = Expansion::default();

    if landscape.graph.is_empty() {
        landscape.add_node(&mfe, NodeAttributes::from_structure(mfe.clone()).with_occupancy(1.0))?;
        expansion.new_nodes.insert(mfe);
        if performance_report {
            expansion.timings = Some(ExpansionTimings::default());
        }
        info!(length, "Initialized landscape with the MFE structure.");
        return Ok(expansion);
    }

    // Fraying neighbors of the active local minima.
    let parents: Vec<String> = landscape
        .active_local_minima()
        .iter()
        .map(|key| structure_prefix(key, length).to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let fraying = landscape.toolkit.fraying.fraying_neighbors(
        &transcript,
        &parents,
        landscape.config.max_freed_pairs,
    );

    merge_node(landscape, &mfe, None, &mut expansion)?;
    for candidate in fraying.values().flatten() {
        check_length(candidate, length)?;
        merge_node(landscape, &pad_structure(candidate, full_length), None, &mut expansion)?;
    }
    let fraying_done = Instant::now();

    // Guide graph over the prefixes of all active nodes.
    let active_prefixes: Vec<String> = landscape
        .active_nodes()
        .iter()
        .map(|key| structure_prefix(key, length).to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let guide = landscape
        .toolkit
        .guide_graph
        .guide_graph(&transcript, &active_prefixes);
    for (structure, _) in &guide.nodes {
        check_length(structure, length)?;
        merge_node(landscape, &pad_structure(structure, full_length), None, &mut expansion)?;
    }
    let guide_edges: StructurePairs = guide
        .edges
        .iter()
        .map(|(a, b)| (pad_structure(a, full_length), pad_structure(b, full_length)))
        .collect();
    let guide_done = Instant::now();

    // Flooding seeded with the known barriers between active nodes.
    let nodes: NodeEnergies = landscape
        .graph
        .nodes_iter()
        .filter(|(_, node)| node.active)
        .map(|(_, node)| (node.key.clone(), node.energy))
        .collect();
    let seed_edges: SaddleEnergies = landscape
        .graph
        .edges_iter()
        .filter_map(|(&(a, b), edge)| {
            let (source, target) = (landscape.graph.node(a)?, landscape.graph.node(b)?);
            let saddle = edge.saddle_energy()?;
            (source.active && target.active)
                .then(|| ((source.key.clone(), target.key.clone()), saddle))
        })
        .collect();
    let request = FloodingRequest {
        sequence: &landscape.sequence,
        fpwm: landscape.config.fpwm,
        nodes: &nodes,
        guide_edges: &guide_edges,
        seed_edges: &seed_edges,
        min_barrier: landscape.config.min_barrier,
    };
    let neighborhood = landscape.toolkit.flooding.flood(&request);

    for (key, &energy) in &neighborhood.nodes {
        merge_node(landscape, key, Some(energy), &mut expansion)?;
    }
    for ((a, b), &saddle) in &neighborhood.edges {
        let (Some(source), Some(target)) = (landscape.graph.id_of(a), landscape.graph.id_of(b))
        else {
            return Err(LandscapeError::InvalidCollaboratorOutput(format!(
                "flooding returned edge ({a}, {b}) without its nodes"
            )));
        };
        landscape
            .graph
            .add_edge_by_id(source, target, EdgeUpdate::saddle(saddle));
    }
    let done = Instant::now();

    let timings = ExpansionTimings {
        total: done - start,
        fraying: fraying_done - start,
        guide_graph: guide_done - fraying_done,
        flooding: done - guide_done,
    };
    debug!(
        length,
        total = ?timings.total,
        fraying = ?timings.fraying,
        guide_graph = ?timings.guide_graph,
        flooding = ?timings.flooding,
        "Expansion timings."
    );
    info!(
        length,
        new = expansion.new_nodes.len(),
        reactivated = expansion.reactivated.len(),
        nodes = landscape.graph.node_count(),
        edges = landscape.graph.edge_count(),
        "Expanded landscape."
    );
    if performance_report {
        expansion.timings = Some(timings);
    }
    Ok(expansion)
}

/// Creates the node if it is new, or reactivates it if it is inactive.
///
/// With `energy` given, a node that already exists must carry exactly that
/// energy.
fn merge_node(
    landscape: &mut TrafoLandscape,
    key: &str,
    energy: Option<Energy>,
    expansion: &mut Expansion,
) -> Result<(), LandscapeError> {
    let Some(id) = landscape.graph.id_of(key) else {
        let attrs = NodeAttributes::from_structure(key);
        let attrs = match energy {
            Some(energy) => attrs.with_energy(energy),
            None => attrs,
        };
        landscape.add_node(key, attrs)?;
        expansion.new_nodes.insert(key.to_string());
        return Ok(());
    };

    let node = landscape.graph.require_node_mut(id)?;
    if let Some(computed) = energy {
        if node.energy != computed {
            return Err(LandscapeError::EnergyMismatch {
                key: key.to_string(),
                stored: node.energy,
                computed,
            });
        }
    }
    if !node.active {
        node.active = true;
        node.pruned = 0;
        node.occtransfer.clear();
        expansion.reactivated.insert(key.to_string());
    }
    Ok(())
}

fn check_length(structure: &str, length: usize) -> Result<(), LandscapeError> {
    let found = structure.chars().count();
    if found != length {
        return Err(LandscapeError::InvalidCollaboratorOutput(format!(
            "structure '{structure}' has length {found}, expected {length}"
        )));
    }
    Ok(())
}
