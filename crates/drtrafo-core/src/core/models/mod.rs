//! # Core Models Module
//!
//! Data structures of the folding landscape.
//!
//! ## Key Components
//!
//! - [`node`] - Structure records with energy, occupancy and lifecycle flags
//! - [`edge`] - Fine-grained transition edges and coarse-grained representative edges
//! - [`graph`] - The graph store, an arena of nodes indexed by structure key
//! - [`ids`] - Opaque node handles
//!
//! ```ignore
//! use drtrafo::core::models::{graph::LandscapeGraph, node::NodeAttributes};
//!
//! let mut graph = LandscapeGraph::new("n");
//! let id = graph.add_node("((...))..", NodeAttributes::new().with_energy(-120))?;
//! assert_eq!(graph.node(id).unwrap().identity(), "n0");
//! ```

pub mod edge;
pub mod graph;
pub mod ids;
pub mod node;
