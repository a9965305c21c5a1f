//! # Core Module
//!
//! Fundamental building blocks shared by the stateful engine.
//!
//! - **Landscape Representation** ([`models`]) - Nodes, fine and coarse edges, and the graph store
//! - **Energetics** ([`energy`]) - Energy units, thermal energy and Arrhenius rates
//! - **Folding Collaborators** ([`folding`]) - Interfaces for structure discovery, flooding and coarse-graining
//! - **Kinetics** ([`kinetics`]) - Rate matrices, stationary distributions and time propagation
//!
//! Nothing in this module holds state across transcription steps.

pub mod energy;
pub mod folding;
pub mod kinetics;
pub mod models;
