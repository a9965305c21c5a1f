//! Tasks that mutate a [`TrafoLandscape`](super::landscape::TrafoLandscape)
//! during one transcription step.
//!
//! Each submodule implements one phase of the per-nucleotide cycle as a `run`
//! function: structure discovery, coarse-graining onto local minima, master
//! equation kinetics, and pruning of stale structures.

pub mod coarse_graining;
pub mod expansion;
pub mod kinetics;
pub mod pruning;
