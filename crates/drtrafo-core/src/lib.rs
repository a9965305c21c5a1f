//! # DrTrafo Core Library
//!
//! A library for simulating co-transcriptional RNA folding on a growing,
//! coarse-grained energy landscape.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`LandscapeGraph`),
//!   thermodynamic helpers, the interfaces of the folding collaborators, and the
//!   linear algebra of the master equation.
//!
//! - **[`engine`]: The Logic Core.** The stateful `TrafoLandscape` and the tasks
//!   that mutate it once per transcription step: expansion, coarse-graining,
//!   kinetics and pruning.
//!
//! - **[`workflows`]: The Public API.** Drives the whole transcription loop,
//!   from the first nucleotide to the end of the post-transcriptional
//!   simulation, and reports per-step results.

pub mod core;
pub mod engine;
pub mod workflows;

#[cfg(test)]
pub(crate) mod testing;
