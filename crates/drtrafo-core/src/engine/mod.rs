//! # Engine Module
//!
//! The stateful layer: a [`landscape::TrafoLandscape`] owns the graph of
//! candidate structures and advances it one nucleotide at a time.
//!
//! ## Architecture
//!
//! - **Landscape** ([`landscape`]) - The graph state machine and its public operations
//! - **Tasks** ([`tasks`]) - Expansion, coarse-graining, kinetics and pruning, one module per phase
//! - **Configuration** ([`config`]) - Landscape and transcription parameters, builders and TOML loading
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress reporting
//! - **Error Handling** ([`error`]) - Engine errors, split into caller faults and internal faults

pub mod config;
pub mod error;
pub mod landscape;
pub mod progress;
pub mod tasks;
