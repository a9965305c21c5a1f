//! # Workflows Module
//!
//! High-level drivers that run a [`TrafoLandscape`](crate::engine::landscape::TrafoLandscape)
//! over a whole sequence.
//!
//! ## Overview
//!
//! The engine exposes one operation per phase and leaves their ordering to the
//! caller. A workflow owns that ordering: it serializes
//! `expand → build_coarse_network → simulate → set_occupancies → prune` for
//! every nucleotide, reports progress through a
//! [`ProgressReporter`](crate::engine::progress::ProgressReporter) and
//! collects one summary per step.
//!
//! - **Transcription Workflow** ([`transcribe`]) - Co-transcriptional folding from the
//!   first nucleotide to the full sequence, followed by a final relaxation up to `t_end`.

pub mod transcribe;
