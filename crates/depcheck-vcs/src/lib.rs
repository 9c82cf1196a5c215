//! Baseline reconstruction against a version-control system for depcheck's
//! differential analysis (spec.md §4.6). Everything that touches `git2`
//! lives here; `depcheck-core` consumes the reconstructed graph without
//! knowing where it came from.

pub mod baseline;

pub use baseline::{is_ancestor, reconstruct_baseline, BaselineGraph};
