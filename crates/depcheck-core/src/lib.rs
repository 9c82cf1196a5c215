//! Core data model and L0/L3/L4/L4' analysis engine for dependency-graph
//! analysis of C/C++ header-inclusion architecture.
//!
//! This crate owns everything that does not need a compiler, a compilation
//! database, or a VCS checkout: path classification, the DSM algorithms
//! (cycle detection, layering, advanced metrics), ripple-effect analysis,
//! snapshot I/O, delta computation, scenario synthesis for tests, and the
//! on-disk analysis cache. `depcheck-scan` and `depcheck-vcs` produce the
//! `IncludeGraph`/`SourceDependencyMap` inputs this crate consumes.

pub mod cache;
pub mod classify;
pub mod config;
pub mod delta;
pub mod dsm;
pub mod error;
pub mod graph;
pub mod ripple;
pub mod scenario;
pub mod snapshot;
pub mod types;

pub use cache::AnalysisCache;
pub use classify::{apply_filters, FilterStatistics, PathClassifier};
pub use config::Config;
pub use delta::{annotate_insights, compute_delta};
pub use dsm::run_dsm_analysis;
pub use error::{DepcheckError, Result};
pub use graph::HeaderGraph;
pub use ripple::{
    affected_sources, build_reverse_dependency_map, categorize_changes,
    compute_affected_sources_batch, CategorizedChanges, RippleCache,
};
pub use scenario::{scenario_e1, ScenarioBuilder};
pub use snapshot::{load as load_snapshot, save as save_snapshot, SnapshotFile, SnapshotMetadata};
pub use types::{
    AdvancedMetrics, ArchitecturalInsights, DsmAnalysisResults, DsmDelta, DsmMetrics, FileType,
    Health, IncludeGraph, MatrixStatistics, RippleImpact, ScanResult, Severity,
    SourceDependencyMap,
};
