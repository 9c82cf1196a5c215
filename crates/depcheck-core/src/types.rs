use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Classification of a path into one of four buckets, derived purely from
/// path prefix and build-graph facts (spec.md §3 "FileType").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    System,
    ThirdParty,
    Generated,
    Project,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::System => write!(f, "system"),
            FileType::ThirdParty => write!(f, "third_party"),
            FileType::Generated => write!(f, "generated"),
            FileType::Project => write!(f, "project"),
        }
    }
}

impl std::str::FromStr for FileType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(FileType::System),
            "third_party" | "thirdparty" | "third-party" => Ok(FileType::ThirdParty),
            "generated" => Ok(FileType::Generated),
            "project" => Ok(FileType::Project),
            _ => Err(anyhow::anyhow!("unknown file type: {s}")),
        }
    }
}

/// A mapping from an absolute header or source path to the set of paths it
/// directly includes (spec.md §3 "IncludeGraph"). Self-loops are permitted
/// here (they are meaningful to cycle detection) but are never produced by
/// the include-graph builder for non-self edges; a literal `H -> H` entry
/// is the one deliberate exception, used by Scenario tests of a single
/// self-loop.
pub type IncludeGraph = BTreeMap<PathBuf, BTreeSet<PathBuf>>;

/// A mapping from a source translation unit (the compile command's input)
/// to the ordered list of paths it transitively depends on, as supplied by
/// the external scanner (spec.md §3 "SourceDependencyMap"). Order is
/// scanner-chosen and preserved for debugging; the DSM engine never
/// re-derives transitivity from this map.
pub type SourceDependencyMap = BTreeMap<PathBuf, Vec<PathBuf>>;

/// The tuple produced by the scan layer (L1+L2), consumed by L3.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub include_graph: IncludeGraph,
    pub all_headers: BTreeSet<PathBuf>,
    pub source_to_deps: SourceDependencyMap,
    pub file_types: BTreeMap<PathBuf, FileType>,
    pub scan_time_seconds: f64,
}

/// Per-header metrics (spec.md §3 "DSMMetrics").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DsmMetrics {
    pub fan_out: usize,
    pub fan_in: usize,
    pub coupling: usize,
    pub stability: f64,
}

impl DsmMetrics {
    /// `stability = fan_out / coupling` when `coupling > 0`, else `0.5`
    /// (spec.md §3). Low stability: many dependents, hard to change. High
    /// stability: many outgoing deps, changes often.
    pub fn new(fan_out: usize, fan_in: usize) -> Self {
        let coupling = fan_in + fan_out;
        let stability = if coupling > 0 {
            fan_out as f64 / coupling as f64
        } else {
            0.5
        };
        DsmMetrics {
            fan_out,
            fan_in,
            coupling,
            stability,
        }
    }
}

/// Overall bucket for a DSM (spec.md §3 "MatrixStatistics.health").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Health {
    /// ANSI-agnostic color name; the renderer decides how to apply it
    /// (`--verbose`/`NO_COLOR` are a depcheck-report concern, not core's).
    pub fn color(&self) -> &'static str {
        match self {
            Health::Excellent => "green",
            Health::Good => "cyan",
            Health::Fair => "yellow",
            Health::Poor => "red",
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Health::Excellent => write!(f, "excellent"),
            Health::Good => write!(f, "good"),
            Health::Fair => write!(f, "fair"),
            Health::Poor => write!(f, "poor"),
        }
    }
}

/// Whole-system statistics (spec.md §3 "MatrixStatistics").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixStatistics {
    pub total_headers: usize,
    pub total_actual_deps: usize,
    pub total_possible_deps: usize,
    pub sparsity: f64,
    pub avg_deps: f64,
    pub health: Health,
    pub health_color: String,
}

impl MatrixStatistics {
    pub fn compute(total_headers: usize, total_actual_deps: usize, health: Health) -> Self {
        let n = total_headers;
        let total_possible_deps = n.saturating_mul(n.saturating_sub(1));
        let sparsity = if total_possible_deps > 0 {
            1.0 - (total_actual_deps as f64 / total_possible_deps as f64)
        } else {
            0.0
        };
        let avg_deps = if n > 0 {
            total_actual_deps as f64 / n as f64
        } else {
            0.0
        };
        MatrixStatistics {
            total_headers,
            total_actual_deps,
            total_possible_deps,
            sparsity,
            avg_deps,
            health_color: health.color().to_string(),
            health,
        }
    }
}

/// Advanced, feature-flagged per-header metrics (spec.md §4.4 "Advanced
/// metrics"). Gated behind `Config::advanced_metrics.enabled` and always
/// optional on the wire (`Option<AdvancedMetrics>` in `DsmAnalysisResults`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvancedMetrics {
    pub pagerank: BTreeMap<PathBuf, f64>,
    pub betweenness: BTreeMap<PathBuf, f64>,
    pub hubs: BTreeSet<PathBuf>,
    pub god_objects: BTreeSet<PathBuf>,
    pub stable_interfaces: BTreeSet<PathBuf>,
    pub outliers: BTreeSet<PathBuf>,
    pub z_scores: BTreeMap<PathBuf, f64>,
}

/// The full analysis snapshot (spec.md §3 "DSMAnalysisResults").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DsmAnalysisResults {
    pub sorted_headers: Vec<PathBuf>,
    pub metrics: BTreeMap<PathBuf, DsmMetrics>,
    /// Equal to `header_to_headers`; kept as a separate field for callers
    /// that want a graph-shaped view, but not part of the snapshot's exact
    /// top-level schema (spec.md §6), so it is dropped from the persisted
    /// document and reconstructed from `header_to_headers` on load.
    #[serde(skip_serializing, default)]
    pub include_graph: IncludeGraph,
    /// Each inner set is one SCC of size >= 2, or a single-header self-loop.
    pub cycles: Vec<BTreeSet<PathBuf>>,
    pub headers_in_cycles: BTreeSet<PathBuf>,
    pub feedback_edges: BTreeSet<(PathBuf, PathBuf)>,
    pub layers: Vec<BTreeSet<PathBuf>>,
    pub header_to_layer: BTreeMap<PathBuf, usize>,
    pub header_to_headers: IncludeGraph,
    pub reverse_deps: IncludeGraph,
    pub stats: MatrixStatistics,
    pub has_cycles: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub advanced: Option<AdvancedMetrics>,
}

/// Severity bucket for a delta (spec.md §4.6 "Severity and recommendations").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Positive,
    Neutral,
    Moderate,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Positive => write!(f, "positive"),
            Severity::Neutral => write!(f, "neutral"),
            Severity::Moderate => write!(f, "moderate"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Ripple-impact figures carried inside `ArchitecturalInsights` (spec.md
/// §4.6 "Ripple impact in the delta").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RippleImpact {
    pub this_commit_rebuild_count: usize,
    pub ongoing_rebuild_delta_percentage: f64,
}

/// The qualitative half of a delta (spec.md §3 "DSMDelta.architectural_insights").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitecturalInsights {
    pub severity: Severity,
    pub became_stable: BTreeSet<PathBuf>,
    pub became_unstable: BTreeSet<PathBuf>,
    pub ripple_impact: Option<RippleImpact>,
    pub recommendations: Vec<String>,
}

/// The comparison of two `DsmAnalysisResults` (spec.md §3 "DSMDelta").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DsmDelta {
    pub headers_added: BTreeSet<PathBuf>,
    pub headers_removed: BTreeSet<PathBuf>,
    pub cycles_added: Vec<BTreeSet<PathBuf>>,
    pub cycles_removed: Vec<BTreeSet<PathBuf>>,
    pub coupling_increased: BTreeMap<PathBuf, i64>,
    pub coupling_decreased: BTreeMap<PathBuf, i64>,
    pub feedback_edges_added: BTreeSet<(PathBuf, PathBuf)>,
    pub feedback_edges_removed: BTreeSet<(PathBuf, PathBuf)>,
    pub architectural_insights: Option<ArchitecturalInsights>,
}
