use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::classify::apply_filters;
use crate::config::{AdvancedMetricsConfig, SeverityThresholds};
use crate::dsm::run_dsm_analysis;
use crate::error::{DepcheckError, Result};
use crate::types::{DsmAnalysisResults, IncludeGraph};

/// The engine's current snapshot schema. Bumping this is a breaking
/// change; load is strict (spec.md §3 invariant 7, §4.6 "Snapshot I/O").
pub const SCHEMA_VERSION: &str = "1.1";

/// `metadata` block of the snapshot (spec.md §3 "Snapshot file", §6 schema).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub build_directory: PathBuf,
    pub git_commit: Option<String>,
    pub hostname: String,
    pub timestamp: String,
    pub filter_pattern: Option<String>,
    pub exclude_patterns: Vec<String>,
    pub unfiltered_header_count: usize,
    pub filtered_header_count: usize,
}

/// The on-disk document, field-for-field matching spec.md §6's schema. The
/// analysis fields (`sorted_headers`, `metrics`, `cycles`, ...) are flattened
/// in directly as top-level siblings of `metadata`/`unfiltered_headers`,
/// rather than nested under a `results` key, to match the exact top-level
/// key list §6 specifies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    #[serde(rename = "_schema_version")]
    pub schema_version: String,
    pub metadata: SnapshotMetadata,
    pub unfiltered_headers: Vec<PathBuf>,
    pub unfiltered_include_graph: IncludeGraph,
    #[serde(flatten)]
    pub results: DsmAnalysisResults,
}

fn hostname() -> String {
    hostname_fallback().unwrap_or_else(|| "unknown".to_string())
}

fn hostname_fallback() -> Option<String> {
    std::env::var("HOSTNAME").ok().or_else(|| {
        std::process::Command::new("hostname")
            .output()
            .ok()
            .filter(|o| o.status.success())
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
    })
}

fn git_commit(build_directory: &Path) -> Option<String> {
    std::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(build_directory)
        .output()
        .ok()
        .and_then(|o| {
            if o.status.success() {
                Some(String::from_utf8_lossy(&o.stdout).trim().to_string())
            } else {
                None
            }
        })
}

/// Build and write a snapshot. The unfiltered header set/graph are kept so
/// that a later load with different filters can re-derive results without
/// re-scanning (spec.md §4.6 "Load is strict ... applied filters may be
/// overridden at load time").
pub fn save(
    path: &Path,
    build_directory: &Path,
    unfiltered_headers: &BTreeSet<PathBuf>,
    unfiltered_include_graph: &IncludeGraph,
    results: &DsmAnalysisResults,
    filter_pattern: Option<&str>,
    exclude_patterns: &[String],
) -> Result<()> {
    let build_directory = build_directory
        .canonicalize()
        .map_err(|e| DepcheckError::validation(format!("invalid build directory: {e}")))?;

    let metadata = SnapshotMetadata {
        build_directory,
        git_commit: git_commit(&build_directory_parent_safe(path)),
        hostname: hostname(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        filter_pattern: filter_pattern.map(|s| s.to_string()),
        exclude_patterns: exclude_patterns.to_vec(),
        unfiltered_header_count: unfiltered_headers.len(),
        filtered_header_count: results.sorted_headers.len(),
    };

    let doc = SnapshotFile {
        schema_version: SCHEMA_VERSION.to_string(),
        metadata,
        unfiltered_headers: unfiltered_headers.iter().cloned().collect(),
        unfiltered_include_graph: unfiltered_include_graph.clone(),
        results: results.clone(),
    };

    let json = serde_json::to_vec(&doc).map_err(|e| DepcheckError::Other(e.into()))?;

    let file = std::fs::File::create(path).map_err(|e| DepcheckError::Other(e.into()))?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| DepcheckError::Other(e.into()))?;
    encoder.finish().map_err(|e| DepcheckError::Other(e.into()))?;

    Ok(())
}

fn build_directory_parent_safe(path: &Path) -> PathBuf {
    path.parent().unwrap_or(Path::new(".")).to_path_buf()
}

/// Load a snapshot, re-applying filters (if given) to the stored unfiltered
/// graph and re-running the full DSM analysis on the re-filtered set,
/// rather than replaying the stored results verbatim (spec.md §4.6:
/// "filters are re-applied to the stored unfiltered graph and the analysis
/// is re-run"). Grounded on
/// `original_source/lib/dsm_serialization.py::load_dsm_results`.
pub fn load(
    path: &Path,
    expected_build_directory: &Path,
    filter_pattern: Option<&str>,
    exclude_patterns: Option<&[String]>,
    advanced: &AdvancedMetricsConfig,
    severity: &SeverityThresholds,
) -> Result<DsmAnalysisResults> {
    let file = std::fs::File::open(path).map_err(|e| DepcheckError::Other(e.into()))?;
    let mut decoder = GzDecoder::new(file);
    let mut json = String::new();
    decoder
        .read_to_string(&mut json)
        .map_err(|e| DepcheckError::Other(e.into()))?;

    let doc: SnapshotFile = serde_json::from_str(&json).map_err(|e| DepcheckError::Other(e.into()))?;

    if doc.schema_version != SCHEMA_VERSION {
        return Err(DepcheckError::SchemaMismatch {
            expected: SCHEMA_VERSION.to_string(),
            actual: doc.schema_version,
        });
    }

    let expected_build_directory = expected_build_directory
        .canonicalize()
        .unwrap_or_else(|_| expected_build_directory.to_path_buf());
    let actual_host = hostname();

    if doc.metadata.build_directory != expected_build_directory || doc.metadata.hostname != actual_host {
        return Err(DepcheckError::MetadataMismatch {
            expected_dir: expected_build_directory.display().to_string(),
            expected_host: actual_host,
            actual_dir: doc.metadata.build_directory.display().to_string(),
            actual_host: doc.metadata.hostname,
        });
    }

    let effective_filter = filter_pattern.or(doc.metadata.filter_pattern.as_deref());
    let effective_excludes: Vec<String> = exclude_patterns
        .map(|p| p.to_vec())
        .unwrap_or_else(|| doc.metadata.exclude_patterns.clone());

    let header_strings: BTreeSet<String> = doc
        .unfiltered_headers
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    let (kept_strings, _stats) = apply_filters(&header_strings, effective_filter, &effective_excludes);

    if kept_strings.is_empty() && !header_strings.is_empty() {
        return Err(DepcheckError::validation("no headers remaining after filters"));
    }

    let kept: BTreeSet<PathBuf> = kept_strings.into_iter().map(PathBuf::from).collect();
    let filtered_graph: IncludeGraph = doc
        .unfiltered_include_graph
        .iter()
        .filter(|(k, _)| kept.contains(*k))
        .map(|(k, v)| (k.clone(), v.iter().filter(|d| kept.contains(*d)).cloned().collect()))
        .collect();

    Ok(run_dsm_analysis(&kept, &filtered_graph, advanced, severity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::scenario_e1;

    #[test]
    fn test_save_and_load_round_trips_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let build_dir = dir.path().join("build");
        std::fs::create_dir_all(&build_dir).unwrap();

        let (headers, graph) = scenario_e1().build();
        let advanced = AdvancedMetricsConfig::default();
        let severity = SeverityThresholds::default();
        let results = run_dsm_analysis(&headers, &graph, &advanced, &severity);

        let snapshot_path = dir.path().join("snap.json.gz");
        save(&snapshot_path, &build_dir, &headers, &graph, &results, None, &[]).unwrap();

        let loaded = load(&snapshot_path, &build_dir, None, None, &advanced, &severity).unwrap();
        assert_eq!(loaded.metrics, results.metrics);
        assert_eq!(loaded.cycles, results.cycles);
    }

    #[test]
    fn test_load_rejects_schema_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let build_dir = dir.path().join("build");
        std::fs::create_dir_all(&build_dir).unwrap();
        let (headers, graph) = scenario_e1().build();
        let advanced = AdvancedMetricsConfig::default();
        let severity = SeverityThresholds::default();
        let results = run_dsm_analysis(&headers, &graph, &advanced, &severity);

        let snapshot_path = dir.path().join("snap.json.gz");
        save(&snapshot_path, &build_dir, &headers, &graph, &results, None, &[]).unwrap();

        // Corrupt the schema version in place.
        let file = std::fs::File::open(&snapshot_path).unwrap();
        let mut decoder = GzDecoder::new(file);
        let mut json = String::new();
        decoder.read_to_string(&mut json).unwrap();
        let json = json.replace("\"1.1\"", "\"0.9\"");
        let out = std::fs::File::create(&snapshot_path).unwrap();
        let mut encoder = GzEncoder::new(out, Compression::default());
        encoder.write_all(json.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let err = load(&snapshot_path, &build_dir, None, None, &advanced, &severity).unwrap_err();
        assert!(matches!(err, DepcheckError::SchemaMismatch { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_load_rejects_build_directory_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let build_dir = dir.path().join("build");
        std::fs::create_dir_all(&build_dir).unwrap();
        let other_dir = dir.path().join("other");
        std::fs::create_dir_all(&other_dir).unwrap();

        let (headers, graph) = scenario_e1().build();
        let advanced = AdvancedMetricsConfig::default();
        let severity = SeverityThresholds::default();
        let results = run_dsm_analysis(&headers, &graph, &advanced, &severity);

        let snapshot_path = dir.path().join("snap.json.gz");
        save(&snapshot_path, &build_dir, &headers, &graph, &results, None, &[]).unwrap();

        let err = load(&snapshot_path, &other_dir, None, None, &advanced, &severity).unwrap_err();
        assert!(matches!(err, DepcheckError::MetadataMismatch { .. }));
        assert_eq!(err.exit_code(), 1);
    }
}
