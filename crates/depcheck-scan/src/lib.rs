//! L1 (compilation-database loader) and L2 (include-graph builder) for
//! depcheck: everything that needs to shell out to a build tool or an
//! external compiler dependency scanner. `depcheck-core` consumes the
//! `ScanResult` this crate produces; it never touches the filesystem or a
//! subprocess itself.

pub mod compiledb;
pub mod includes;
pub mod scanner;

pub use compiledb::{ensure_filtered_compile_commands, filter_cxx_sources, load_compile_commands, CompileEntry};
pub use includes::{parse_includes_from_content, resolve_include};
pub use scanner::{find_scanner, parse_makefile_output, run_scanner, ScanOutput, ScannerTool, DEFAULT_TIMEOUT};

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use depcheck_core::classify::PathClassifier;
use depcheck_core::error::Result;
use depcheck_core::types::{FileType, IncludeGraph, ScanResult, SourceDependencyMap};
use rayon::prelude::*;

/// Run the full L1+L2 pipeline against `build_dir`: ensure a filtered
/// compilation database, invoke the external scanner, classify every path
/// it reports, and parse each project header's text for its direct
/// `#include` edges (spec.md §4.2 and §4.3 in full).
///
/// `jobs` is the parallelism passed to the scanner (host CPU count by
/// convention; spec.md §5 domain 1). `timeout` bounds the scanner
/// invocation (spec.md §5 "Cancellation and timeouts").
pub fn scan_build_directory(
    build_dir: &Path,
    classifier: &PathClassifier,
    drop_system_headers: bool,
    jobs: usize,
    timeout: Duration,
) -> Result<ScanResult> {
    let start = Instant::now();

    let filtered_db = compiledb::ensure_filtered_compile_commands(build_dir)?;
    let tool = scanner::find_scanner()?;
    let scan_output = scanner::run_scanner(&tool, &filtered_db, build_dir, jobs, timeout)?;

    if scan_output.malformed_targets > 0 {
        eprintln!(
            "warning: {} scanner target(s) were malformed and skipped",
            scan_output.malformed_targets
        );
    }

    let (all_headers, file_types, source_to_deps) =
        classify_scan_output(scan_output.source_to_deps, classifier, drop_system_headers);

    let include_graph = build_direct_include_graph(&all_headers, &file_types);

    Ok(ScanResult {
        include_graph,
        all_headers,
        source_to_deps,
        file_types,
        scan_time_seconds: start.elapsed().as_secs_f64(),
    })
}

/// Host CPU count, the scanner's default parallelism (spec.md §5 domain 1
/// "parallelism set to the host CPU count (default) or a configured
/// value").
pub fn default_job_count() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Classify every dependency the scanner reported (spec.md §4.3 step 3:
/// "Classifies each dependency via §4.1 and retains those of interest;
/// system and third-party headers may be kept or dropped per
/// configuration"), merging results in canonical source-path order for
/// determinism (spec.md §4.3/§5 "merged into the include graph in a
/// canonical order (sorted by source path)").
fn classify_scan_output(
    source_to_deps: SourceDependencyMap,
    classifier: &PathClassifier,
    drop_system_headers: bool,
) -> (BTreeSet<PathBuf>, BTreeMap<PathBuf, FileType>, SourceDependencyMap) {
    let mut all_headers: BTreeSet<PathBuf> = BTreeSet::new();
    let mut file_types: BTreeMap<PathBuf, FileType> = BTreeMap::new();
    let mut merged: SourceDependencyMap = SourceDependencyMap::new();

    // BTreeMap is already key-sorted; this is the "sorted by source path"
    // merge order the ordering guarantee in spec.md §5 requires.
    for (source, deps) in source_to_deps {
        let mut kept_deps = Vec::with_capacity(deps.len());
        for dep in deps {
            let file_type = classifier.classify(&dep);
            if file_type == FileType::System && drop_system_headers {
                continue;
            }
            all_headers.insert(dep.clone());
            file_types.insert(dep.clone(), file_type);
            kept_deps.push(dep);
        }
        merged.insert(source, kept_deps);
    }

    (all_headers, file_types, merged)
}

/// Build the direct include graph (spec.md §4.3 step 5) by parsing every
/// project header's source text, in parallel (spec.md §5 domain 2 scopes
/// graph algorithms to a single thread, but this is I/O-bound text
/// extraction, not a graph algorithm, so it is fanned out like the scanner
/// merge step). System and third-party headers are retained as nodes (per
/// `GraphConfig::third_party_as_nodes`'s caller-side filtering, applied
/// before this function runs) but are never re-parsed for their own
/// includes, since their internal structure is not part of the project's
/// architecture.
fn build_direct_include_graph(
    all_headers: &BTreeSet<PathBuf>,
    file_types: &BTreeMap<PathBuf, FileType>,
) -> IncludeGraph {
    let project_headers: Vec<&PathBuf> = all_headers
        .iter()
        .filter(|h| file_types.get(*h) == Some(&FileType::Project))
        .collect();

    let edges: Vec<(PathBuf, BTreeSet<PathBuf>)> = project_headers
        .par_iter()
        .map(|header| (header.to_path_buf(), direct_includes_of(header, all_headers)))
        .collect();

    let mut include_graph: IncludeGraph = IncludeGraph::new();
    for header in all_headers {
        include_graph.entry(header.clone()).or_default();
    }
    for (header, deps) in edges {
        include_graph.insert(header, deps);
    }
    include_graph
}

fn direct_includes_of(header: &Path, known_headers: &BTreeSet<PathBuf>) -> BTreeSet<PathBuf> {
    let content = match std::fs::read_to_string(header) {
        Ok(content) => content,
        Err(_) => return BTreeSet::new(),
    };
    includes::parse_includes_from_content(&content, true)
        .iter()
        .filter_map(|raw| includes::resolve_include(raw, known_headers))
        .map(|p| p.to_path_buf())
        .collect()
}
