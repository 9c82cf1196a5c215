use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::types::{IncludeGraph, SourceDependencyMap};

/// `header_to_sources[H]` is the set of translation-unit source paths whose
/// `source_to_deps` contains H (spec.md §4.5 "Reverse map"). Built once per
/// run in O(sum of |deps|), grounded on
/// `original_source/lib/dependency_utils.py::build_reverse_dependency_map`.
pub fn build_reverse_dependency_map(source_to_deps: &SourceDependencyMap) -> IncludeGraph {
    let mut reverse: IncludeGraph = IncludeGraph::new();
    for (source, deps) in source_to_deps {
        for dep in deps {
            reverse.entry(dep.clone()).or_default().insert(source.clone());
        }
    }
    reverse
}

/// `affected(H) = header_to_sources[H]`, sorted lexicographically (spec.md
/// §4.5 "Affected-sources (single header)").
pub fn affected_sources(header_to_sources: &IncludeGraph, header: &Path) -> BTreeSet<PathBuf> {
    header_to_sources.get(header).cloned().unwrap_or_default()
}

/// Per-run memoization cache from "changed header" to "ancestor set",
/// mirroring the `descendants_cache` of
/// `original_source/lib/dependency_utils.py::compute_affected_sources_batch`
/// (spec.md §5 domain 3: "memoization cache access must be serialized or
/// use a lock-free map with copy-on-write per key").
#[derive(Debug, Default)]
pub struct RippleCache {
    ancestors: HashMap<PathBuf, BTreeSet<PathBuf>>,
}

impl RippleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// All headers H such that there is a directed path from H to `target`
    /// in the direct include graph `include_graph` (i.e. H transitively
    /// includes `target`). Computed by a reverse-adjacency BFS and cached
    /// per target header.
    fn ancestors_of<'a>(
        &'a mut self,
        target: &Path,
        reverse_include_graph: &IncludeGraph,
    ) -> &'a BTreeSet<PathBuf> {
        if !self.ancestors.contains_key(target) {
            let mut visited: BTreeSet<PathBuf> = BTreeSet::new();
            let mut queue: Vec<PathBuf> = vec![target.to_path_buf()];
            while let Some(current) = queue.pop() {
                if let Some(preds) = reverse_include_graph.get(&current) {
                    for pred in preds {
                        if visited.insert(pred.clone()) {
                            queue.push(pred.clone());
                        }
                    }
                }
            }
            self.ancestors.insert(target.to_path_buf(), visited);
        }
        self.ancestors.get(target).unwrap()
    }
}

/// Given a set of changed headers and the direct include graph, compute the
/// reachability closure under the reverse of the graph restricted to
/// headers, then union each closure member's `header_to_sources` entries
/// (spec.md §4.5 "Affected-sources (batch, with memoization)").
pub fn compute_affected_sources_batch(
    changed_headers: &BTreeSet<PathBuf>,
    include_graph: &IncludeGraph,
    header_to_sources: &IncludeGraph,
    cache: &mut RippleCache,
) -> BTreeSet<PathBuf> {
    let reverse_include_graph = reverse_of(include_graph);

    let mut affected_headers: BTreeSet<PathBuf> = changed_headers.clone();
    for header in changed_headers {
        let ancestors = cache.ancestors_of(header, &reverse_include_graph);
        affected_headers.extend(ancestors.iter().cloned());
    }

    let mut result: BTreeSet<PathBuf> = BTreeSet::new();
    for header in &affected_headers {
        result.extend(affected_sources(header_to_sources, header));
    }
    result
}

fn reverse_of(include_graph: &IncludeGraph) -> IncludeGraph {
    let mut reverse: IncludeGraph = IncludeGraph::new();
    for (src, deps) in include_graph {
        reverse.entry(src.clone()).or_default();
        for dep in deps {
            reverse.entry(dep.clone()).or_default().insert(src.clone());
        }
    }
    reverse
}

/// C/C++ source-file extensions, used to split a flat path list into
/// (headers, sources) (spec.md §4.5 "Working-tree change categorization").
const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx"];
const HEADER_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx"];

#[derive(Debug, Clone, Default)]
pub struct CategorizedChanges {
    pub headers: BTreeSet<PathBuf>,
    pub sources: BTreeSet<PathBuf>,
}

/// Split a list of changed paths into (headers, sources) by extension,
/// filtering out system headers and dropping non-C/C++ paths without error
/// (spec.md §4.5 last paragraph).
pub fn categorize_changes(
    paths: &[PathBuf],
    is_system: impl Fn(&Path) -> bool,
) -> CategorizedChanges {
    let mut result = CategorizedChanges::default();
    for path in paths {
        if is_system(path) {
            continue;
        }
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if HEADER_EXTENSIONS.contains(&ext) {
            result.headers.insert(path.clone());
        } else if SOURCE_EXTENSIONS.contains(&ext) {
            result.sources.insert(path.clone());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sdm(pairs: &[(&str, &[&str])]) -> SourceDependencyMap {
        let mut m: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
        for (src, deps) in pairs {
            m.insert(PathBuf::from(src), deps.iter().map(PathBuf::from).collect());
        }
        m
    }

    #[test]
    fn test_reverse_dependency_map() {
        let map = sdm(&[("main.cpp", &["a.h", "b.h"]), ("other.cpp", &["a.h"])]);
        let reverse = build_reverse_dependency_map(&map);
        assert_eq!(
            reverse[&PathBuf::from("a.h")],
            [PathBuf::from("main.cpp"), PathBuf::from("other.cpp")]
                .into_iter()
                .collect::<BTreeSet<_>>()
        );
        assert_eq!(reverse[&PathBuf::from("b.h")].len(), 1);
    }

    #[test]
    fn test_affected_sources_single_header() {
        let map = sdm(&[("main.cpp", &["a.h"])]);
        let reverse = build_reverse_dependency_map(&map);
        let affected = affected_sources(&reverse, Path::new("a.h"));
        assert_eq!(affected.len(), 1);
    }

    #[test]
    fn test_affected_sources_batch_transitive() {
        let mut include_graph = IncludeGraph::new();
        include_graph.insert(PathBuf::from("b.h"), [PathBuf::from("a.h")].into_iter().collect());
        let header_to_sources = sdm(&[("main.cpp", &["b.h"])]);
        let reverse_sources = build_reverse_dependency_map(&header_to_sources);

        let mut changed = BTreeSet::new();
        changed.insert(PathBuf::from("a.h"));

        let mut cache = RippleCache::new();
        let affected = compute_affected_sources_batch(&changed, &include_graph, &reverse_sources, &mut cache);
        assert!(affected.contains(&PathBuf::from("main.cpp")));
    }

    #[test]
    fn test_affected_sources_batch_memoizes() {
        let mut include_graph = IncludeGraph::new();
        include_graph.insert(PathBuf::from("b.h"), [PathBuf::from("a.h")].into_iter().collect());
        let header_to_sources = sdm(&[("main.cpp", &["b.h"])]);
        let reverse_sources = build_reverse_dependency_map(&header_to_sources);

        let mut changed = BTreeSet::new();
        changed.insert(PathBuf::from("a.h"));

        let mut cache = RippleCache::new();
        let first = compute_affected_sources_batch(&changed, &include_graph, &reverse_sources, &mut cache);
        let second = compute_affected_sources_batch(&changed, &include_graph, &reverse_sources, &mut cache);
        assert_eq!(first, second);
        assert!(cache.ancestors.contains_key(&PathBuf::from("a.h")));
    }

    #[test]
    fn test_categorize_changes_splits_by_extension() {
        let paths = vec![
            PathBuf::from("src/foo.cpp"),
            PathBuf::from("src/foo.hpp"),
            PathBuf::from("README.md"),
        ];
        let categorized = categorize_changes(&paths, |_| false);
        assert_eq!(categorized.sources.len(), 1);
        assert_eq!(categorized.headers.len(), 1);
    }

    #[test]
    fn test_categorize_changes_drops_system_headers() {
        let paths = vec![PathBuf::from("/usr/include/stdio.h")];
        let categorized = categorize_changes(&paths, |_| true);
        assert!(categorized.headers.is_empty());
    }
}
