use std::collections::BTreeSet;
use std::path::Path;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::config::ClassifyConfig;
use crate::types::FileType;

/// Classifies absolute paths into {System, ThirdParty, Generated, Project}
/// (spec.md §4.1). Classification is deterministic and path-only; it never
/// opens a file.
pub struct PathClassifier {
    system_prefixes: Vec<String>,
    third_party_prefixes: Vec<String>,
    generated_suffixes: Vec<String>,
    build_dir: Option<String>,
}

impl PathClassifier {
    pub fn new(config: &ClassifyConfig, build_dir: Option<&Path>) -> Self {
        Self {
            system_prefixes: config.system_prefixes.clone(),
            third_party_prefixes: config.third_party_prefixes.clone(),
            generated_suffixes: config.generated_suffixes.clone(),
            build_dir: build_dir.map(|p| p.to_string_lossy().to_string()),
        }
    }

    /// The hot path, inlined into scanner-output parsing (spec.md §4.1).
    pub fn is_system(&self, path: &str) -> bool {
        self.system_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    fn is_third_party(&self, path: &str) -> bool {
        self.third_party_prefixes
            .iter()
            .any(|p| path.contains(p.as_str()))
    }

    fn is_generated(&self, path: &str) -> bool {
        if let Some(build_dir) = &self.build_dir {
            if path.starts_with(build_dir.as_str()) {
                return true;
            }
        }
        self.generated_suffixes
            .iter()
            .any(|suffix| path.ends_with(suffix.as_str()))
    }

    pub fn classify(&self, path: &Path) -> FileType {
        let s = path.to_string_lossy();
        if self.is_system(&s) {
            FileType::System
        } else if self.is_third_party(&s) {
            FileType::ThirdParty
        } else if self.is_generated(&s) {
            FileType::Generated
        } else {
            FileType::Project
        }
    }
}

/// Build a `GlobSet` with POSIX-style semantics (spec.md §4.1): `*` and `?`
/// never cross a `/`, and `**` remains the any-depth operator. globset's
/// defaults leave `literal_separator` off (so a bare `*` matches across
/// `/`), so it's explicitly turned on here.
fn build_globset(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if let Ok(glob) = GlobBuilder::new(pattern).literal_separator(true).build() {
            builder.add(glob);
        }
    }
    builder
        .build()
        .unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap())
}

/// Statistics produced by applying `--filter`/`--exclude` glob patterns to
/// a header set (spec.md §4.1 "A pattern that matches zero headers is
/// reported as a non-fatal warning"). Grounded on
/// `original_source/lib/file_utils.py::FilterStatistics`.
#[derive(Debug, Clone, Default)]
pub struct FilterStatistics {
    pub total_before: usize,
    pub total_after: usize,
    pub excluded_count: usize,
    pub patterns_with_no_matches: Vec<String>,
}

impl FilterStatistics {
    pub fn format_concise(&self) -> String {
        format!(
            "{} of {} headers kept ({} excluded)",
            self.total_after, self.total_before, self.excluded_count
        )
    }

    pub fn format_verbose(&self) -> String {
        let mut lines = vec![self.format_concise()];
        for pattern in &self.patterns_with_no_matches {
            lines.push(format!("  warning: pattern '{pattern}' matched no headers"));
        }
        lines.join("\n")
    }
}

/// Apply an include filter (intersection) and then each exclude pattern in
/// order, operating on project-relative paths (spec.md §4.1).
pub fn apply_filters(
    headers: &BTreeSet<String>,
    filter_pattern: Option<&str>,
    exclude_patterns: &[String],
) -> (BTreeSet<String>, FilterStatistics) {
    let total_before = headers.len();
    let mut patterns_with_no_matches = Vec::new();

    let mut kept: BTreeSet<String> = if let Some(pattern) = filter_pattern {
        let set = build_globset(std::slice::from_ref(&pattern.to_string()));
        let matched: BTreeSet<String> = headers.iter().filter(|h| set.is_match(h.as_str())).cloned().collect();
        if matched.is_empty() {
            patterns_with_no_matches.push(pattern.to_string());
        }
        matched
    } else {
        headers.clone()
    };

    for pattern in exclude_patterns {
        let set = build_globset(std::slice::from_ref(pattern));
        let before = kept.len();
        kept.retain(|h| !set.is_match(h.as_str()));
        if before == kept.len() && before > 0 {
            patterns_with_no_matches.push(pattern.clone());
        }
    }

    let total_after = kept.len();
    let stats = FilterStatistics {
        total_before,
        total_after,
        excluded_count: total_before.saturating_sub(total_after),
        patterns_with_no_matches,
    };
    (kept, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> PathClassifier {
        PathClassifier::new(&ClassifyConfig::default(), Some(Path::new("/build")))
    }

    #[test]
    fn test_classify_system() {
        let c = classifier();
        assert_eq!(c.classify(Path::new("/usr/include/stdio.h")), FileType::System);
    }

    #[test]
    fn test_classify_third_party() {
        let c = classifier();
        assert_eq!(
            c.classify(Path::new("/repo/third_party/zlib/zlib.h")),
            FileType::ThirdParty
        );
    }

    #[test]
    fn test_classify_generated_by_build_dir() {
        let c = classifier();
        assert_eq!(c.classify(Path::new("/build/gen/foo.pb.h")), FileType::Generated);
    }

    #[test]
    fn test_classify_generated_by_suffix() {
        let c = classifier();
        assert_eq!(
            c.classify(Path::new("/repo/src/foo.generated.h")),
            FileType::Generated
        );
    }

    #[test]
    fn test_classify_project() {
        let c = classifier();
        assert_eq!(c.classify(Path::new("/repo/src/Engine/Core.hpp")), FileType::Project);
    }

    #[test]
    fn test_apply_filters_no_patterns() {
        let headers: BTreeSet<String> = ["a.h", "b.h"].iter().map(|s| s.to_string()).collect();
        let (kept, stats) = apply_filters(&headers, None, &[]);
        assert_eq!(kept.len(), 2);
        assert_eq!(stats.excluded_count, 0);
    }

    #[test]
    fn test_apply_filters_include_pattern() {
        let headers: BTreeSet<String> = ["Engine/Core.hpp", "Graphics/Shader.hpp"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (kept, _) = apply_filters(&headers, Some("Engine/**"), &[]);
        assert_eq!(kept.len(), 1);
        assert!(kept.contains("Engine/Core.hpp"));
    }

    #[test]
    fn test_apply_filters_single_star_does_not_cross_path_separator() {
        // spec.md §4.1: `*` matches within a path segment only; `**` is the
        // any-depth operator.
        let headers: BTreeSet<String> = ["Engine/Core.hpp", "Engine/sub/Deep.hpp"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (kept, _) = apply_filters(&headers, Some("Engine/*"), &[]);
        assert_eq!(kept.len(), 1);
        assert!(kept.contains("Engine/Core.hpp"));
        assert!(!kept.contains("Engine/sub/Deep.hpp"));
    }

    #[test]
    fn test_apply_filters_double_star_crosses_path_separator() {
        let headers: BTreeSet<String> = ["Engine/Core.hpp", "Engine/sub/Deep.hpp"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (kept, _) = apply_filters(&headers, Some("Engine/**"), &[]);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_apply_filters_exclude_pattern() {
        let headers: BTreeSet<String> = ["Engine/Core.hpp", "Graphics/Shader.hpp"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (kept, _) = apply_filters(&headers, None, &["Graphics/**".to_string()]);
        assert_eq!(kept.len(), 1);
        assert!(kept.contains("Engine/Core.hpp"));
    }

    #[test]
    fn test_apply_filters_pattern_matches_nothing_is_reported() {
        let headers: BTreeSet<String> = ["Engine/Core.hpp"].iter().map(|s| s.to_string()).collect();
        let (_, stats) = apply_filters(&headers, Some("Nonexistent/**"), &[]);
        assert_eq!(stats.patterns_with_no_matches, vec!["Nonexistent/**"]);
    }

    #[test]
    fn test_filter_statistics_formatting() {
        let stats = FilterStatistics {
            total_before: 10,
            total_after: 7,
            excluded_count: 3,
            patterns_with_no_matches: vec!["foo/**".to_string()],
        };
        assert!(stats.format_concise().contains("7 of 10"));
        assert!(stats.format_verbose().contains("foo/**"));
    }
}
