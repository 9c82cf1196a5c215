use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

/// Raw `#include` directives found in `content`, in source order. Quoted
/// includes (`#include "x.h"`) are always returned; angled includes
/// (`#include <x.h>`) are included only when `skip_system_headers` is
/// false. `//` line comments are stripped before matching; block comments
/// are not handled, matching the original's line-oriented approach.
/// Grounded on
/// `original_source/lib/git_utils.py::parse_includes_from_content`.
pub fn parse_includes_from_content(content: &str, skip_system_headers: bool) -> Vec<String> {
    let quoted = quoted_include_re();
    let angled = angled_include_re();

    let mut includes = Vec::new();
    for raw_line in content.lines() {
        let line = match raw_line.find("//") {
            Some(idx) => &raw_line[..idx],
            None => raw_line,
        };

        if let Some(caps) = quoted.captures(line) {
            includes.push(caps[1].to_string());
            continue;
        }

        if !skip_system_headers {
            if let Some(caps) = angled.captures(line) {
                includes.push(caps[1].to_string());
            }
        }
    }
    includes
}

fn quoted_include_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^\s*#\s*include\s+"([^"]+)""#).unwrap())
}

fn angled_include_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*#\s*include\s+<([^>]+)>").unwrap())
}

/// Resolve one raw `#include "..."` path against the known header universe:
/// first by path-suffix match (the include path as a suffix of a known
/// header, matching on a path-separator boundary), falling back to
/// basename match if no suffix match is found. Returns `None` if neither
/// matches (the header is outside the scanned set, e.g. a system header
/// that slipped through). Grounded on the two-stage matching loop in
/// `original_source/lib/git_utils.py::reconstruct_head_graph`.
pub fn resolve_include<'a>(include_path: &str, known_headers: &'a BTreeSet<PathBuf>) -> Option<&'a Path> {
    let suffix = include_path.replace('/', std::path::MAIN_SEPARATOR_STR);

    for header in known_headers {
        let header_str = header.to_string_lossy();
        if header_str.ends_with(&suffix)
            && (header_str.len() == suffix.len()
                || header_str.as_bytes()[header_str.len() - suffix.len() - 1] == std::path::MAIN_SEPARATOR as u8)
        {
            return Some(header.as_path());
        }
    }

    let include_basename = Path::new(include_path).file_name()?;
    let mut matches = known_headers
        .iter()
        .filter(|h| h.file_name() == Some(include_basename));
    let first = matches.next()?;
    if matches.next().is_some() {
        // Ambiguous basename match across more than one known header: drop
        // per spec.md §4.3 step 5(c), leaving resolution to the caller's
        // unresolved-include log.
        return None;
    }
    Some(first.as_path())
}
