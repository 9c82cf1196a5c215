use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use depcheck_core::error::{DepcheckError, Result};
use depcheck_core::types::IncludeGraph;
use depcheck_scan::{parse_includes_from_content, resolve_include};
use git2::{Delta, Repository, Tree, TreeWalkMode, TreeWalkResult};

/// VCS command timeout (spec.md §5 "VCS commands have a short timeout
/// (<= 5 s); on expiry the affected operation reports an explicit
/// VCS-timeout error"). Applies to the commit-resolution and diff step,
/// not to the historical-blob reads that follow (spec.md §5 names those a
/// separate, unbounded suspension point: "filesystem reads of large files
/// (e.g., reading a header content from the VCS for reconstruction)").
const VCS_TIMEOUT: Duration = Duration::from_secs(5);

const HEADER_EXTENSIONS: &[&str] = &["h", "hpp", "hxx", "hh"];

fn is_header(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| HEADER_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// The result of reconstructing a baseline include graph from version
/// control (spec.md §4.6 "Baseline reconstruction from VCS").
#[derive(Debug, Clone)]
pub struct BaselineGraph {
    pub headers: BTreeSet<PathBuf>,
    pub include_graph: IncludeGraph,
}

/// Reject any VCS-returned path that attempts traversal outside the
/// repository root, or that is already absolute (spec.md §4.6 closing
/// security paragraph: "reject `..` traversal, reject absolute paths,
/// reject paths outside the repository root"). Grounded on
/// `original_source/lib/git_utils.py::_validate_and_convert_path`.
fn validate_vcs_path(repo_root: &Path, relative: &str) -> Option<PathBuf> {
    if relative.contains("..") || Path::new(relative).is_absolute() {
        return None;
    }
    let abs = repo_root.join(relative);
    if !abs.starts_with(repo_root) {
        return None;
    }
    Some(abs)
}

struct DiffCategorization {
    added: BTreeSet<PathBuf>,
    deleted: BTreeSet<PathBuf>,
    modified: BTreeSet<PathBuf>,
    headers_in_base: BTreeSet<PathBuf>,
}

/// Run `f` on a fresh thread, failing with a `Timeout` error if it doesn't
/// finish within `VCS_TIMEOUT`. The thread is detached on timeout; libgit2
/// calls are not cancellable mid-flight, so a slow operation continues to
/// completion in the background while the caller moves on with an error.
fn with_vcs_timeout<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(f());
    });
    match rx.recv_timeout(VCS_TIMEOUT) {
        Ok(result) => result,
        Err(_) => Err(DepcheckError::Timeout {
            tool: "git".to_string(),
            elapsed_secs: VCS_TIMEOUT.as_secs(),
            limit_secs: VCS_TIMEOUT.as_secs(),
        }),
    }
}

fn open_repo(repo_root: &Path) -> Result<Repository> {
    Repository::discover(repo_root)
        .map_err(|e| DepcheckError::validation(format!("not a git repository: {e}")))
}

fn categorize_diff(repo_root: PathBuf, base_ref: String) -> Result<DiffCategorization> {
    let repo = open_repo(&repo_root)?;
    let workdir = repo
        .workdir()
        .ok_or_else(|| DepcheckError::validation("repository has no working directory".to_string()))?
        .to_path_buf();

    let base_commit = repo
        .revparse_single(&base_ref)
        .and_then(|o| o.peel_to_commit())
        .map_err(|_| DepcheckError::validation(format!("invalid commit reference: {base_ref}")))?;
    let base_tree = base_commit.tree().map_err(|e| DepcheckError::Other(e.into()))?;

    let diff = repo
        .diff_tree_to_workdir(Some(&base_tree), None)
        .map_err(|e| DepcheckError::Other(e.into()))?;

    let mut added = BTreeSet::new();
    let mut deleted = BTreeSet::new();
    let mut modified = BTreeSet::new();

    diff.foreach(
        &mut |delta, _progress| {
            let path = delta.new_file().path().or_else(|| delta.old_file().path());
            let Some(path) = path else { return true };
            if !is_header(path) {
                return true;
            }
            let Some(path_str) = path.to_str() else { return true };
            let Some(abs) = validate_vcs_path(&workdir, path_str) else {
                return true;
            };
            match delta.status() {
                Delta::Added | Delta::Untracked => {
                    added.insert(abs);
                }
                Delta::Deleted => {
                    deleted.insert(abs);
                }
                Delta::Modified | Delta::Renamed | Delta::Typechange => {
                    modified.insert(abs);
                }
                _ => {}
            }
            true
        },
        None,
        None,
        None,
    )
    .map_err(|e| DepcheckError::Other(e.into()))?;

    let mut headers_in_base = BTreeSet::new();
    base_tree
        .walk(TreeWalkMode::PreOrder, |dir, entry| {
            if let Some(name) = entry.name() {
                let rel = format!("{dir}{name}");
                if is_header(Path::new(&rel)) {
                    if let Some(abs) = validate_vcs_path(&workdir, &rel) {
                        headers_in_base.insert(abs);
                    }
                }
            }
            TreeWalkResult::Ok
        })
        .map_err(|e| DepcheckError::Other(e.into()))?;

    Ok(DiffCategorization {
        added,
        deleted,
        modified,
        headers_in_base,
    })
}

fn read_blob_at(repo: &Repository, tree: &Tree, repo_root: &Path, abs_path: &Path) -> Option<String> {
    let rel = abs_path.strip_prefix(repo_root).ok()?;
    let entry = tree.get_path(rel).ok()?;
    let object = entry.to_object(repo).ok()?;
    let blob = object.as_blob()?;
    Some(String::from_utf8_lossy(blob.content()).into_owned())
}

fn resolve_includes_against(content: &str, known_headers: &BTreeSet<PathBuf>) -> BTreeSet<PathBuf> {
    parse_includes_from_content(content, true)
        .iter()
        .filter_map(|raw| resolve_include(raw, known_headers))
        .map(|p| p.to_path_buf())
        .collect()
}

/// Reconstruct the baseline include graph at `base_ref` from the working
/// tree's graph plus the diff between `base_ref` and the working tree
/// (spec.md §4.6 steps 1-4). Grounded on
/// `original_source/lib/git_utils.py::reconstruct_head_graph`, reimplemented
/// against `git2` instead of GitPython.
pub fn reconstruct_baseline(
    repo_root: &Path,
    base_ref: &str,
    working_tree_headers: &BTreeSet<PathBuf>,
    working_tree_graph: &IncludeGraph,
) -> Result<BaselineGraph> {
    let categorization = with_vcs_timeout({
        let repo_root = repo_root.to_path_buf();
        let base_ref = base_ref.to_string();
        move || categorize_diff(repo_root, base_ref)
    })?;

    // Any header present in the working tree but absent from base_ref's
    // tree (and not already flagged by the diff, e.g. an untracked file
    // the scanner picked up) is also an addition.
    let mut added_files = categorization.added;
    for header in working_tree_headers {
        if !categorization.headers_in_base.contains(header) && !added_files.contains(header) {
            added_files.insert(header.clone());
        }
    }

    // Step 1: clone the working tree graph.
    let mut baseline_headers = working_tree_headers.clone();
    let mut baseline_graph: IncludeGraph = working_tree_graph.clone();

    // Step 2: remove files added in the working tree, and strip every
    // reference to them from other headers' dependency sets.
    for added in &added_files {
        baseline_headers.remove(added);
        baseline_graph.remove(added);
        for deps in baseline_graph.values_mut() {
            deps.remove(added);
        }
    }

    // Steps 3-4 read historical blob content; reopen the repository here
    // rather than inside the timeout-guarded categorization step, since
    // spec.md §5 treats these reads as a distinct, unbounded suspension
    // point ("reading a header content from the VCS for reconstruction").
    let repo = open_repo(repo_root)?;
    let base_commit = repo
        .revparse_single(base_ref)
        .and_then(|o| o.peel_to_commit())
        .map_err(|_| DepcheckError::validation(format!("invalid commit reference: {base_ref}")))?;
    let base_tree = base_commit.tree().map_err(|e| DepcheckError::Other(e.into()))?;
    let workdir = repo
        .workdir()
        .ok_or_else(|| DepcheckError::validation("repository has no working directory".to_string()))?
        .to_path_buf();

    // Step 3: restore files deleted in the working tree from base_ref.
    for deleted in &categorization.deleted {
        if let Some(content) = read_blob_at(&repo, &base_tree, &workdir, deleted) {
            let resolved = resolve_includes_against(&content, &baseline_headers);
            baseline_headers.insert(deleted.clone());
            baseline_graph.insert(deleted.clone(), resolved);
        } else {
            eprintln!(
                "warning: could not read {} at {} to restore it in the baseline",
                deleted.display(),
                base_ref
            );
        }
    }

    // Step 4: replace modified files' outgoing edges with base_ref content.
    for modified in &categorization.modified {
        if let Some(content) = read_blob_at(&repo, &base_tree, &workdir, modified) {
            let resolved = resolve_includes_against(&content, &baseline_headers);
            baseline_graph.insert(modified.clone(), resolved);
        } else {
            eprintln!(
                "warning: could not read {} at {}; keeping working-tree edges",
                modified.display(),
                base_ref
            );
        }
    }

    Ok(BaselineGraph {
        headers: baseline_headers,
        include_graph: baseline_graph,
    })
}

/// Check whether `ancestor_ref` is an ancestor of (or equal to)
/// `descendant_ref` (spec.md §6 "check ancestor relationships"). Grounded
/// on `original_source/lib/git_utils.py::is_ancestor`.
pub fn is_ancestor(repo_root: &Path, ancestor_ref: &str, descendant_ref: &str) -> Result<bool> {
    let repo_root = repo_root.to_path_buf();
    let ancestor_ref = ancestor_ref.to_string();
    let descendant_ref = descendant_ref.to_string();
    with_vcs_timeout(move || {
        let repo = open_repo(&repo_root)?;
        let ancestor = repo
            .revparse_single(&ancestor_ref)
            .and_then(|o| o.peel_to_commit())
            .map_err(|_| DepcheckError::validation(format!("invalid commit reference: {ancestor_ref}")))?;
        let descendant = repo
            .revparse_single(&descendant_ref)
            .and_then(|o| o.peel_to_commit())
            .map_err(|_| DepcheckError::validation(format!("invalid commit reference: {descendant_ref}")))?;
        if ancestor.id() == descendant.id() {
            return Ok(true);
        }
        repo.graph_descendant_of(descendant.id(), ancestor.id())
            .map_err(|e| DepcheckError::Other(e.into()))
    })
}
