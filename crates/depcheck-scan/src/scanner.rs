use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use depcheck_core::error::{DepcheckError, Result};
use depcheck_core::types::SourceDependencyMap;

/// Candidate executable names tried in order, newest first (spec.md §6
/// "Multiple candidate executable names are tried in order; the first that
/// responds to `--version` wins"). Grounded on
/// `original_source/lib/tool_detection.py::CLANG_SCAN_DEPS_COMMANDS`.
const SCANNER_CANDIDATES: &[&str] = &[
    "clang-scan-deps-20",
    "clang-scan-deps-19",
    "clang-scan-deps-18",
    "clang-scan-deps",
];

/// Default wall-clock timeout for the scanner invocation (spec.md §5
/// "Cancellation and timeouts": "default 10 minutes").
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub struct ScannerTool {
    pub command: String,
    pub version: String,
}

/// Probe each candidate in `SCANNER_CANDIDATES` with `--version`; the first
/// one that responds wins (spec.md §6). Grounded on
/// `original_source/lib/tool_detection.py::find_clang_scan_deps`.
pub fn find_scanner() -> Result<ScannerTool> {
    find_scanner_among(SCANNER_CANDIDATES)
}

fn find_scanner_among(candidates: &[&str]) -> Result<ScannerTool> {
    for &candidate in candidates {
        if let Some(version) = probe_version(candidate) {
            return Ok(ScannerTool {
                command: candidate.to_string(),
                version,
            });
        }
    }

    Err(DepcheckError::ToolMissing {
        tried: candidates.iter().map(|s| s.to_string()).collect(),
        hint: "install clang-tools (e.g. `apt install clang-tools-19` or `dnf install clang-tools-extra`)"
            .to_string(),
    })
}

fn probe_version(command: &str) -> Option<String> {
    let output = std::process::Command::new(command)
        .arg("--version")
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout.lines().next().map(|line| line.trim().to_string())
}

/// Result of one scanner invocation: the raw per-source dependency lists
/// (scanner order preserved) plus the count of targets the parser dropped
/// because they were malformed (spec.md §4.3 step 6 "entries lost this way
/// are tracked and reported").
#[derive(Debug, Clone, Default)]
pub struct ScanOutput {
    pub source_to_deps: SourceDependencyMap,
    pub malformed_targets: usize,
}

/// Invoke `tool` over `filtered_db` with `jobs` parallelism, honoring
/// `timeout`, then parse its makefile-format stdout (spec.md §4.3, §5
/// domain 1, §6 "Compiler dependency scanner"). A non-zero exit status is
/// not itself fatal (partial-failure tolerance, spec.md §4.3 step 6); only
/// a failure to spawn the process or an expired timeout is.
pub fn run_scanner(
    tool: &ScannerTool,
    filtered_db: &Path,
    build_dir: &Path,
    jobs: usize,
    timeout: Duration,
) -> Result<ScanOutput> {
    let mut child = std::process::Command::new(&tool.command)
        .arg(format!("-compilation-database={}", filtered_db.display()))
        .arg("-format=make")
        .arg("-j")
        .arg(jobs.to_string())
        .current_dir(build_dir)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| {
            DepcheckError::Other(anyhow::anyhow!("failed to spawn {}: {e}", tool.command))
        })?;

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait().map_err(|e| DepcheckError::Other(e.into()))? {
            break status;
        }
        if start.elapsed() > timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(DepcheckError::Timeout {
                tool: tool.command.clone(),
                elapsed_secs: start.elapsed().as_secs(),
                limit_secs: timeout.as_secs(),
            });
        }
        std::thread::sleep(Duration::from_millis(25));
    };

    let output = child
        .wait_with_output()
        .map_err(|e| DepcheckError::Other(e.into()))?;
    let _ = status;

    if !output.status.success() {
        eprintln!(
            "warning: {} exited with a non-zero status; continuing with partial results",
            tool.command
        );
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().take(10) {
            if !line.trim().is_empty() {
                eprintln!("  {line}");
            }
        }
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_makefile_output(&stdout))
}

/// Parse makefile-format dependency rules emitted by the scanner (spec.md
/// §4.3 steps 1-2). Each target's rule may span multiple lines joined by a
/// trailing `\`; the first token after the target's colon is the source
/// file, the rest are its transitive dependencies. Grounded on the
/// `process_deps`/target-splitting loop of
/// `original_source/buildCheckIncludeGraph.py::build_include_graph_from_clang_scan`.
pub fn parse_makefile_output(stdout: &str) -> ScanOutput {
    let mut source_to_deps = SourceDependencyMap::new();
    let mut malformed_targets = 0;
    let mut tokens: Vec<String> = Vec::new();

    let mut flush = |tokens: &mut Vec<String>| {
        if tokens.len() < 2 {
            if !tokens.is_empty() {
                malformed_targets += 1;
            }
            tokens.clear();
            return;
        }
        let source = PathBuf::from(&tokens[1]);
        let deps: Vec<PathBuf> = tokens[2..].iter().map(PathBuf::from).collect();
        source_to_deps.insert(source, deps);
        tokens.clear();
    };

    for raw_line in stdout.lines() {
        let is_target_line = !raw_line.starts_with(' ') && !raw_line.starts_with('\t');
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if is_target_line && !tokens.is_empty() {
            flush(&mut tokens);
        }
        let line = trimmed.strip_suffix('\\').unwrap_or(trimmed).trim_end();
        tokens.extend(line.split_whitespace().map(|s| s.to_string()));
    }
    flush(&mut tokens);

    ScanOutput {
        source_to_deps,
        malformed_targets,
    }
}

/// Project headers directly reachable from `all_headers`, restricted to
/// those under `project_root` (spec.md §4.3 step 5 operates only on
/// project header text; system/third-party headers aren't reparsed for
/// direct includes since their internal structure isn't part of the
/// project's architecture).
pub fn project_headers_only<'a>(
    all_headers: &'a BTreeSet<PathBuf>,
    project_root: &Path,
) -> BTreeSet<&'a PathBuf> {
    all_headers
        .iter()
        .filter(|h| h.starts_with(project_root))
        .collect()
}
