use std::path::{Path, PathBuf};

use anyhow::Context;
use depcheck_core::error::{DepcheckError, Result};
use serde::{Deserialize, Serialize};

/// One entry of a `compile_commands.json` (spec.md §4.2 "Compilation
/// database"). `command` and `arguments` are mutually exclusive in the JSON
/// Compilation Database format; both are kept so callers don't have to care
/// which style a given build system emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileEntry {
    pub directory: PathBuf,
    pub file: PathBuf,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub arguments: Option<Vec<String>>,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl CompileEntry {
    /// The absolute path to the translation unit, honoring `directory` when
    /// `file` is relative (spec.md §4.2 contract point 1).
    pub fn absolute_file(&self) -> PathBuf {
        if self.file.is_absolute() {
            self.file.clone()
        } else {
            self.directory.join(&self.file)
        }
    }

    /// Tokenized compiler invocation, splitting `command` on whitespace if
    /// `arguments` wasn't supplied (spec.md §4.2 contract point 2).
    pub fn argv(&self) -> Vec<String> {
        if let Some(args) = &self.arguments {
            args.clone()
        } else if let Some(cmd) = &self.command {
            split_command_line(cmd)
        } else {
            Vec::new()
        }
    }

    /// True for a genuine C/C++ *compile* entry: a recognized source
    /// extension, a `-c` flag, and a recognized C/C++ compiler driver (spec.md
    /// §4.2 contract point 3, all three required). Entries with a `.cpp`/`.cc`
    /// file but no `-c` (e.g. a link step) or a non-compiler driver are
    /// excluded even though the extension matches.
    pub fn is_cxx_source(&self) -> bool {
        self.has_cxx_extension() && self.has_compile_flag() && self.has_cxx_compiler()
    }

    fn has_cxx_extension(&self) -> bool {
        matches!(
            self.file.extension().and_then(|e| e.to_str()),
            Some("c") | Some("cc") | Some("cpp") | Some("cxx") | Some("C")
        )
    }

    fn has_compile_flag(&self) -> bool {
        self.argv().iter().any(|arg| arg == "-c")
    }

    fn has_cxx_compiler(&self) -> bool {
        self.argv()
            .first()
            .and_then(|driver| Path::new(driver).file_name())
            .and_then(|name| name.to_str())
            .map(is_recognized_compiler)
            .unwrap_or(false)
    }
}

/// Recognized C/C++ compiler driver basenames (spec.md §4.2 contract point
/// 3), matched after stripping any version/target suffix a build system may
/// append (e.g. `clang++-15`, `x86_64-w64-mingw32-g++`).
fn is_recognized_compiler(basename: &str) -> bool {
    const DRIVERS: &[&str] = &["clang++", "clang", "g++", "gcc", "c++", "cc"];
    DRIVERS.iter().any(|driver| {
        basename == *driver
            || basename.starts_with(&format!("{driver}-"))
            || basename.ends_with(&format!("-{driver}"))
    })
}

/// Minimal shell-word split honoring single/double quotes, enough for the
/// compiler invocations build systems emit into `command` (most builds
/// already use `arguments` and never exercise this path).
fn split_command_line(cmd: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = cmd.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            None => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Load and parse a `compile_commands.json` at `path` (spec.md §4.2
/// contract point 4: a missing build directory and a malformed JSON
/// document are distinguished, validation-class errors).
pub fn load_compile_commands(path: &Path) -> Result<Vec<CompileEntry>> {
    if !path.exists() {
        return Err(DepcheckError::validation(format!(
            "no compile_commands.json at {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))
        .map_err(DepcheckError::Other)?;

    let entries: Vec<CompileEntry> = serde_json::from_str(&content)
        .with_context(|| format!("malformed compile_commands.json at {}", path.display()))
        .map_err(DepcheckError::Other)?;

    Ok(entries)
}

/// `entries` restricted to C/C++ translation units, the only inputs the
/// scanner invokes a compiler on (spec.md §4.2 contract point 3).
pub fn filter_cxx_sources(entries: &[CompileEntry]) -> Vec<&CompileEntry> {
    entries.iter().filter(|e| e.is_cxx_source()).collect()
}

const COMPILE_DB_FILENAME: &str = "compile_commands.json";
const FILTERED_DB_FILENAME: &str = "compile_commands.filtered.json";

/// Produce a filtered `compile_commands.json` for `build_dir`, generating
/// and/or regenerating it as needed, and reusing the on-disk cache when it
/// is still fresh (spec.md §4.2 contract points 1-4). Grounded on
/// `original_source/buildCheckIncludeGraph.py::create_filtered_compile_commands`.
pub fn ensure_filtered_compile_commands(build_dir: &Path) -> Result<PathBuf> {
    if !build_dir.is_dir() {
        return Err(DepcheckError::validation(format!(
            "build directory does not exist: {}",
            build_dir.display()
        )));
    }
    let build_dir = build_dir
        .canonicalize()
        .map_err(|e| DepcheckError::validation(format!("invalid build directory: {e}")))?;

    let compile_db = build_dir.join(COMPILE_DB_FILENAME);
    let filtered_db = build_dir.join(FILTERED_DB_FILENAME);
    let build_ninja = build_dir.join("build.ninja");

    for path in [&compile_db, &filtered_db, &build_ninja] {
        if path.parent() != Some(build_dir.as_path()) {
            return Err(DepcheckError::PathTraversal { path: path.clone() });
        }
    }

    // Contract point 2: build.ninja newer than compile_commands.json
    // invalidates both the database and the filtered cache.
    if let (Ok(ninja_meta), Ok(db_meta)) = (build_ninja.metadata(), compile_db.metadata()) {
        if mtime(&ninja_meta) > mtime(&db_meta) {
            let _ = std::fs::remove_file(&compile_db);
            let _ = std::fs::remove_file(&filtered_db);
        }
    }

    // Contract point 3: reuse the filtered cache when it postdates both
    // inputs.
    if let Ok(filtered_meta) = filtered_db.metadata() {
        let filtered_mtime = mtime(&filtered_meta);
        let ninja_stale = build_ninja
            .metadata()
            .map(|m| mtime(&m) > filtered_mtime)
            .unwrap_or(false);
        let db_stale = compile_db
            .metadata()
            .map(|m| mtime(&m) > filtered_mtime)
            .unwrap_or(false);
        if !ninja_stale && !db_stale {
            return Ok(filtered_db);
        }
    }

    // Contract point 1: generate compile_commands.json via the build
    // tool's compdb query if it's missing.
    if !compile_db.exists() {
        generate_compile_commands(&build_dir, &compile_db)?;
    }

    let entries = load_compile_commands(&compile_db)?;
    let filtered: Vec<&CompileEntry> = filter_cxx_sources(&entries);
    let json = serde_json::to_string_pretty(&filtered)
        .with_context(|| "failed to serialize filtered compile database")
        .map_err(DepcheckError::Other)?;
    std::fs::write(&filtered_db, json)
        .with_context(|| format!("failed to write {}", filtered_db.display()))
        .map_err(DepcheckError::Other)?;

    Ok(filtered_db)
}

fn mtime(meta: &std::fs::Metadata) -> std::time::SystemTime {
    meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH)
}

fn generate_compile_commands(build_dir: &Path, compile_db: &Path) -> Result<()> {
    let output = std::process::Command::new("ninja")
        .args(["-t", "compdb"])
        .current_dir(build_dir)
        .output();

    let output = match output {
        Ok(o) => o,
        Err(_) => {
            return Err(DepcheckError::ToolMissing {
                tried: vec!["ninja".to_string()],
                hint: "install ninja and ensure it is on PATH".to_string(),
            });
        }
    };

    if !output.status.success() {
        return Err(DepcheckError::ToolFailure {
            tool: "ninja -t compdb".to_string(),
            failed_count: 1,
            total_count: 1,
            sample: String::from_utf8_lossy(&output.stderr).chars().take(500).collect(),
        });
    }

    std::fs::write(compile_db, &output.stdout)
        .with_context(|| format!("failed to write {}", compile_db.display()))
        .map_err(DepcheckError::Other)
}
