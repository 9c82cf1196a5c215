/// Argument/path validation behavior (spec.md §7 "Validation" row: exit 1,
/// no analysis attempted).
use std::process::Command;

fn depcheck_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_depcheck"))
}

#[test]
fn dsm_rejects_missing_build_directory() {
    let output = depcheck_cmd()
        .args(["dsm", "/nonexistent/depcheck-validation-fixture"])
        .output()
        .expect("failed to run depcheck dsm");

    assert_eq!(output.status.code(), Some(1), "missing build dir should exit 1");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"), "stderr: {stderr}");
}

#[test]
fn dsm_rejects_build_directory_that_is_a_file() {
    let file = tempfile::NamedTempFile::new().expect("failed to create temp file");
    let output = depcheck_cmd()
        .args(["dsm", file.path().to_str().unwrap()])
        .output()
        .expect("failed to run depcheck dsm");

    assert_eq!(output.status.code(), Some(1), "non-directory build dir should exit 1");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("is not a directory"), "stderr: {stderr}");
}

#[test]
fn hell_rejects_zero_threshold() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let output = depcheck_cmd()
        .args(["hell", dir.path().to_str().unwrap(), "--threshold", "0"])
        .output()
        .expect("failed to run depcheck hell");

    assert_eq!(output.status.code(), Some(1), "zero threshold should exit 1");
}

#[test]
fn ripple_requires_at_least_one_changed_header() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let output = depcheck_cmd()
        .args(["ripple", dir.path().to_str().unwrap()])
        .output()
        .expect("failed to run depcheck ripple");

    // clap rejects a missing required --changed before any analysis runs.
    assert!(!output.status.success());
}

#[test]
fn init_creates_default_config() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let output = depcheck_cmd()
        .args(["init"])
        .current_dir(dir.path())
        .output()
        .expect("failed to run depcheck init");

    assert!(output.status.success());
    assert!(dir.path().join(".depcheck.toml").exists());
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    std::fs::write(dir.path().join(".depcheck.toml"), "# existing\n").unwrap();

    let output = depcheck_cmd()
        .args(["init"])
        .current_dir(dir.path())
        .output()
        .expect("failed to run depcheck init");

    assert!(!output.status.success());
    let contents = std::fs::read_to_string(dir.path().join(".depcheck.toml")).unwrap();
    assert_eq!(contents, "# existing\n");
}

#[test]
fn init_force_overwrites_existing_config() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    std::fs::write(dir.path().join(".depcheck.toml"), "# existing\n").unwrap();

    let output = depcheck_cmd()
        .args(["init", "--force"])
        .current_dir(dir.path())
        .output()
        .expect("failed to run depcheck init");

    assert!(output.status.success());
    let contents = std::fs::read_to_string(dir.path().join(".depcheck.toml")).unwrap();
    assert_ne!(contents, "# existing\n");
}
