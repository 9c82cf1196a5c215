use std::path::PathBuf;

use thiserror::Error;

/// The error taxonomy of the engine. Each variant maps to exactly one
/// process exit code at the CLI boundary: `exit_code()` is the single
/// source of truth for that mapping, so `depcheck`'s `main.rs` never has
/// to re-derive it.
#[derive(Debug, Error)]
pub enum DepcheckError {
    #[error("{message}")]
    Validation { message: String },

    #[error("external tool not found: tried {tried:?}. {hint}")]
    ToolMissing { tried: Vec<String>, hint: String },

    #[error("{tool} failed on {failed_count} of {total_count} entries: {sample}")]
    ToolFailure {
        tool: String,
        failed_count: usize,
        total_count: usize,
        sample: String,
    },

    #[error("{tool} timed out after {elapsed_secs}s (limit {limit_secs}s)")]
    Timeout {
        tool: String,
        elapsed_secs: u64,
        limit_secs: u64,
    },

    #[error(
        "snapshot schema mismatch: expected {expected}, got {actual}"
    )]
    SchemaMismatch { expected: String, actual: String },

    #[error(
        "snapshot metadata mismatch: expected {expected_dir} on {expected_host}, got {actual_dir} on {actual_host}"
    )]
    MetadataMismatch {
        expected_dir: String,
        expected_host: String,
        actual_dir: String,
        actual_host: String,
    },

    #[error("path escapes allowed root: {path}")]
    PathTraversal { path: PathBuf },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DepcheckError {
    pub fn validation(message: impl Into<String>) -> Self {
        DepcheckError::Validation {
            message: message.into(),
        }
    }

    /// The process exit code this error should produce, per spec.md §6/§7.
    pub fn exit_code(&self) -> i32 {
        match self {
            DepcheckError::Validation { .. } => 1,
            DepcheckError::SchemaMismatch { .. } => 1,
            DepcheckError::MetadataMismatch { .. } => 1,
            DepcheckError::PathTraversal { .. } => 1,
            DepcheckError::ToolMissing { .. } => 2,
            DepcheckError::ToolFailure { .. } => 2,
            DepcheckError::Timeout { .. } => 2,
            DepcheckError::Other(_) => 2,
        }
    }
}

pub type Result<T> = std::result::Result<T, DepcheckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(DepcheckError::validation("bad arg").exit_code(), 1);
        assert_eq!(
            DepcheckError::SchemaMismatch {
                expected: "1.1".into(),
                actual: "1.0".into()
            }
            .exit_code(),
            1
        );
        assert_eq!(
            DepcheckError::ToolMissing {
                tried: vec!["clang-scan-deps".into()],
                hint: "install clang".into()
            }
            .exit_code(),
            2
        );
        assert_eq!(
            DepcheckError::Timeout {
                tool: "scanner".into(),
                elapsed_secs: 600,
                limit_secs: 600
            }
            .exit_code(),
            2
        );
    }

    #[test]
    fn test_other_wraps_anyhow() {
        let e: DepcheckError = anyhow::anyhow!("boom").into();
        assert_eq!(e.exit_code(), 2);
    }
}
