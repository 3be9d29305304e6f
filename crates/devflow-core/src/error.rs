//! Error types for devflow core
//!
//! Provides error handling for:
//! - Dependency synchronization (wrapped [`SyncError`])
//! - External tool invocations and their expected artifacts
//! - Configuration loading
//! - License tables and release archives

use devflow_sync::SyncError;
use std::path::PathBuf;

/// Main devflow error type
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Dependency synchronization failed
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// External tool could not be started
    #[error("failed to start {program}: {source}")]
    ToolSpawn {
        /// Program as configured
        program: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// External tool exited unsuccessfully
    #[error("{command} {}", describe_status(.status))]
    ToolFailed {
        /// Command line as run
        command: String,
        /// Exit code; `None` when terminated by a signal
        status: Option<i32>,
    },

    /// External tool succeeded but did not produce its artifact
    #[error("expected artifact {} was not produced", .path.display())]
    MissingArtifact {
        /// Expected output path
        path: PathBuf,
    },

    /// Configuration file could not be parsed
    #[error("invalid config {}: {source}", .path.display())]
    Config {
        /// Config file path
        path: PathBuf,
        /// Underlying parse error
        source: toml::de::Error,
    },

    /// License table row is malformed
    #[error("{}:{line}: {reason}", .file.display())]
    License {
        /// Table file
        file: PathBuf,
        /// 1-based line number
        line: usize,
        /// What is wrong with the row
        reason: String,
    },

    /// Release archive could not be written
    #[error("archive {} failed: {source}", .path.display())]
    Archive {
        /// Archive path
        path: PathBuf,
        /// Underlying zip error
        source: zip::result::ZipError,
    },

    /// Local filesystem error
    #[error("io error at {}: {source}", .path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}

impl CoreError {
    /// Check if re-running the same command may succeed without operator action
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Sync(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Short machine-readable kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sync(e) => e.kind(),
            Self::ToolSpawn { .. } => "tool_spawn",
            Self::ToolFailed { .. } => "tool_failed",
            Self::MissingArtifact { .. } => "missing_artifact",
            Self::Config { .. } => "config",
            Self::License { .. } => "license",
            Self::Archive { .. } => "archive",
            Self::Io { .. } => "io",
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exited with status {code}"),
        None => "was terminated by a signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failure_display() {
        let e = CoreError::ToolFailed {
            command: "zig build".into(),
            status: Some(1),
        };
        assert_eq!(e.to_string(), "zig build exited with status 1");
        assert_eq!(e.kind(), "tool_failed");
        assert!(!e.is_retryable());
    }

    #[test]
    fn sync_errors_keep_their_classification() {
        let e = CoreError::from(SyncError::RefNotFound {
            path: PathBuf::from("external/zigimg"),
            reference: "v9".into(),
        });
        assert_eq!(e.kind(), "ref_not_found");
        assert_eq!(e.to_string(), "ref \"v9\" not found in external/zigimg");
    }

    #[test]
    fn license_error_points_at_row() {
        let e = CoreError::License {
            file: PathBuf::from("src/licenses.csv"),
            line: 7,
            reason: "expected 4 columns, found 3".into(),
        };
        assert_eq!(e.to_string(), "src/licenses.csv:7: expected 4 columns, found 3");
    }
}
