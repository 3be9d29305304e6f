//! Error types for dependency synchronization
//!
//! Every variant is fatal to the current run: downstream build steps assume
//! each dependency sits exactly at its pinned revision, so a partially
//! converged workspace is never reported as success.

use std::path::PathBuf;

/// Main synchronization error type
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Initial clone of a dependency failed
    #[error("clone of {remote} into {} failed: {source}", .path.display())]
    CloneFailed {
        /// Remote location
        remote: String,
        /// Intended checkout path
        path: PathBuf,
        /// Underlying command failure
        source: VcsFailure,
    },

    /// Fetching or integrating upstream history failed
    #[error("fetch in {} failed: {source}", .path.display())]
    FetchFailed {
        /// Repository path
        path: PathBuf,
        /// Underlying command failure
        source: VcsFailure,
    },

    /// A ref could not be resolved to a revision, even after fetching
    #[error("ref {reference:?} not found in {}", .path.display())]
    RefNotFound {
        /// Repository path
        path: PathBuf,
        /// Ref as written in the manifest
        reference: String,
    },

    /// Checkout was refused, usually because of local modifications
    #[error("checkout of {target} in {} failed: {source}", .path.display())]
    CheckoutConflict {
        /// Repository path
        path: PathBuf,
        /// Branch or revision that could not be checked out
        target: String,
        /// Underlying command failure
        source: VcsFailure,
    },

    /// Version control command failed outside the clone/fetch/checkout steps
    #[error("version control error in {}: {source}", .path.display())]
    Vcs {
        /// Repository path
        path: PathBuf,
        /// Underlying command failure
        source: VcsFailure,
    },

    /// Toolchain archive could not be fetched from either host
    #[error("download of {archive} failed (primary: {primary}; mirror: {mirror})")]
    DownloadError {
        /// Archive file name
        archive: String,
        /// Failure reported by the primary host
        primary: DownloadFailure,
        /// Failure reported by the mirror host
        mirror: DownloadFailure,
    },

    /// Manifest is malformed
    #[error("invalid manifest: {0}")]
    Manifest(#[from] ManifestError),

    /// Local filesystem error
    #[error("io error at {}: {source}", .path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}

impl SyncError {
    /// Short machine-readable kind, used in log fields and JSON output
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CloneFailed { .. } => "clone_failed",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::RefNotFound { .. } => "ref_not_found",
            Self::CheckoutConflict { .. } => "checkout_conflict",
            Self::Vcs { .. } => "vcs",
            Self::DownloadError { .. } => "download_error",
            Self::Manifest(_) => "manifest",
            Self::Io { .. } => "io",
        }
    }

    /// Check if re-running the same command may succeed without operator action
    ///
    /// Network-bound failures are retryable; a checkout conflict needs the
    /// working tree cleaned first and a bad manifest needs editing.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CloneFailed { .. } | Self::FetchFailed { .. } | Self::DownloadError { .. }
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A version control command that could not be run or exited unsuccessfully
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{command}` {}{}", describe_status(.status), describe_stderr(.stderr))]
pub struct VcsFailure {
    /// Command line as run
    pub command: String,
    /// Exit code; `None` when the process could not be spawned or was killed
    pub status: Option<i32>,
    /// Captured standard error (trimmed)
    pub stderr: String,
}

impl VcsFailure {
    /// Create a failure record
    #[must_use]
    pub fn new(command: impl Into<String>, status: Option<i32>, stderr: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            status,
            stderr: stderr.into().trim().to_string(),
        }
    }
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exited with status {code}"),
        None => "did not run to completion".to_string(),
    }
}

fn describe_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// One failed download attempt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{url}: {reason}")]
pub struct DownloadFailure {
    /// URL attempted
    pub url: String,
    /// Human readable reason (HTTP status, transport error, io error)
    pub reason: String,
}

impl DownloadFailure {
    /// Create a failure record
    #[must_use]
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Manifest validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    /// Local name is empty or would escape the checkout root
    #[error("dependency name {0:?} is not a safe directory name")]
    UnsafeName(String),

    /// Two records share a local name
    #[error("dependency {0:?} is declared more than once")]
    DuplicateName(String),

    /// Remote location is empty
    #[error("dependency {0:?} has no remote location")]
    MissingRemote(String),

    /// Target revision is empty
    #[error("dependency {0:?} has no target revision")]
    MissingRevision(String),
}
