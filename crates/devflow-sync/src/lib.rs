//! devflow-sync - Pinned dependency synchronization
//!
//! Brings a set of external repositories to exact pinned revisions and
//! fetches versioned toolchain archives:
//! - [`resolver`]: ref → [`RevisionId`], HEAD inspection
//! - [`materializer`]: clone when missing, fetch remote metadata
//! - [`converge`]: the per-record convergence procedure
//! - [`toolchain`]: archive download with mirror fallback
//!
//! # Example
//!
//! ```rust,ignore
//! use devflow_sync::{ConvergenceDriver, DependencyRecord, GitCli, Manifest};
//!
//! let manifest = Manifest::new(vec![DependencyRecord::new(
//!     "zigimg",
//!     "https://github.com/zigimg/zigimg.git",
//!     "main",
//! )])?;
//! let driver = ConvergenceDriver::new(GitCli::new(), "external");
//! for result in driver.converge_all(&manifest)? {
//!     println!("{} @ {}", result.record.local_name, result.resolved_revision_id.short());
//! }
//! ```

pub mod converge;
pub mod error;
pub mod manifest;
pub mod materializer;
pub mod resolver;
pub mod revision;
pub mod toolchain;
pub mod vcs;

pub use converge::{Convergence, ConvergenceDriver, ConvergenceResult, MUTABLE_LINES};
pub use error::{DownloadFailure, ManifestError, SyncError, VcsFailure};
pub use manifest::{DependencyRecord, Manifest};
pub use materializer::Materialized;
pub use resolver::RepositoryState;
pub use revision::{RevisionId, RevisionIdError};
pub use toolchain::{
    ArchiveSource, Downloader, HttpDownloader, ToolchainArchive, ToolchainFetcher, ToolchainSpec,
};
pub use vcs::{GitCli, VersionControl, REMOTE};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
