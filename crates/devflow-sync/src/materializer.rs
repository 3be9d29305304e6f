//! Repository materialization
//!
//! Makes sure a dependency has a local clone and up-to-date remote-tracking
//! metadata. Neither operation touches an existing working tree.

use crate::error::{SyncError, VcsFailure};
use crate::vcs::VersionControl;
use std::path::Path;

/// Whether [`ensure_cloned`] had to create the checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialized {
    /// A clone was already present; nothing ran
    Present,
    /// A full clone was performed
    Cloned,
}

/// Whether `repo` is the root of a clone
///
/// Only the directory's own `.git` counts. Git would otherwise discover an
/// enclosing repository (usually the project itself) and operate on that.
#[must_use]
pub fn is_local_clone(repo: &Path) -> bool {
    repo.join(".git").exists()
}

/// Clone `remote` into `repo` unless a clone is already there
///
/// The parent directory is created when missing so a fresh workspace can be
/// bootstrapped in one call. A leftover empty directory is cloned into.
///
/// # Errors
/// Returns [`SyncError::CloneFailed`] when the clone command fails or `repo`
/// is a non-empty directory that is not a clone
pub fn ensure_cloned<V>(vcs: &V, repo: &Path, remote: &str) -> Result<Materialized, SyncError>
where
    V: VersionControl + ?Sized,
{
    if is_local_clone(repo) {
        return Ok(Materialized::Present);
    }
    if repo.exists() {
        let empty = std::fs::read_dir(repo)
            .map_err(|e| SyncError::io(repo, e))?
            .next()
            .is_none();
        if !empty {
            return Err(SyncError::CloneFailed {
                remote: remote.to_string(),
                path: repo.to_path_buf(),
                source: VcsFailure::new(
                    format!("git clone {remote} {}", repo.display()),
                    None,
                    "destination exists, is not empty and is not a git repository",
                ),
            });
        }
    } else if let Some(parent) = repo.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
    }
    tracing::info!("cloning {} into {}", remote, repo.display());
    vcs.clone_repository(remote, repo)
        .map_err(|source| SyncError::CloneFailed {
            remote: remote.to_string(),
            path: repo.to_path_buf(),
            source,
        })?;
    Ok(Materialized::Cloned)
}

/// Refresh remote-tracking refs and tags of `repo`
///
/// Must run before resolution so a ref pushed upstream since the last run
/// is resolvable.
///
/// # Errors
/// Returns [`SyncError::FetchFailed`] when the fetch command fails
pub fn fetch_remote<V>(vcs: &V, repo: &Path) -> Result<(), SyncError>
where
    V: VersionControl + ?Sized,
{
    vcs.fetch(repo).map_err(|source| SyncError::FetchFailed {
        path: repo.to_path_buf(),
        source,
    })
}
