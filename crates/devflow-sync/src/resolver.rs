//! Revision resolution
//!
//! Turns the human-meaningful ref written in a manifest into the commit it
//! currently names, and reads what a checkout is sitting on. Read-only: no
//! function here changes refs or the working tree.

use crate::error::SyncError;
use crate::materializer;
use crate::revision::RevisionId;
use crate::vcs::{VersionControl, REMOTE};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Observed state of a local dependency checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryState {
    /// Checkout directory
    pub local_path: PathBuf,
    /// Commit at HEAD, when a clone exists
    pub current_revision_id: Option<RevisionId>,
    /// Whether the directory is the root of a clone
    pub has_local_clone: bool,
}

/// Resolve `reference` to a commit in the repository at `repo`
///
/// Branch names resolve through the remote-tracking ref first so that a
/// freshly fetched upstream wins over a stale local branch. Tags and full
/// hashes resolve as written.
///
/// # Errors
/// Returns [`SyncError::RefNotFound`] when no candidate resolves
pub fn resolve<V>(vcs: &V, repo: &Path, reference: &str) -> Result<RevisionId, SyncError>
where
    V: VersionControl + ?Sized,
{
    for candidate in candidates(reference) {
        let resolved = vcs
            .rev_parse(repo, &candidate)
            .map_err(|source| SyncError::Vcs {
                path: repo.to_path_buf(),
                source,
            })?;
        if let Some(id) = resolved {
            tracing::debug!("resolved {} via {} to {}", reference, candidate, id.short());
            return Ok(id);
        }
    }
    Err(SyncError::RefNotFound {
        path: repo.to_path_buf(),
        reference: reference.to_string(),
    })
}

/// Commit currently checked out in `repo`
///
/// # Errors
/// Returns [`SyncError::RefNotFound`] for a repository without any commit
pub fn current_revision<V>(vcs: &V, repo: &Path) -> Result<RevisionId, SyncError>
where
    V: VersionControl + ?Sized,
{
    vcs.rev_parse(repo, "HEAD")
        .map_err(|source| SyncError::Vcs {
            path: repo.to_path_buf(),
            source,
        })?
        .ok_or_else(|| SyncError::RefNotFound {
            path: repo.to_path_buf(),
            reference: "HEAD".to_string(),
        })
}

/// Snapshot the state of a checkout without touching it
///
/// # Errors
/// Propagates version control failures for an existing clone
pub fn observe<V>(vcs: &V, repo: &Path) -> Result<RepositoryState, SyncError>
where
    V: VersionControl + ?Sized,
{
    let has_local_clone = materializer::is_local_clone(repo);
    let current_revision_id = if has_local_clone {
        Some(current_revision(vcs, repo)?)
    } else {
        None
    };
    Ok(RepositoryState {
        local_path: repo.to_path_buf(),
        current_revision_id,
        has_local_clone,
    })
}

/// Rev-parse specs to try, in priority order
fn candidates(reference: &str) -> Vec<String> {
    if RevisionId::looks_like(reference) {
        return vec![reference.to_string()];
    }
    vec![
        format!("refs/remotes/{REMOTE}/{reference}"),
        format!("refs/tags/{reference}"),
        reference.to_string(),
    ]
}
