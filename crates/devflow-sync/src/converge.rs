//! Convergence driver
//!
//! Brings each manifest record's checkout to its pinned revision:
//!
//! 1. clone when missing, then fetch
//! 2. resolve the target and HEAD
//! 3. [`Convergence::Converged`] → stop, nothing else runs
//! 4. [`Convergence::Diverged`] → checkout the mutable line (`main`, else
//!    `master`) at its upstream tip, update submodules, detach at the target
//!
//! A fresh clone that already sits on the target still gets its submodules.
//!
//! The first failing record aborts the whole run.

use crate::error::{SyncError, VcsFailure};
use crate::manifest::{DependencyRecord, Manifest};
use crate::materializer::{self, Materialized};
use crate::resolver;
use crate::revision::RevisionId;
use crate::vcs::{VersionControl, REMOTE};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Branches tried, in order, as the mutable line
pub const MUTABLE_LINES: [&str; 2] = ["main", "master"];

/// Relationship between a checkout and its pinned target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Convergence {
    /// HEAD already equals the target
    Converged,
    /// HEAD differs from the target
    Diverged {
        /// Commit currently checked out
        current: RevisionId,
    },
}

impl Convergence {
    /// Compare the checked-out commit with the wanted one
    #[must_use]
    pub fn assess(current: RevisionId, wanted: &RevisionId) -> Self {
        if current == *wanted {
            Self::Converged
        } else {
            Self::Diverged { current }
        }
    }
}

/// Outcome of converging one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvergenceResult {
    /// Record that was converged
    pub record: DependencyRecord,
    /// True when nothing had to change
    pub already_converged: bool,
    /// Commit the target resolved to (and HEAD now equals)
    pub resolved_revision_id: RevisionId,
    /// True when the clone was created during this call
    pub cloned: bool,
    /// Branch used for integration; `None` when already converged
    pub mutable_line: Option<String>,
}

/// Applies the convergence procedure to manifest records
#[derive(Debug)]
pub struct ConvergenceDriver<V> {
    vcs: V,
    checkout_root: PathBuf,
}

impl<V: VersionControl> ConvergenceDriver<V> {
    /// Create a driver placing checkouts under `checkout_root`
    pub fn new(vcs: V, checkout_root: impl Into<PathBuf>) -> Self {
        Self {
            vcs,
            checkout_root: checkout_root.into(),
        }
    }

    /// Directory holding all dependency checkouts
    #[must_use]
    pub fn checkout_root(&self) -> &Path {
        &self.checkout_root
    }

    /// Version control backend
    #[must_use]
    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    /// Checkout directory for `record`
    #[must_use]
    pub fn local_path(&self, record: &DependencyRecord) -> PathBuf {
        self.checkout_root.join(&record.local_name)
    }

    /// Converge every record in declaration order
    ///
    /// # Errors
    /// Stops at, and returns, the first record that fails
    pub fn converge_all(&self, manifest: &Manifest) -> Result<Vec<ConvergenceResult>, SyncError> {
        let mut results = Vec::with_capacity(manifest.len());
        for record in manifest {
            tracing::info!("---- {} ----", record.local_name);
            match self.converge(record) {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!("{} failed ({}): {}", record.local_name, e.kind(), e);
                    return Err(e);
                }
            }
        }
        Ok(results)
    }

    /// Bring one record's checkout to its pinned revision
    ///
    /// # Errors
    /// Returns the error of the first step that fails
    pub fn converge(&self, record: &DependencyRecord) -> Result<ConvergenceResult, SyncError> {
        let path = self.local_path(record);

        let materialized = materializer::ensure_cloned(&self.vcs, &path, &record.remote_location)?;
        materializer::fetch_remote(&self.vcs, &path)?;

        let wanted = resolver::resolve(&self.vcs, &path, &record.target_revision)?;
        let current = resolver::current_revision(&self.vcs, &path)?;

        let mutable_line = match Convergence::assess(current, &wanted) {
            Convergence::Converged => {
                tracing::info!("{} already at {}", record.local_name, wanted.short());
                if materialized == Materialized::Cloned {
                    self.update_submodules(&path)?;
                }
                None
            }
            Convergence::Diverged { current } => {
                tracing::info!(
                    "{}: {} -> {} ({})",
                    record.local_name,
                    current.short(),
                    wanted.short(),
                    record.target_revision
                );
                Some(self.realign(&path, &wanted)?)
            }
        };

        Ok(ConvergenceResult {
            record: record.clone(),
            already_converged: mutable_line.is_none(),
            resolved_revision_id: wanted,
            cloned: materialized == Materialized::Cloned,
            mutable_line,
        })
    }

    /// Move a diverged checkout onto `wanted`, returning the mutable line used
    fn realign(&self, path: &Path, wanted: &RevisionId) -> Result<String, SyncError> {
        let line = self.mutable_line(path)?;

        self.vcs
            .checkout_branch(path, &line)
            .map_err(|source| SyncError::CheckoutConflict {
                path: path.to_path_buf(),
                target: line.clone(),
                source,
            })?;

        self.update_submodules(path)?;

        self.vcs
            .checkout_detached(path, wanted)
            .map_err(|source| SyncError::CheckoutConflict {
                path: path.to_path_buf(),
                target: wanted.to_string(),
                source,
            })?;

        let now = resolver::current_revision(&self.vcs, path)?;
        if now != *wanted {
            return Err(SyncError::CheckoutConflict {
                path: path.to_path_buf(),
                target: wanted.to_string(),
                source: VcsFailure::new(
                    format!("git checkout --detach {wanted}"),
                    Some(0),
                    format!("HEAD is at {now} after checkout"),
                ),
            });
        }
        Ok(line)
    }

    fn update_submodules(&self, path: &Path) -> Result<(), SyncError> {
        self.vcs
            .update_submodules(path)
            .map_err(|source| SyncError::CloneFailed {
                remote: "submodules".to_string(),
                path: path.to_path_buf(),
                source,
            })
    }

    /// First of [`MUTABLE_LINES`] present on the remote
    ///
    /// Local branches are ignored: one whose upstream was deleted cannot be
    /// integrated.
    fn mutable_line(&self, path: &Path) -> Result<String, SyncError> {
        for line in MUTABLE_LINES {
            let full_ref = format!("refs/remotes/{REMOTE}/{line}");
            let exists = self
                .vcs
                .has_ref(path, &full_ref)
                .map_err(|source| SyncError::Vcs {
                    path: path.to_path_buf(),
                    source,
                })?;
            if exists {
                return Ok(line.to_string());
            }
        }
        Err(SyncError::RefNotFound {
            path: path.to_path_buf(),
            reference: MUTABLE_LINES.join("|"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::MockVersionControl;
    use mockall::predicate::eq;
    use mockall::Sequence;

    const OLD: &str = "1111111111111111111111111111111111111111";
    const NEW: &str = "2222222222222222222222222222222222222222";

    fn rev(s: &str) -> RevisionId {
        RevisionId::parse(s).unwrap()
    }

    fn record() -> DependencyRecord {
        DependencyRecord::new("zigimg", "https://github.com/zigimg/zigimg.git", NEW)
    }

    #[test]
    fn assess_is_two_state() {
        assert_eq!(Convergence::assess(rev(NEW), &rev(NEW)), Convergence::Converged);
        assert_eq!(
            Convergence::assess(rev(OLD), &rev(NEW)),
            Convergence::Diverged { current: rev(OLD) }
        );
    }

    #[test]
    fn diverged_checkout_runs_steps_in_order() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("zigimg/.git")).unwrap();

        let mut vcs = MockVersionControl::new();
        let mut seq = Sequence::new();
        vcs.expect_fetch().times(1).in_sequence(&mut seq).returning(|_| Ok(()));
        vcs.expect_rev_parse()
            .with(mockall::predicate::always(), eq(NEW))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Some(rev(NEW))));
        vcs.expect_rev_parse()
            .with(mockall::predicate::always(), eq("HEAD"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Some(rev(OLD))));
        vcs.expect_has_ref()
            .with(mockall::predicate::always(), eq("refs/remotes/origin/main"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(true));
        vcs.expect_checkout_branch()
            .with(mockall::predicate::always(), eq("main"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        vcs.expect_update_submodules()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        vcs.expect_checkout_detached()
            .withf(|_, r| r.as_str() == NEW)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        vcs.expect_rev_parse()
            .with(mockall::predicate::always(), eq("HEAD"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Some(rev(NEW))));

        let driver = ConvergenceDriver::new(vcs, root.path());
        let result = driver.converge(&record()).unwrap();

        assert!(!result.already_converged);
        assert!(!result.cloned);
        assert_eq!(result.resolved_revision_id, rev(NEW));
        assert_eq!(result.mutable_line.as_deref(), Some("main"));
    }

    #[test]
    fn dirty_tree_surfaces_checkout_conflict() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("zigimg/.git")).unwrap();

        let mut vcs = MockVersionControl::new();
        vcs.expect_fetch().returning(|_| Ok(()));
        vcs.expect_rev_parse()
            .with(mockall::predicate::always(), eq(NEW))
            .returning(|_, _| Ok(Some(rev(NEW))));
        vcs.expect_rev_parse()
            .with(mockall::predicate::always(), eq("HEAD"))
            .returning(|_, _| Ok(Some(rev(OLD))));
        vcs.expect_has_ref().returning(|_, _| Ok(true));
        vcs.expect_checkout_branch().returning(|_, _| {
            Err(VcsFailure::new(
                "git checkout main",
                Some(1),
                "error: Your local changes to the following files would be overwritten",
            ))
        });

        let driver = ConvergenceDriver::new(vcs, root.path());
        let err = driver.converge(&record()).unwrap_err();
        assert!(matches!(err, SyncError::CheckoutConflict { ref target, .. } if target == "main"));
    }

    #[test]
    fn no_mutable_line_is_ref_not_found() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("zigimg/.git")).unwrap();

        let mut vcs = MockVersionControl::new();
        vcs.expect_has_ref().times(2).returning(|_, _| Ok(false));

        let driver = ConvergenceDriver::new(vcs, root.path());
        let err = driver.mutable_line(&root.path().join("zigimg")).unwrap_err();
        assert!(matches!(
            err,
            SyncError::RefNotFound { ref reference, .. } if reference == "main|master"
        ));
    }

    /// A fresh clone already on the target still has its nested repositories
    /// initialised.
    #[test]
    fn fresh_clone_at_target_updates_submodules() {
        let root = tempfile::tempdir().unwrap();

        let mut vcs = MockVersionControl::new();
        let mut seq = Sequence::new();
        vcs.expect_clone_repository()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        vcs.expect_fetch().times(1).in_sequence(&mut seq).returning(|_| Ok(()));
        vcs.expect_rev_parse().times(2).returning(|_, _| Ok(Some(rev(NEW))));
        vcs.expect_update_submodules()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let driver = ConvergenceDriver::new(vcs, root.path());
        let result = driver.converge(&record()).unwrap();

        assert!(result.cloned);
        assert!(result.already_converged);
    }

    #[test]
    fn run_aborts_at_first_failing_record() {
        let root = tempfile::tempdir().unwrap();

        let mut vcs = MockVersionControl::new();
        vcs.expect_clone_repository()
            .times(1)
            .returning(|_, _| Err(VcsFailure::new("git clone", Some(128), "repository not found")));

        let manifest = Manifest::new(vec![
            DependencyRecord::new("first", "https://example.invalid/first.git", "main"),
            DependencyRecord::new("second", "https://example.invalid/second.git", "main"),
        ])
        .unwrap();

        let driver = ConvergenceDriver::new(vcs, root.path());
        let err = driver.converge_all(&manifest).unwrap_err();
        assert_eq!(err.kind(), "clone_failed");
    }
}
