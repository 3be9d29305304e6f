//! In-memory version control

use devflow_sync::{RevisionId, VcsFailure, VersionControl, REMOTE};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One call made against [`FakeVcs`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsOp {
    Clone { remote: String, dest: PathBuf },
    Fetch { repo: PathBuf },
    RevParse { repo: PathBuf, spec: String },
    HasRef { repo: PathBuf, full_ref: String },
    CheckoutBranch { repo: PathBuf, branch: String },
    UpdateSubmodules { repo: PathBuf },
    CheckoutDetached { repo: PathBuf, revision: RevisionId },
}

impl VcsOp {
    /// Whether the call can change the working tree or local branches
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::Clone { .. }
                | Self::CheckoutBranch { .. }
                | Self::UpdateSubmodules { .. }
                | Self::CheckoutDetached { .. }
        )
    }
}

#[derive(Debug, Clone, Default)]
struct Upstream {
    branches: BTreeMap<String, RevisionId>,
    tags: BTreeMap<String, RevisionId>,
    commits: BTreeSet<RevisionId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Head {
    Branch(String),
    Detached(RevisionId),
}

#[derive(Debug, Clone)]
struct LocalRepo {
    remote: String,
    tracking: BTreeMap<String, RevisionId>,
    tags: BTreeMap<String, RevisionId>,
    commits: BTreeSet<RevisionId>,
    branches: BTreeMap<String, RevisionId>,
    head: Head,
    dirty: bool,
}

impl LocalRepo {
    fn head_revision(&self) -> Option<RevisionId> {
        match &self.head {
            Head::Branch(name) => self.branches.get(name).cloned(),
            Head::Detached(rev) => Some(rev.clone()),
        }
    }

    fn absorb(&mut self, upstream: &Upstream) {
        self.tracking = upstream.branches.clone();
        self.tags = upstream.tags.clone();
        self.commits.extend(upstream.commits.iter().cloned());
    }
}

#[derive(Debug, Default)]
struct State {
    upstreams: HashMap<String, Upstream>,
    clones: HashMap<PathBuf, LocalRepo>,
    offline: bool,
    log: Vec<VcsOp>,
}

/// [`VersionControl`] over in-memory repositories
///
/// Upstreams are keyed by URL. Cloning creates the destination directory and
/// an empty `.git` inside it (so clone detection behaves) but all history
/// lives in memory.
#[derive(Debug, Clone, Default)]
pub struct FakeVcs {
    state: Arc<Mutex<State>>,
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty upstream
    pub fn add_remote(&self, url: &str) {
        self.state
            .lock()
            .upstreams
            .entry(url.to_string())
            .or_default();
    }

    /// Move upstream `branch` to `revision`
    pub fn push(&self, url: &str, branch: &str, revision: &RevisionId) {
        let mut state = self.state.lock();
        let upstream = state.upstreams.entry(url.to_string()).or_default();
        upstream.branches.insert(branch.to_string(), revision.clone());
        upstream.commits.insert(revision.clone());
    }

    /// Delete upstream `branch`
    pub fn delete_branch(&self, url: &str, branch: &str) {
        if let Some(upstream) = self.state.lock().upstreams.get_mut(url) {
            upstream.branches.remove(branch);
        }
    }

    /// Tag `revision` upstream
    pub fn tag(&self, url: &str, tag: &str, revision: &RevisionId) {
        let mut state = self.state.lock();
        let upstream = state.upstreams.entry(url.to_string()).or_default();
        upstream.tags.insert(tag.to_string(), revision.clone());
        upstream.commits.insert(revision.clone());
    }

    /// Make every network operation fail
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Give the clone at `repo` uncommitted changes
    pub fn make_dirty(&self, repo: &Path) {
        if let Some(clone) = self.state.lock().clones.get_mut(repo) {
            clone.dirty = true;
        }
    }

    /// Checked-out revision of the clone at `repo`
    pub fn head(&self, repo: &Path) -> Option<RevisionId> {
        self.state.lock().clones.get(repo)?.head_revision()
    }

    /// Whether the clone at `repo` has a detached HEAD
    pub fn is_detached(&self, repo: &Path) -> bool {
        self.state
            .lock()
            .clones
            .get(repo)
            .is_some_and(|c| matches!(c.head, Head::Detached(_)))
    }

    /// Every call so far, in order
    pub fn operations(&self) -> Vec<VcsOp> {
        self.state.lock().log.clone()
    }

    /// Calls that could change a working tree
    pub fn mutating_operations(&self) -> Vec<VcsOp> {
        self.operations()
            .into_iter()
            .filter(VcsOp::is_mutating)
            .collect()
    }

    pub fn clear_operations(&self) {
        self.state.lock().log.clear();
    }

    fn record(state: &mut State, op: VcsOp) {
        state.log.push(op);
    }
}

fn failure(command: String, status: i32, stderr: &str) -> VcsFailure {
    VcsFailure::new(command, Some(status), stderr)
}

fn offline(command: String) -> VcsFailure {
    failure(command, 128, "fatal: unable to access remote: Could not resolve host")
}

fn no_repo(command: String, repo: &Path) -> VcsFailure {
    failure(
        command,
        128,
        &format!("fatal: not a git repository: {}", repo.display()),
    )
}

impl VersionControl for FakeVcs {
    fn clone_repository(&self, remote: &str, dest: &Path) -> Result<(), VcsFailure> {
        let mut state = self.state.lock();
        Self::record(
            &mut state,
            VcsOp::Clone {
                remote: remote.to_string(),
                dest: dest.to_path_buf(),
            },
        );
        let command = format!("git clone {remote} {}", dest.display());
        if state.offline {
            return Err(offline(command));
        }
        let Some(upstream) = state.upstreams.get(remote).cloned() else {
            return Err(failure(command, 128, "fatal: repository not found"));
        };
        std::fs::create_dir_all(dest.join(".git"))
            .map_err(|e| failure(command.clone(), 128, &e.to_string()))?;

        let default = ["main", "master"]
            .into_iter()
            .find(|b| upstream.branches.contains_key(*b))
            .or_else(|| upstream.branches.keys().next().map(String::as_str))
            .unwrap_or("main")
            .to_string();
        let mut clone = LocalRepo {
            remote: remote.to_string(),
            tracking: BTreeMap::new(),
            tags: BTreeMap::new(),
            commits: BTreeSet::new(),
            branches: BTreeMap::new(),
            head: Head::Branch(default.clone()),
            dirty: false,
        };
        clone.absorb(&upstream);
        if let Some(rev) = upstream.branches.get(&default) {
            clone.branches.insert(default, rev.clone());
        }
        state.clones.insert(dest.to_path_buf(), clone);
        Ok(())
    }

    fn fetch(&self, repo: &Path) -> Result<(), VcsFailure> {
        let mut state = self.state.lock();
        Self::record(
            &mut state,
            VcsOp::Fetch {
                repo: repo.to_path_buf(),
            },
        );
        let command = format!("git -C {} fetch --tags --force {REMOTE}", repo.display());
        if state.offline {
            return Err(offline(command));
        }
        let State {
            upstreams, clones, ..
        } = &mut *state;
        let clone = clones.get_mut(repo).ok_or_else(|| no_repo(command, repo))?;
        if let Some(upstream) = upstreams.get(&clone.remote) {
            clone.absorb(upstream);
        }
        Ok(())
    }

    fn rev_parse(&self, repo: &Path, spec: &str) -> Result<Option<RevisionId>, VcsFailure> {
        let mut state = self.state.lock();
        Self::record(
            &mut state,
            VcsOp::RevParse {
                repo: repo.to_path_buf(),
                spec: spec.to_string(),
            },
        );
        let command = format!("git -C {} rev-parse {spec}", repo.display());
        let clone = state.clones.get(repo).ok_or_else(|| no_repo(command, repo))?;

        let remote_prefix = format!("refs/remotes/{REMOTE}/");
        let found = if spec == "HEAD" {
            clone.head_revision()
        } else if let Some(branch) = spec.strip_prefix(&remote_prefix) {
            clone.tracking.get(branch).cloned()
        } else if let Some(tag) = spec.strip_prefix("refs/tags/") {
            clone.tags.get(tag).cloned()
        } else if let Some(branch) = spec.strip_prefix("refs/heads/") {
            clone.branches.get(branch).cloned()
        } else if let Ok(id) = RevisionId::parse(spec) {
            clone.commits.contains(&id).then_some(id)
        } else {
            clone
                .tags
                .get(spec)
                .or_else(|| clone.branches.get(spec))
                .cloned()
        };
        Ok(found)
    }

    fn has_ref(&self, repo: &Path, full_ref: &str) -> Result<bool, VcsFailure> {
        let mut state = self.state.lock();
        Self::record(
            &mut state,
            VcsOp::HasRef {
                repo: repo.to_path_buf(),
                full_ref: full_ref.to_string(),
            },
        );
        let command = format!("git -C {} show-ref --verify {full_ref}", repo.display());
        let clone = state.clones.get(repo).ok_or_else(|| no_repo(command, repo))?;
        let remote_prefix = format!("refs/remotes/{REMOTE}/");
        Ok(if let Some(branch) = full_ref.strip_prefix("refs/heads/") {
            clone.branches.contains_key(branch)
        } else if let Some(branch) = full_ref.strip_prefix(&remote_prefix) {
            clone.tracking.contains_key(branch)
        } else if let Some(tag) = full_ref.strip_prefix("refs/tags/") {
            clone.tags.contains_key(tag)
        } else {
            false
        })
    }

    fn checkout_branch(&self, repo: &Path, branch: &str) -> Result<(), VcsFailure> {
        let mut state = self.state.lock();
        Self::record(
            &mut state,
            VcsOp::CheckoutBranch {
                repo: repo.to_path_buf(),
                branch: branch.to_string(),
            },
        );
        let command = format!(
            "git -C {} checkout -B {branch} refs/remotes/{REMOTE}/{branch}",
            repo.display()
        );
        let clone = state
            .clones
            .get_mut(repo)
            .ok_or_else(|| no_repo(command.clone(), repo))?;
        let tip = clone.tracking.get(branch).cloned().ok_or_else(|| {
            failure(
                command.clone(),
                128,
                &format!("fatal: 'refs/remotes/{REMOTE}/{branch}' is not a commit"),
            )
        })?;
        if clone.dirty {
            return Err(failure(
                command,
                1,
                "error: Your local changes to the following files would be overwritten by checkout",
            ));
        }
        // -B resets the local branch whether or not it fast-forwards
        clone.branches.insert(branch.to_string(), tip);
        clone.head = Head::Branch(branch.to_string());
        Ok(())
    }

    fn update_submodules(&self, repo: &Path) -> Result<(), VcsFailure> {
        let mut state = self.state.lock();
        Self::record(
            &mut state,
            VcsOp::UpdateSubmodules {
                repo: repo.to_path_buf(),
            },
        );
        let command = format!(
            "git -C {} submodule update --init --recursive",
            repo.display()
        );
        if state.offline {
            return Err(offline(command));
        }
        state
            .clones
            .get(repo)
            .map(|_| ())
            .ok_or_else(|| no_repo(command, repo))
    }

    fn checkout_detached(&self, repo: &Path, revision: &RevisionId) -> Result<(), VcsFailure> {
        let mut state = self.state.lock();
        Self::record(
            &mut state,
            VcsOp::CheckoutDetached {
                repo: repo.to_path_buf(),
                revision: revision.clone(),
            },
        );
        let command = format!("git -C {} checkout --detach {revision}", repo.display());
        let clone = state
            .clones
            .get_mut(repo)
            .ok_or_else(|| no_repo(command.clone(), repo))?;
        if clone.dirty {
            return Err(failure(
                command,
                1,
                "error: Your local changes to the following files would be overwritten by checkout",
            ));
        }
        if !clone.commits.contains(revision) {
            return Err(failure(
                command,
                128,
                &format!("fatal: reference is not a tree: {revision}"),
            ));
        }
        clone.head = Head::Detached(revision.clone());
        Ok(())
    }
}
