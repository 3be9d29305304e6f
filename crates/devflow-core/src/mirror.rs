//! Directory mirroring and diffing
//!
//! Compares two trees file by file (size first, then BLAKE3 digest) and
//! applies the difference. [`SyncMode::Mirror`] also deletes files that only
//! exist in the destination; [`SyncMode::Overlay`] leaves them alone.

use crate::error::CoreError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};

/// How [`apply`] treats files present only in the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Destination becomes identical to the source
    Mirror,
    /// Source files are copied over; extra destination files are kept
    Overlay,
}

/// Classification of one differing file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Only in the source
    Added,
    /// In both, contents differ
    Modified,
    /// Only in the destination
    Removed,
}

/// One differing file, relative to the tree roots
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct MirrorChange {
    /// Relative path
    pub path: PathBuf,
    /// What differs
    pub kind: ChangeKind,
}

/// Totals from [`apply`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MirrorReport {
    /// Files written to the destination
    pub copied: usize,
    /// Files deleted from the destination
    pub removed: usize,
    /// Files already identical
    pub unchanged: usize,
}

impl AddAssign for MirrorReport {
    fn add_assign(&mut self, rhs: Self) {
        self.copied += rhs.copied;
        self.removed += rhs.removed;
        self.unchanged += rhs.unchanged;
    }
}

/// Differences that would make `dst` identical to `src`, sorted by path
///
/// A missing `dst` is treated as empty.
///
/// # Errors
/// Returns error if `src` is missing or a file cannot be read
pub fn diff(src: &Path, dst: &Path) -> Result<Vec<MirrorChange>, CoreError> {
    let src_files = list_files(src)?;
    let dst_files = if dst.exists() {
        list_files(dst)?
    } else {
        BTreeMap::new()
    };

    let mut changes = Vec::new();
    for (rel, size) in &src_files {
        match dst_files.get(rel) {
            None => changes.push(MirrorChange {
                path: rel.clone(),
                kind: ChangeKind::Added,
            }),
            Some(dst_size) => {
                if dst_size != size || digest(&src.join(rel))? != digest(&dst.join(rel))? {
                    changes.push(MirrorChange {
                        path: rel.clone(),
                        kind: ChangeKind::Modified,
                    });
                }
            }
        }
    }
    for rel in dst_files.keys().filter(|rel| !src_files.contains_key(*rel)) {
        changes.push(MirrorChange {
            path: rel.clone(),
            kind: ChangeKind::Removed,
        });
    }
    changes.sort();
    Ok(changes)
}

/// Make `dst` identical to `src`, deleting extra files
///
/// # Errors
/// Returns the first filesystem failure
pub fn mirror(src: &Path, dst: &Path) -> Result<MirrorReport, CoreError> {
    apply(src, dst, SyncMode::Mirror)
}

/// Bring `dst` in line with `src` according to `mode`
///
/// # Errors
/// Returns the first filesystem failure
pub fn apply(src: &Path, dst: &Path, mode: SyncMode) -> Result<MirrorReport, CoreError> {
    let changes = diff(src, dst)?;
    let total = list_files(src)?.len();

    std::fs::create_dir_all(dst).map_err(|e| CoreError::io(dst, e))?;

    let mut report = MirrorReport::default();
    for change in &changes {
        let target = dst.join(&change.path);
        match change.kind {
            ChangeKind::Added | ChangeKind::Modified => {
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
                }
                // a file replacing a directory of the same name
                if target.is_dir() {
                    std::fs::remove_dir_all(&target).map_err(|e| CoreError::io(&target, e))?;
                }
                std::fs::copy(src.join(&change.path), &target)
                    .map_err(|e| CoreError::io(&target, e))?;
                report.copied += 1;
            }
            ChangeKind::Removed if mode == SyncMode::Mirror => {
                // gone already when a source file replaced its directory
                if target.exists() {
                    std::fs::remove_file(&target).map_err(|e| CoreError::io(&target, e))?;
                }
                report.removed += 1;
            }
            ChangeKind::Removed => {}
        }
    }
    report.unchanged = total - report.copied;

    if mode == SyncMode::Mirror {
        prune_empty_dirs(dst, src)?;
    }
    tracing::debug!(
        "{} -> {}: {} copied, {} removed, {} unchanged",
        src.display(),
        dst.display(),
        report.copied,
        report.removed,
        report.unchanged
    );
    Ok(report)
}

/// All regular files under `root`, keyed by relative path, with their size
fn list_files(root: &Path) -> Result<BTreeMap<PathBuf, u64>, CoreError> {
    let mut files = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir).map_err(|e| CoreError::io(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| CoreError::io(&dir, e))?;
            let path = entry.path();
            let meta = std::fs::metadata(&path).map_err(|e| CoreError::io(&path, e))?;
            if meta.is_dir() {
                pending.push(path);
            } else if meta.is_file() {
                if let Ok(rel) = path.strip_prefix(root) {
                    files.insert(rel.to_path_buf(), meta.len());
                }
            }
        }
    }
    Ok(files)
}

fn digest(path: &Path) -> Result<blake3::Hash, CoreError> {
    let mut file = File::open(path).map_err(|e| CoreError::io(path, e))?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher).map_err(|e| CoreError::io(path, e))?;
    Ok(hasher.finalize())
}

/// Remove directories under `dst` that are empty and absent from `src`
fn prune_empty_dirs(dst: &Path, src: &Path) -> Result<(), CoreError> {
    let mut dirs = Vec::new();
    let mut pending = vec![dst.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir).map_err(|e| CoreError::io(&dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| CoreError::io(&dir, e))?.path();
            if path.is_dir() {
                dirs.push(path.clone());
                pending.push(path);
            }
        }
    }
    // deepest first
    dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
    for dir in dirs {
        let Ok(rel) = dir.strip_prefix(dst) else {
            continue;
        };
        let empty = std::fs::read_dir(&dir)
            .map_err(|e| CoreError::io(&dir, e))?
            .next()
            .is_none();
        if empty && !src.join(rel).is_dir() {
            std::fs::remove_dir(&dir).map_err(|e| CoreError::io(&dir, e))?;
        }
    }
    Ok(())
}
