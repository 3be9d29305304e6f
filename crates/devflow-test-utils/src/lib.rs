//! Testing utilities for the devflow workspace
//!
//! In-memory stand-ins for every external collaborator: version control,
//! HTTP downloads, tool processes and the operator at the keyboard. Each
//! fake is cheap to clone and clones share state, so a test can hand one
//! copy to the code under test and inspect another.

#![allow(missing_docs)]

mod downloader;
mod operator;
mod runner;
mod vcs;

pub use downloader::FakeDownloader;
pub use operator::ScriptedOperator;
pub use runner::RecordingRunner;
pub use vcs::{FakeVcs, VcsOp};

use devflow_sync::RevisionId;

/// Deterministic revision id for test commit `n`
pub fn rev(n: u8) -> RevisionId {
    RevisionId::parse(&format!("{n:02x}").repeat(20)).unwrap()
}

/// Write `body` at `root/rel`, creating parent directories
pub fn write_file(root: &std::path::Path, rel: &str, body: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}
