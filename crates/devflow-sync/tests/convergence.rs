//! Convergence driver against an in-memory version control backend.
//!
//! Each test sets up one or more upstreams in a [`FakeVcs`], converges a
//! manifest into a temporary checkout root and checks both the returned
//! results and the calls that reached version control.

use devflow_sync::{ConvergenceDriver, DependencyRecord, Manifest, SyncError};
use devflow_test_utils::{rev, FakeVcs, VcsOp};
use std::path::PathBuf;
use tempfile::TempDir;

const ZIGIMG: &str = "https://github.com/zigimg/zigimg.git";
const ZIG_ARGS: &str = "https://github.com/MasterQ32/zig-args.git";

struct Fixture {
    _root: TempDir,
    external: PathBuf,
    vcs: FakeVcs,
    driver: ConvergenceDriver<FakeVcs>,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let external = root.path().join("external");
        let vcs = FakeVcs::new();
        let driver = ConvergenceDriver::new(vcs.clone(), &external);
        Self {
            _root: root,
            external,
            vcs,
            driver,
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.external.join(name)
    }
}

fn manifest(records: &[(&str, &str, &str)]) -> Manifest {
    Manifest::new(
        records
            .iter()
            .map(|(name, url, revision)| DependencyRecord::new(*name, *url, *revision))
            .collect(),
    )
    .unwrap()
}

/// A missing checkout is cloned and left on the branch tip it asked for.
#[test]
fn bootstraps_missing_clone() {
    let fx = Fixture::new();
    fx.vcs.push(ZIGIMG, "main", &rev(1));

    let results = fx
        .driver
        .converge_all(&manifest(&[("zigimg", ZIGIMG, "main")]))
        .unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].cloned);
    assert!(results[0].already_converged);
    assert_eq!(results[0].resolved_revision_id, rev(1));
    assert_eq!(fx.vcs.head(&fx.path("zigimg")), Some(rev(1)));
    assert!(fx
        .vcs
        .mutating_operations()
        .contains(&VcsOp::UpdateSubmodules {
            repo: fx.path("zigimg")
        }));
}

/// A leftover empty directory is cloned into rather than mistaken for a clone.
#[test]
fn clones_into_empty_leftover_directory() {
    let fx = Fixture::new();
    fx.vcs.push(ZIGIMG, "main", &rev(1));
    std::fs::create_dir_all(fx.path("zigimg")).unwrap();

    let results = fx
        .driver
        .converge_all(&manifest(&[("zigimg", ZIGIMG, "main")]))
        .unwrap();

    assert!(results[0].cloned);
    assert_eq!(fx.vcs.head(&fx.path("zigimg")), Some(rev(1)));
}

/// A populated directory that is not a clone fails before any git command.
#[test]
fn populated_non_repository_is_clone_failed() {
    let fx = Fixture::new();
    fx.vcs.push(ZIGIMG, "main", &rev(1));
    devflow_test_utils::write_file(&fx.external, "zigimg/build.zig", "stale");

    let err = fx
        .driver
        .converge_all(&manifest(&[("zigimg", ZIGIMG, "main")]))
        .unwrap_err();

    assert_eq!(err.kind(), "clone_failed");
    assert!(fx.vcs.operations().is_empty());
}

/// After a run, HEAD equals the resolution of the pinned tag.
#[test]
fn pins_to_tag_behind_branch_tip() {
    let fx = Fixture::new();
    fx.vcs.tag(ZIGIMG, "v0.1.0", &rev(1));
    fx.vcs.push(ZIGIMG, "main", &rev(2));

    let results = fx
        .driver
        .converge_all(&manifest(&[("zigimg", ZIGIMG, "v0.1.0")]))
        .unwrap();

    assert!(!results[0].already_converged);
    assert_eq!(results[0].mutable_line.as_deref(), Some("main"));
    assert_eq!(fx.vcs.head(&fx.path("zigimg")), Some(rev(1)));
    assert!(fx.vcs.is_detached(&fx.path("zigimg")));
}

/// Integration steps run in order: branch, submodules, detach.
#[test]
fn realign_runs_steps_in_order() {
    let fx = Fixture::new();
    fx.vcs.tag(ZIGIMG, "v0.1.0", &rev(1));
    fx.vcs.push(ZIGIMG, "main", &rev(2));
    let path = fx.path("zigimg");

    fx.driver
        .converge(&DependencyRecord::new("zigimg", ZIGIMG, "v0.1.0"))
        .unwrap();

    let mutating: Vec<_> = fx
        .vcs
        .mutating_operations()
        .into_iter()
        .skip(1) // clone
        .collect();
    assert_eq!(
        mutating,
        vec![
            VcsOp::CheckoutBranch {
                repo: path.clone(),
                branch: "main".into()
            },
            VcsOp::UpdateSubmodules { repo: path.clone() },
            VcsOp::CheckoutDetached {
                repo: path,
                revision: rev(1)
            },
        ]
    );
}

/// A second run without upstream changes only fetches.
#[test]
fn second_run_performs_no_mutations() {
    let fx = Fixture::new();
    fx.vcs.tag(ZIGIMG, "v0.1.0", &rev(1));
    fx.vcs.push(ZIGIMG, "main", &rev(2));
    fx.vcs.push(ZIG_ARGS, "main", &rev(7));
    let manifest = manifest(&[("zigimg", ZIGIMG, "v0.1.0"), ("zig-args", ZIG_ARGS, "main")]);

    fx.driver.converge_all(&manifest).unwrap();
    fx.vcs.clear_operations();

    let again = fx.driver.converge_all(&manifest).unwrap();
    assert!(again.iter().all(|r| r.already_converged && !r.cloned));
    assert!(fx.vcs.mutating_operations().is_empty());
    assert!(fx
        .vcs
        .operations()
        .iter()
        .any(|op| matches!(op, VcsOp::Fetch { .. })));
}

/// A branch pin follows upstream on the next run.
#[test]
fn branch_pin_follows_upstream() {
    let fx = Fixture::new();
    fx.vcs.push(ZIG_ARGS, "main", &rev(1));
    let manifest = manifest(&[("zig-args", ZIG_ARGS, "main")]);
    fx.driver.converge_all(&manifest).unwrap();

    fx.vcs.push(ZIG_ARGS, "main", &rev(3));
    let results = fx.driver.converge_all(&manifest).unwrap();

    assert!(!results[0].already_converged);
    assert_eq!(results[0].resolved_revision_id, rev(3));
    assert_eq!(fx.vcs.head(&fx.path("zig-args")), Some(rev(3)));
}

/// Repositories without `main` integrate through `master`.
#[test]
fn falls_back_to_master() {
    let fx = Fixture::new();
    let url = "https://github.com/prime31/zig-flecs.git";
    fx.vcs.tag(url, "v1", &rev(4));
    fx.vcs.push(url, "master", &rev(5));

    let results = fx
        .driver
        .converge_all(&manifest(&[("zig-flecs", url, "v1")]))
        .unwrap();

    assert_eq!(results[0].mutable_line.as_deref(), Some("master"));
    assert_eq!(fx.vcs.head(&fx.path("zig-flecs")), Some(rev(4)));
}

/// Rewritten upstream history does not block later pins.
#[test]
fn rewritten_mutable_line_is_followed() {
    let fx = Fixture::new();
    fx.vcs.push(ZIGIMG, "main", &rev(1));
    fx.vcs.push(ZIGIMG, "main", &rev(2));
    let tip = manifest(&[("zigimg", ZIGIMG, "main")]);
    fx.driver.converge_all(&tip).unwrap();

    // force-push: main now points at an unrelated commit
    fx.vcs.push(ZIGIMG, "main", &rev(6));
    fx.vcs.tag(ZIGIMG, "v2", &rev(6));
    let tagged = manifest(&[("zigimg", ZIGIMG, "v2")]);
    let results = fx.driver.converge_all(&tagged).unwrap();

    assert_eq!(results[0].mutable_line.as_deref(), Some("main"));
    assert_eq!(fx.vcs.head(&fx.path("zigimg")), Some(rev(6)));
    assert!(fx.driver.converge_all(&tagged).unwrap()[0].already_converged);
}

/// A local `main` whose upstream was deleted is not used as the mutable line.
#[test]
fn deleted_upstream_main_falls_back_to_master() {
    let fx = Fixture::new();
    fx.vcs.push(ZIGIMG, "main", &rev(1));
    fx.driver
        .converge_all(&manifest(&[("zigimg", ZIGIMG, "main")]))
        .unwrap();

    fx.vcs.delete_branch(ZIGIMG, "main");
    fx.vcs.push(ZIGIMG, "master", &rev(2));
    fx.vcs.tag(ZIGIMG, "v1", &rev(2));
    let results = fx
        .driver
        .converge_all(&manifest(&[("zigimg", ZIGIMG, "v1")]))
        .unwrap();

    assert_eq!(results[0].mutable_line.as_deref(), Some("master"));
    assert_eq!(fx.vcs.head(&fx.path("zigimg")), Some(rev(2)));
}

/// A full hash pins exactly that commit.
#[test]
fn pins_to_full_hash() {
    let fx = Fixture::new();
    let url = "https://github.com/michal-z/zig-gamedev.git";
    fx.vcs.push(url, "main", &rev(8));
    fx.vcs.push(url, "main", &rev(9));

    let results = fx
        .driver
        .converge_all(&manifest(&[("zig-gamedev", url, rev(8).as_str())]))
        .unwrap();

    assert_eq!(results[0].resolved_revision_id, rev(8));
    assert_eq!(fx.vcs.head(&fx.path("zig-gamedev")), Some(rev(8)));
}

#[test]
fn unknown_ref_is_ref_not_found() {
    let fx = Fixture::new();
    fx.vcs.push(ZIGIMG, "main", &rev(1));

    let err = fx
        .driver
        .converge_all(&manifest(&[("zigimg", ZIGIMG, "v9.9.9")]))
        .unwrap_err();

    assert!(matches!(err, SyncError::RefNotFound { ref reference, .. } if reference == "v9.9.9"));
}

#[test]
fn offline_clone_is_clone_failed() {
    let fx = Fixture::new();
    fx.vcs.push(ZIGIMG, "main", &rev(1));
    fx.vcs.set_offline(true);

    let err = fx
        .driver
        .converge_all(&manifest(&[("zigimg", ZIGIMG, "main")]))
        .unwrap_err();
    assert_eq!(err.kind(), "clone_failed");
    assert!(err.is_retryable());
}

#[test]
fn offline_fetch_is_fetch_failed() {
    let fx = Fixture::new();
    fx.vcs.push(ZIGIMG, "main", &rev(1));
    let manifest = manifest(&[("zigimg", ZIGIMG, "main")]);
    fx.driver.converge_all(&manifest).unwrap();

    fx.vcs.set_offline(true);
    let err = fx.driver.converge_all(&manifest).unwrap_err();
    assert!(matches!(err, SyncError::FetchFailed { .. }));
}

/// Local edits block the checkout and leave HEAD where it was.
#[test]
fn dirty_tree_is_checkout_conflict() {
    let fx = Fixture::new();
    fx.vcs.push(ZIGIMG, "main", &rev(1));
    let manifest = manifest(&[("zigimg", ZIGIMG, "main")]);
    fx.driver.converge_all(&manifest).unwrap();

    fx.vcs.push(ZIGIMG, "main", &rev(2));
    fx.vcs.make_dirty(&fx.path("zigimg"));
    let err = fx.driver.converge_all(&manifest).unwrap_err();

    assert_eq!(err.kind(), "checkout_conflict");
    assert!(!err.is_retryable());
    assert_eq!(fx.vcs.head(&fx.path("zigimg")), Some(rev(1)));
}

/// The first failing record stops the run; later records are untouched.
#[test]
fn stops_at_first_failing_record() {
    let fx = Fixture::new();
    fx.vcs.push(ZIGIMG, "main", &rev(1));
    fx.vcs.push(ZIG_ARGS, "main", &rev(2));

    let err = fx
        .driver
        .converge_all(&manifest(&[
            ("zigimg", ZIGIMG, "no-such-tag"),
            ("zig-args", ZIG_ARGS, "main"),
        ]))
        .unwrap_err();

    assert_eq!(err.kind(), "ref_not_found");
    assert!(!fx.path("zig-args").exists());
}

/// Records are processed in declaration order.
#[test]
fn clones_in_declaration_order() {
    let fx = Fixture::new();
    fx.vcs.push(ZIGIMG, "main", &rev(1));
    fx.vcs.push(ZIG_ARGS, "main", &rev(2));

    fx.driver
        .converge_all(&manifest(&[
            ("zig-args", ZIG_ARGS, "main"),
            ("zigimg", ZIGIMG, "main"),
        ]))
        .unwrap();

    let cloned: Vec<_> = fx
        .vcs
        .operations()
        .into_iter()
        .filter_map(|op| match op {
            VcsOp::Clone { remote, .. } => Some(remote),
            _ => None,
        })
        .collect();
    assert_eq!(cloned, [ZIG_ARGS, ZIGIMG]);
}
