//! Version control command surface
//!
//! [`VersionControl`] is the seam between the convergence algorithm and the
//! actual `git` executable. Every operation takes the repository path
//! explicitly; nothing here changes the process working directory.

use crate::error::VcsFailure;
use crate::revision::RevisionId;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

/// Operations the synchronization routine needs from version control
///
/// Implementations must report a non-zero exit status as `Err`; a command
/// that "ran" is not the same as a command that succeeded.
#[cfg_attr(test, mockall::automock)]
pub trait VersionControl {
    /// Full clone of `remote` into `dest` (which must not exist)
    fn clone_repository(&self, remote: &str, dest: &Path) -> Result<(), VcsFailure>;

    /// Update remote-tracking refs and tags without touching the working tree
    fn fetch(&self, repo: &Path) -> Result<(), VcsFailure>;

    /// Resolve `spec` to a commit; `Ok(None)` when it names nothing
    fn rev_parse(&self, repo: &Path, spec: &str) -> Result<Option<RevisionId>, VcsFailure>;

    /// Whether the fully qualified ref (e.g. `refs/heads/main`) exists
    fn has_ref(&self, repo: &Path, full_ref: &str) -> Result<bool, VcsFailure>;

    /// Switch the working tree to local `branch`, pointing it at the
    /// remote-tracking branch of the same name
    ///
    /// The local branch follows upstream even when upstream history was
    /// rewritten. Uncommitted changes that would be overwritten make it fail.
    fn checkout_branch(&self, repo: &Path, branch: &str) -> Result<(), VcsFailure>;

    /// Initialise and update nested repositories recursively
    fn update_submodules(&self, repo: &Path) -> Result<(), VcsFailure>;

    /// Move the working tree to exactly `revision` (detached)
    fn checkout_detached(&self, repo: &Path, revision: &RevisionId) -> Result<(), VcsFailure>;
}

/// Name of the remote every dependency is cloned from
pub const REMOTE: &str = "origin";

/// [`VersionControl`] backed by the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
    config: Vec<(String, String)>,
}

impl GitCli {
    /// Use `git` from `PATH`
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("git"),
            config: Vec::new(),
        }
    }

    /// Use a specific git executable
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Pass `-c key=value` to every git invocation
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.push((key.into(), value.into()));
        self
    }

    fn command<I, S>(&self, repo: Option<&Path>, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.program);
        for (key, value) in &self.config {
            cmd.arg("-c").arg(format!("{key}={value}"));
        }
        if let Some(repo) = repo {
            cmd.arg("-C").arg(repo);
        }
        cmd.args(args);
        // Never block on a credential prompt; fail and let the operator fix it.
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.stdin(Stdio::null());
        cmd
    }

    fn output(&self, mut cmd: Command) -> Result<Output, VcsFailure> {
        let line = render(&cmd);
        tracing::debug!("running {}", line);
        let output = cmd
            .output()
            .map_err(|e| VcsFailure::new(line.clone(), None, e.to_string()))?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(VcsFailure::new(
                line,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr),
            ))
        }
    }

    fn run<I, S>(&self, repo: Option<&Path>, args: I) -> Result<(), VcsFailure>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.output(self.command(repo, args)).map(|_| ())
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionControl for GitCli {
    fn clone_repository(&self, remote: &str, dest: &Path) -> Result<(), VcsFailure> {
        let mut cmd = self.command(None, ["clone", "--origin", REMOTE, remote]);
        cmd.arg(dest);
        self.output(cmd).map(|_| ())
    }

    fn fetch(&self, repo: &Path) -> Result<(), VcsFailure> {
        self.run(Some(repo), ["fetch", "--prune", "--tags", "--force", REMOTE])
    }

    fn rev_parse(&self, repo: &Path, spec: &str) -> Result<Option<RevisionId>, VcsFailure> {
        let peeled = format!("{spec}^{{commit}}");
        let cmd = self.command(Some(repo), ["rev-parse", "--verify", "--quiet", peeled.as_str()]);
        match self.output(cmd) {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                RevisionId::parse(&stdout).map(Some).map_err(|e| {
                    VcsFailure::new(format!("git rev-parse {peeled}"), Some(0), e.to_string())
                })
            }
            // `--verify --quiet` exits 1 silently when the name does not resolve.
            Err(failure) if failure.status == Some(1) && failure.stderr.is_empty() => Ok(None),
            Err(failure) => Err(failure),
        }
    }

    fn has_ref(&self, repo: &Path, full_ref: &str) -> Result<bool, VcsFailure> {
        match self.run(Some(repo), ["show-ref", "--verify", "--quiet", full_ref]) {
            Ok(()) => Ok(true),
            Err(failure) if failure.status == Some(1) => Ok(false),
            Err(failure) => Err(failure),
        }
    }

    fn checkout_branch(&self, repo: &Path, branch: &str) -> Result<(), VcsFailure> {
        let upstream = format!("refs/remotes/{REMOTE}/{branch}");
        self.run(Some(repo), ["checkout", "-B", branch, upstream.as_str()])
    }

    fn update_submodules(&self, repo: &Path) -> Result<(), VcsFailure> {
        self.run(Some(repo), ["submodule", "update", "--init", "--recursive"])
    }

    fn checkout_detached(&self, repo: &Path, revision: &RevisionId) -> Result<(), VcsFailure> {
        self.run(Some(repo), ["checkout", "--detach", revision.as_str()])
    }
}

/// Render a command line for logs and error messages
fn render(cmd: &Command) -> String {
    let mut line = cmd.get_program().to_string_lossy().into_owned();
    for arg in cmd.get_args() {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_target_repository_explicitly() {
        let git = GitCli::new();
        let cmd = git.command(Some(Path::new("external/zigimg")), ["fetch", "--tags"]);
        assert_eq!(render(&cmd), "git -C external/zigimg fetch --tags");
        assert!(cmd.get_current_dir().is_none());
    }

    #[test]
    fn custom_program_is_used() {
        let git = GitCli::new().with_program("/opt/git/bin/git");
        let cmd = git.command(None, ["--version"]);
        assert_eq!(render(&cmd), "/opt/git/bin/git --version");
    }

    #[test]
    fn config_overrides_precede_subcommand() {
        let git = GitCli::new().with_config("protocol.file.allow", "always");
        let cmd = git.command(Some(Path::new("external/zigimg")), ["submodule", "update"]);
        assert_eq!(
            render(&cmd),
            "git -c protocol.file.allow=always -C external/zigimg submodule update"
        );
    }

    #[test]
    fn missing_program_is_reported_as_failure() {
        let git = GitCli::new().with_program("/nonexistent/devflow-git");
        let err = git.fetch(Path::new(".")).unwrap_err();
        assert_eq!(err.status, None);
        assert!(err.command.contains("fetch"));
    }
}
