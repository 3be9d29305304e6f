//! External tool invocation
//!
//! Every heavy step (compiling, cooking, world generation) is an external
//! executable. A [`ToolInvocation`] describes "run tool T with arguments A,
//! expect artifact O"; a [`CommandRunner`] executes it.

use crate::error::CoreError;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

/// One external tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Executable (looked up on `PATH` when not a path)
    pub program: PathBuf,
    /// Arguments
    pub args: Vec<OsString>,
    /// Working directory; inherits the caller's when `None`
    pub cwd: Option<PathBuf>,
    /// File or directory that must exist after a successful run
    pub expected_output: Option<PathBuf>,
}

impl ToolInvocation {
    /// Invocation of `program` with no arguments
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            expected_output: None,
        }
    }

    /// Append one argument
    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Run inside `dir`
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Require `path` to exist afterwards
    #[must_use]
    pub fn expect_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.expected_output = Some(path.into());
        self
    }

    /// Program file name without directories, for log lines
    #[must_use]
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    /// Printable command line
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut line = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    /// Check the expected artifact, if any
    ///
    /// # Errors
    /// Returns [`CoreError::MissingArtifact`] when it does not exist
    pub fn verify_output(&self) -> Result<(), CoreError> {
        match &self.expected_output {
            Some(path) if !path.exists() => Err(CoreError::MissingArtifact { path: path.clone() }),
            _ => Ok(()),
        }
    }
}

/// Executes tool invocations
pub trait CommandRunner {
    /// Run `invocation` to completion
    ///
    /// # Errors
    /// Spawn failure, non-zero exit, or missing expected artifact
    fn run(&self, invocation: &ToolInvocation) -> Result<(), CoreError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, invocation: &ToolInvocation) -> Result<(), CoreError> {
        (**self).run(invocation)
    }
}

/// [`CommandRunner`] that spawns real processes with inherited stdio
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Create a runner
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<(), CoreError> {
        let line = invocation.command_line();
        match &invocation.cwd {
            Some(dir) => tracing::debug!("running {} (in {})", line, dir.display()),
            None => tracing::debug!("running {}", line),
        }

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }

        let status = cmd.status().map_err(|source| CoreError::ToolSpawn {
            program: invocation.program.to_string_lossy().into_owned(),
            source,
        })?;
        if !status.success() {
            return Err(CoreError::ToolFailed {
                command: line,
                status: status.code(),
            });
        }
        invocation.verify_output()
    }
}

/// Directory a tool binary lives in, used as its working directory
#[must_use]
pub fn tool_dir(program: &Path) -> Option<PathBuf> {
    program
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_arguments() {
        let inv = ToolInvocation::new("tools/binaries/dxc/dxc.exe")
            .arg("in.hlsl")
            .args(["-E", "main"])
            .current_dir("tools/binaries/dxc")
            .expect_output("out.vert");

        assert_eq!(inv.command_line(), "tools/binaries/dxc/dxc.exe in.hlsl -E main");
        assert_eq!(inv.program_name(), "dxc.exe");
        assert_eq!(inv.cwd.as_deref(), Some(Path::new("tools/binaries/dxc")));
    }

    #[test]
    fn verify_output_requires_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("skybox.vert");
        let inv = ToolInvocation::new("dxc").expect_output(&out);

        let err = inv.verify_output().unwrap_err();
        assert!(matches!(err, CoreError::MissingArtifact { ref path } if *path == out));

        std::fs::write(&out, b"dxil").unwrap();
        inv.verify_output().unwrap();
    }

    #[test]
    fn tool_dir_of_bare_program_is_none() {
        assert_eq!(tool_dir(Path::new("zig")), None);
        assert_eq!(
            tool_dir(Path::new("tools/binaries/texconv/texconv.exe")),
            Some(PathBuf::from("tools/binaries/texconv"))
        );
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let inv = ToolInvocation::new("/nonexistent/devflow-tool");
        let err = ProcessRunner::new().run(&inv).unwrap_err();
        assert_eq!(err.kind(), "tool_spawn");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_tool_failed() {
        let inv = ToolInvocation::new("sh").args(["-c", "exit 3"]);
        let err = ProcessRunner::new().run(&inv).unwrap_err();
        assert!(matches!(err, CoreError::ToolFailed { status: Some(3), .. }));
    }

    #[cfg(unix)]
    #[test]
    fn success_with_artifact_passes() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("world.bin");
        let inv = ToolInvocation::new("sh")
            .args(["-c", "echo cooked > world.bin"])
            .current_dir(dir.path())
            .expect_output(&out);
        ProcessRunner::new().run(&inv).unwrap();
        assert!(out.is_file());
    }
}
