//! Full-pull workflow
//!
//! The ordered routine a developer runs to get from "stale checkout" to
//! "playable build with a fresh world": pull the project, converge pinned
//! dependencies, fetch the toolchain, update large content, build, then
//! regenerate the world and install it.
//!
//! Every step is announced through an [`Operator`]. In [`Mode::Full`] the
//! operator confirms each step before it runs; [`Mode::WorldOnly`] runs the
//! world steps back to back.

use crate::config::DevflowConfig;
use crate::error::CoreError;
use crate::mirror::{self, MirrorReport};
use crate::runner::{CommandRunner, ToolInvocation};
use devflow_sync::{
    ConvergenceDriver, ConvergenceResult, Downloader, ToolchainArchive, ToolchainFetcher,
    VersionControl,
};
use serde::Serialize;
use std::path::PathBuf;

/// One workflow step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// `git pull` the project repository
    PullProject,
    /// Converge pinned dependencies
    SyncDependencies,
    /// Ensure the toolchain archive is downloaded
    FetchToolchain,
    /// `svn update` the large-content checkout
    UpdateContent,
    /// Development build
    BuildGame,
    /// Delete the installed world
    NukeWorld,
    /// Run the offline world generator
    GenerateWorld,
    /// Install the generated world
    CopyWorld,
}

impl Step {
    /// Every step of a full pull, in order
    pub const FULL: [Self; 8] = [
        Self::PullProject,
        Self::SyncDependencies,
        Self::FetchToolchain,
        Self::UpdateContent,
        Self::BuildGame,
        Self::NukeWorld,
        Self::GenerateWorld,
        Self::CopyWorld,
    ];

    /// World regeneration steps
    pub const WORLD_ONLY: [Self; 3] = [Self::NukeWorld, Self::GenerateWorld, Self::CopyWorld];

    /// Line shown before the step runs
    #[must_use]
    pub const fn banner(self) -> &'static str {
        match self {
            Self::PullProject => "About to pull Git",
            Self::SyncDependencies => "About to sync external libs",
            Self::FetchToolchain => "About to fetch the toolchain",
            Self::UpdateContent => "About to sync SVN",
            Self::BuildGame => "About to build game",
            Self::NukeWorld => "About to nuke old game world",
            Self::GenerateWorld => "About to generate game world",
            Self::CopyWorld => "About to copy game world",
        }
    }
}

/// Which steps run and whether each waits for the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Every step, each confirmed
    Full,
    /// World steps only, unconfirmed
    WorldOnly,
}

impl Mode {
    /// Steps for this mode
    #[must_use]
    pub fn steps(self) -> &'static [Step] {
        match self {
            Self::Full => &Step::FULL,
            Self::WorldOnly => &Step::WORLD_ONLY,
        }
    }

    /// Whether the operator confirms each step
    #[must_use]
    pub const fn confirms(self) -> bool {
        matches!(self, Self::Full)
    }
}

/// The person at the keyboard
pub trait Operator {
    /// Show `banner` and wait until the operator is ready
    ///
    /// # Errors
    /// Returns error if the prompt cannot be read
    fn confirm(&mut self, banner: &str) -> Result<(), CoreError>;

    /// Show `message` without waiting
    fn notify(&mut self, message: &str);
}

/// What a workflow run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkflowReport {
    /// Steps that ran, in order
    pub completed: Vec<Step>,
    /// Steps disabled by configuration
    pub skipped: Vec<Step>,
    /// Dependency convergence results
    pub dependencies: Vec<ConvergenceResult>,
    /// Toolchain archive, when a version is configured
    pub toolchain: Option<ToolchainArchive>,
    /// World installation totals
    pub world: Option<MirrorReport>,
}

/// Runs workflow steps against a project
#[derive(Debug)]
pub struct Workflow<'a, R, V, D> {
    config: &'a DevflowConfig,
    runner: R,
    driver: ConvergenceDriver<V>,
    fetcher: ToolchainFetcher<D>,
}

impl<'a, R, V, D> Workflow<'a, R, V, D>
where
    R: CommandRunner,
    V: VersionControl,
    D: Downloader,
{
    /// Create a workflow; dependencies land in the configured external dir
    pub fn new(config: &'a DevflowConfig, runner: R, vcs: V, downloader: D) -> Self {
        Self {
            config,
            runner,
            driver: ConvergenceDriver::new(vcs, config.external_dir()),
            fetcher: ToolchainFetcher::new(config.resolved_toolchain(), downloader),
        }
    }

    /// Installed world directory
    #[must_use]
    pub fn world_dir(&self) -> PathBuf {
        self.config
            .installed_content_dir()
            .join(&self.config.build.world_install)
    }

    /// Run every step of `mode`, stopping at the first failure
    ///
    /// `assume_yes` announces steps without waiting even in [`Mode::Full`].
    ///
    /// # Errors
    /// Returns the first step failure
    pub fn run<O: Operator + ?Sized>(
        &self,
        mode: Mode,
        operator: &mut O,
        assume_yes: bool,
    ) -> Result<WorkflowReport, CoreError> {
        let mut report = WorkflowReport::default();
        for &step in mode.steps() {
            if !self.enabled(step) {
                tracing::info!("{:?} disabled in config", step);
                report.skipped.push(step);
                continue;
            }
            if mode.confirms() && !assume_yes {
                operator.confirm(step.banner())?;
            } else {
                operator.notify(step.banner());
            }
            self.run_step(step, operator, &mut report)?;
            report.completed.push(step);
        }
        Ok(report)
    }

    fn enabled(&self, step: Step) -> bool {
        match step {
            Step::PullProject => self.config.vcs.pull_project,
            Step::UpdateContent => self.config.vcs.update_content,
            _ => true,
        }
    }

    fn run_step<O: Operator + ?Sized>(
        &self,
        step: Step,
        operator: &mut O,
        report: &mut WorkflowReport,
    ) -> Result<(), CoreError> {
        let root = &self.config.root;
        match step {
            Step::PullProject => self.runner.run(
                &ToolInvocation::new(&self.config.vcs.git)
                    .arg("pull")
                    .current_dir(root),
            ),
            Step::SyncDependencies => {
                report.dependencies = self.driver.converge_all(&self.config.dependencies)?;
                Ok(())
            }
            Step::FetchToolchain => {
                match self.fetcher.spec().version.as_deref() {
                    Some(version) => {
                        let archive = self.fetcher.ensure_toolchain(version)?;
                        operator.notify(&archive.install_instruction());
                        report.toolchain = Some(archive);
                    }
                    None => operator.notify("No toolchain version configured, skipping download"),
                }
                Ok(())
            }
            Step::UpdateContent => self.runner.run(
                &ToolInvocation::new(&self.config.vcs.svn)
                    .arg("update")
                    .current_dir(root),
            ),
            Step::BuildGame => self.runner.run(
                &ToolInvocation::new(&self.config.build.program)
                    .args(&self.config.build.args)
                    .current_dir(root),
            ),
            Step::NukeWorld => {
                let world = self.world_dir();
                if world.is_dir() {
                    tracing::info!("removing {}", world.display());
                    std::fs::remove_dir_all(&world).map_err(|e| CoreError::io(&world, e))?;
                }
                Ok(())
            }
            Step::GenerateWorld => self.runner.run(
                &ToolInvocation::new(self.config.resolve(&self.config.build.world_generator))
                    .args(&self.config.build.world_generator_args)
                    .current_dir(root)
                    .expect_output(self.config.resolve(&self.config.build.world_output)),
            ),
            Step::CopyWorld => {
                let src = self.config.resolve(&self.config.build.world_output);
                report.world = Some(mirror::mirror(&src, &self.world_dir())?);
                Ok(())
            }
        }
    }
}
