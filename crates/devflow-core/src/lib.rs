//! devflow-core - Developer workflow for the game project
//!
//! Everything a developer runs besides the compiler itself:
//! - Loads `devflow.toml` into a [`DevflowConfig`]
//! - Runs external tools and checks the artifacts they promise
//! - Compiles textures, shaders and meshes
//! - Mirrors directory trees for install, world copy and release staging
//! - Writes the license report and packages releases
//! - Drives the full-pull workflow on top of [`devflow_sync`]
//!
//! # Example
//!
//! ```rust,ignore
//! use devflow_core::prelude::*;
//!
//! let config = DevflowConfig::discover(&std::env::current_dir()?)?;
//! let packager = ReleasePackager::new(&config, ProcessRunner::new());
//! let artifacts = packager.package()?;
//! println!("wrote {}", artifacts.archive.display());
//! ```

pub mod assets;
pub mod bindings;
pub mod config;
pub mod error;
pub mod licenses;
pub mod mirror;
pub mod release;
pub mod runner;
pub mod workflow;

pub use assets::{AssetCompiler, AssetSummary, MeshJob, ShaderJob, TextureJob};
pub use bindings::BindingGenerator;
pub use config::{
    AssetsConfig, BindingsConfig, BuildConfig, DevflowConfig, LicensesConfig, PathsConfig,
    ReleaseConfig, VcsConfig, CONFIG_FILE,
};
pub use error::CoreError;
pub use licenses::{LicenseEntry, LicenseKind, LicenseTable};
pub use mirror::{ChangeKind, MirrorChange, MirrorReport, SyncMode};
pub use release::{ReleaseArtifacts, ReleasePackager};
pub use runner::{CommandRunner, ProcessRunner, ToolInvocation};
pub use workflow::{Mode, Operator, Step, Workflow, WorkflowReport};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with devflow core
    pub use crate::{
        AssetCompiler, BindingGenerator, CommandRunner, CoreError, DevflowConfig, Mode, Operator,
        ProcessRunner, ReleasePackager, ToolInvocation, Workflow,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
