//! Release packaging
//!
//! License report, optimized build, staging copy of the install dir, then a
//! zip of the staged tree next to it.

use crate::config::DevflowConfig;
use crate::error::CoreError;
use crate::licenses;
use crate::mirror::{self, MirrorReport};
use crate::runner::{CommandRunner, ToolInvocation};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Outputs of [`ReleasePackager::package`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseArtifacts {
    /// `{product}_{name}_{stage}`
    pub name: String,
    /// Staged release directory
    pub staging_dir: PathBuf,
    /// Zip archive of the staging dir
    pub archive: PathBuf,
    /// Staging copy totals
    pub staged: MirrorReport,
    /// Files stored in the archive
    pub archived_files: usize,
}

/// Produces a distributable release
#[derive(Debug)]
pub struct ReleasePackager<'a, R> {
    config: &'a DevflowConfig,
    runner: R,
}

impl<'a, R: CommandRunner> ReleasePackager<'a, R> {
    /// Create a packager
    pub fn new(config: &'a DevflowConfig, runner: R) -> Self {
        Self { config, runner }
    }

    /// Release name, used for the staging dir and the archive
    #[must_use]
    pub fn release_name(&self) -> String {
        let release = &self.config.release;
        format!("{}_{}_{}", release.product, release.name, release.stage)
    }

    /// Release build invocation
    #[must_use]
    pub fn build_invocation(&self) -> ToolInvocation {
        ToolInvocation::new(&self.config.build.program)
            .args(&self.config.release.build_args)
            .current_dir(&self.config.root)
            .expect_output(self.config.install_dir())
    }

    /// Build, stage and archive a release
    ///
    /// # Errors
    /// Returns the first failing step
    pub fn package(&self) -> Result<ReleaseArtifacts, CoreError> {
        let name = self.release_name();
        tracing::info!("packaging {}", name);

        let report = licenses::build_report(self.config)?;
        self.runner.run(&self.build_invocation())?;

        let staging_dir = self.config.release_dir().join(&name);
        tracing::info!("staging {}", staging_dir.display());
        let staged = mirror::mirror(&self.config.install_dir(), &staging_dir)?;

        let staged_report = staging_dir.join("licenses.txt");
        std::fs::copy(&report, &staged_report).map_err(|e| CoreError::io(&report, e))?;

        let archive = self.config.release_dir().join(format!("{name}.zip"));
        tracing::info!("zipping to {}", archive.display());
        let archived_files = zip_directory(&staging_dir, &archive)?;

        Ok(ReleaseArtifacts {
            name,
            staging_dir,
            archive,
            staged,
            archived_files,
        })
    }
}

/// Write every file under `dir` into a deflated zip at `archive`
///
/// Entry names are relative to `dir` and use `/` separators. Returns the
/// number of files stored.
///
/// # Errors
/// Returns error if a file cannot be read or the archive cannot be written
pub fn zip_directory(dir: &Path, archive: &Path) -> Result<usize, CoreError> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();

    if let Some(parent) = archive.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
    }
    let out = File::create(archive).map_err(|e| CoreError::io(archive, e))?;
    let mut writer = ZipWriter::new(BufWriter::new(out));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let zip_err = |source| CoreError::Archive {
        path: archive.to_path_buf(),
        source,
    };

    for path in &files {
        let Ok(rel) = path.strip_prefix(dir) else {
            continue;
        };
        let entry = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        writer.start_file(entry, options).map_err(zip_err)?;
        let mut input = File::open(path).map_err(|e| CoreError::io(path, e))?;
        io::copy(&mut input, &mut writer).map_err(|e| CoreError::io(archive, e))?;
    }
    writer.finish().map_err(zip_err)?;
    Ok(files.len())
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), CoreError> {
    let entries = std::fs::read_dir(dir).map_err(|e| CoreError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| CoreError::io(dir, e))?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}
