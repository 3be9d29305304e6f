//! Asset compilation
//!
//! Textures, shaders and meshes are converted by external command-line
//! tools. Each tool runs with its own directory as working directory (they
//! load sibling DLLs) and receives absolute input/output paths.

use crate::config::DevflowConfig;
use crate::error::CoreError;
use crate::mirror::{self, MirrorReport, SyncMode};
use crate::runner::{tool_dir, CommandRunner, ToolInvocation};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Texture to convert into a GPU block-compressed format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureJob {
    /// Directory relative to the content dir
    pub dir: PathBuf,
    /// Source image file name
    pub file: String,
    /// Target format, e.g. `BC1_UNORM`
    pub format: String,
}

/// Shader to compile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderJob {
    /// Source file relative to the shader source dir
    pub input: PathBuf,
    /// Output file relative to the shader output dir
    pub output: PathBuf,
    /// Pipeline stage profile prefix (`vs`, `ps`, `cs`)
    pub stage: String,
    /// Entry point
    #[serde(default = "default_entry_point")]
    pub entry: String,
}

fn default_entry_point() -> String {
    "main".to_string()
}

/// glTF directory to process into runtime meshes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshJob {
    /// Directory relative to the content dir
    pub dir: PathBuf,
}

/// Counts of compiled assets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssetSummary {
    /// Textures converted
    pub textures: usize,
    /// Shaders compiled
    pub shaders: usize,
    /// Mesh directories processed
    pub meshes: usize,
    /// Files copied by texture-directory installation
    pub installed_files: usize,
}

/// Builds and runs asset tool invocations
#[derive(Debug)]
pub struct AssetCompiler<'a, R> {
    config: &'a DevflowConfig,
    runner: R,
}

impl<'a, R: CommandRunner> AssetCompiler<'a, R> {
    /// Create a compiler
    pub fn new(config: &'a DevflowConfig, runner: R) -> Self {
        Self { config, runner }
    }

    fn tool(&self, relative: &Path) -> PathBuf {
        self.config.tools_dir().join(relative)
    }

    /// Invocation converting one texture
    #[must_use]
    pub fn texture_invocation(&self, job: &TextureJob) -> ToolInvocation {
        let program = self.tool(&self.config.assets.texture_tool);
        let input = self.config.content_dir().join(&job.dir).join(&job.file);
        let output_dir = self.config.installed_content_dir().join(&job.dir);
        let stem = Path::new(&job.file)
            .file_stem()
            .map_or_else(|| job.file.clone(), |s| s.to_string_lossy().into_owned());

        with_tool_dir(
            ToolInvocation::new(&program)
                .args(["-y", "-f", job.format.as_str(), "-o"])
                .arg(&output_dir)
                .arg(&input)
                .expect_output(output_dir.join(format!("{stem}.dds"))),
            &program,
        )
    }

    /// Invocation compiling one shader
    #[must_use]
    pub fn shader_invocation(&self, job: &ShaderJob) -> ToolInvocation {
        let assets = &self.config.assets;
        let program = self.tool(&assets.shader_tool);
        let input = self.config.resolve(&assets.shader_source).join(&job.input);
        let output = self.shader_output_dir().join(&job.output);
        let profile = format!("{}_{}", job.stage, assets.shader_model);

        with_tool_dir(
            ToolInvocation::new(&program)
                .arg(&input)
                .arg("-Fo")
                .arg(&output)
                .args(["-E", job.entry.as_str(), "-T", profile.as_str(), "-WX", "-Ges", "-O3"])
                .expect_output(output),
            &program,
        )
    }

    /// Invocation processing one glTF directory
    #[must_use]
    pub fn mesh_invocation(&self, job: &MeshJob) -> ToolInvocation {
        let program = self.tool(&self.config.assets.mesh_tool);
        let input = self.config.content_dir().join(&job.dir);
        let output = self.config.installed_content_dir().join(&job.dir);

        with_tool_dir(
            ToolInvocation::new(&program)
                .arg("-pgltf")
                .arg("--input")
                .arg(&input)
                .arg("--output")
                .arg(&output),
            &program,
        )
    }

    fn shader_output_dir(&self) -> PathBuf {
        self.config
            .installed_content_dir()
            .join(&self.config.assets.shader_output)
    }

    /// Copy configured texture directories into the installed content dir
    ///
    /// # Errors
    /// Returns the first copy failure
    pub fn install_textures(&self) -> Result<MirrorReport, CoreError> {
        let mut total = MirrorReport::default();
        for dir in &self.config.assets.install_textures {
            let src = self.config.content_dir().join(dir);
            let dst = self.config.installed_content_dir().join(dir);
            tracing::info!("installing {}", dir.display());
            total += mirror::apply(&src, &dst, SyncMode::Overlay)?;
        }
        Ok(total)
    }

    /// Convert every configured texture
    ///
    /// # Errors
    /// Returns the first tool failure
    pub fn compile_textures(&self) -> Result<usize, CoreError> {
        tracing::info!("compiling {} textures", self.config.assets.textures.len());
        for job in &self.config.assets.textures {
            let output_dir = self.config.installed_content_dir().join(&job.dir);
            create_dir(&output_dir)?;
            self.runner.run(&self.texture_invocation(job))?;
        }
        Ok(self.config.assets.textures.len())
    }

    /// Compile every configured shader
    ///
    /// # Errors
    /// Returns the first tool failure
    pub fn compile_shaders(&self) -> Result<usize, CoreError> {
        tracing::info!("compiling {} shaders", self.config.assets.shaders.len());
        for job in &self.config.assets.shaders {
            let output = self.shader_output_dir().join(&job.output);
            if let Some(parent) = output.parent() {
                create_dir(parent)?;
            }
            self.runner.run(&self.shader_invocation(job))?;
        }
        Ok(self.config.assets.shaders.len())
    }

    /// Process every configured mesh directory
    ///
    /// # Errors
    /// Returns the first tool failure
    pub fn compile_meshes(&self) -> Result<usize, CoreError> {
        tracing::info!("compiling {} glTF directories", self.config.assets.meshes.len());
        for job in &self.config.assets.meshes {
            create_dir(&self.config.installed_content_dir().join(&job.dir))?;
            self.runner.run(&self.mesh_invocation(job))?;
        }
        Ok(self.config.assets.meshes.len())
    }

    /// Install texture dirs, then convert textures, shaders and meshes
    ///
    /// # Errors
    /// Returns the first failure
    pub fn compile_all(&self) -> Result<AssetSummary, CoreError> {
        let installed = self.install_textures()?;
        Ok(AssetSummary {
            installed_files: installed.copied,
            textures: self.compile_textures()?,
            shaders: self.compile_shaders()?,
            meshes: self.compile_meshes()?,
        })
    }
}

fn with_tool_dir(invocation: ToolInvocation, program: &Path) -> ToolInvocation {
    match tool_dir(program) {
        Some(dir) => invocation.current_dir(dir),
        None => invocation,
    }
}

fn create_dir(dir: &Path) -> Result<(), CoreError> {
    std::fs::create_dir_all(dir).map_err(|e| CoreError::io(dir, e))
}
