//! Project configuration (`devflow.toml`)
//!
//! Every relative path in the file is resolved against the directory the
//! file lives in, never against the process working directory.

use crate::assets::{MeshJob, ShaderJob, TextureJob};
use crate::error::CoreError;
use crate::licenses::LicenseTable;
use devflow_sync::{Manifest, ToolchainSpec};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name looked up by [`DevflowConfig::discover`]
pub const CONFIG_FILE: &str = "devflow.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DevflowConfig {
    /// Project root; all relative paths resolve against it
    #[serde(skip)]
    pub root: PathBuf,
    /// Directory layout
    pub paths: PathsConfig,
    /// Pinned external repositories, in declaration order
    #[serde(rename = "dependency")]
    pub dependencies: Manifest,
    /// Compiler toolchain download
    pub toolchain: ToolchainSpec,
    /// Game build and world generation
    pub build: BuildConfig,
    /// Asset compilation
    pub assets: AssetsConfig,
    /// License report
    pub licenses: LicensesConfig,
    /// Release packaging
    pub release: ReleaseConfig,
    /// Header binding generation
    pub bindings: BindingsConfig,
    /// Project source control
    pub vcs: VcsConfig,
}

impl DevflowConfig {
    /// Create default configuration rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Load `path`; its parent directory becomes the project root
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        let mut config: Self = toml::from_str(&text).map_err(|source| CoreError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        config.root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        tracing::debug!(
            "loaded {} ({} dependencies)",
            path.display(),
            config.dependencies.len()
        );
        Ok(config)
    }

    /// Find [`CONFIG_FILE`] in `start` or any ancestor and load it
    ///
    /// Falls back to defaults rooted at `start` when none is found.
    ///
    /// # Errors
    /// Returns error if a config file is found but cannot be loaded
    pub fn discover(start: &Path) -> Result<Self, CoreError> {
        match start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE))
            .find(|candidate| candidate.is_file())
        {
            Some(path) => Self::load(&path),
            None => {
                tracing::warn!(
                    "no {} found above {}, using defaults",
                    CONFIG_FILE,
                    start.display()
                );
                Ok(Self::new(start))
            }
        }
    }

    /// With a different dependency manifest
    #[inline]
    #[must_use]
    pub fn with_dependencies(mut self, manifest: Manifest) -> Self {
        self.dependencies = manifest;
        self
    }

    /// With a different toolchain spec
    #[inline]
    #[must_use]
    pub fn with_toolchain(mut self, toolchain: ToolchainSpec) -> Self {
        self.toolchain = toolchain;
        self
    }

    /// Resolve a project-relative path
    #[must_use]
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    /// Dependency checkout root
    #[must_use]
    pub fn external_dir(&self) -> PathBuf {
        self.resolve(&self.paths.external)
    }

    /// Build output directory
    #[must_use]
    pub fn install_dir(&self) -> PathBuf {
        self.resolve(&self.paths.install)
    }

    /// Source content directory
    #[must_use]
    pub fn content_dir(&self) -> PathBuf {
        self.resolve(&self.paths.content)
    }

    /// Installed content directory inside the build output
    #[must_use]
    pub fn installed_content_dir(&self) -> PathBuf {
        self.install_dir().join("content")
    }

    /// External tool binaries directory
    #[must_use]
    pub fn tools_dir(&self) -> PathBuf {
        self.resolve(&self.paths.tools)
    }

    /// Release staging directory
    #[must_use]
    pub fn release_dir(&self) -> PathBuf {
        self.resolve(&self.paths.release)
    }

    /// Toolchain spec with its download directory resolved
    #[must_use]
    pub fn resolved_toolchain(&self) -> ToolchainSpec {
        ToolchainSpec {
            download_dir: self.resolve(&self.toolchain.download_dir),
            ..self.toolchain.clone()
        }
    }
}

/// Directory layout, relative to the project root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Dependency checkouts
    pub external: PathBuf,
    /// Build output
    pub install: PathBuf,
    /// Source content
    pub content: PathBuf,
    /// External tool binaries
    pub tools: PathBuf,
    /// Release staging
    pub release: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            external: PathBuf::from("external"),
            install: PathBuf::from("zig-out/bin"),
            content: PathBuf::from("content"),
            tools: PathBuf::from("tools/binaries"),
            release: PathBuf::from("release_build"),
        }
    }
}

/// Game build and offline world generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Build tool
    pub program: PathBuf,
    /// Arguments for a development build
    pub args: Vec<String>,
    /// World generator executable, relative to the project root
    pub world_generator: PathBuf,
    /// Arguments for offline generation
    pub world_generator_args: Vec<String>,
    /// Where the generator writes the world, relative to the project root
    pub world_output: PathBuf,
    /// Where the world is installed, relative to the installed content dir
    pub world_install: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("zig"),
            args: vec!["build".to_string()],
            world_generator: PathBuf::from("zig-out/bin/TidesOfRevival.exe"),
            world_generator_args: vec!["--offlinegen".to_string()],
            world_output: PathBuf::from("content/patch"),
            world_install: PathBuf::from("patch"),
        }
    }
}

/// Asset compilation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Texture converter, relative to the tools dir
    pub texture_tool: PathBuf,
    /// Shader compiler, relative to the tools dir
    pub shader_tool: PathBuf,
    /// Mesh processor, relative to the tools dir
    pub mesh_tool: PathBuf,
    /// Shader sources, relative to the project root
    pub shader_source: PathBuf,
    /// Compiled shader output, relative to the installed content dir
    pub shader_output: PathBuf,
    /// Shader model suffix appended to the stage (`vs` → `vs_6_6`)
    pub shader_model: String,
    /// Content directories copied verbatim into the installed content dir
    pub install_textures: Vec<PathBuf>,
    /// Textures to convert
    #[serde(rename = "texture")]
    pub textures: Vec<TextureJob>,
    /// Shaders to compile
    #[serde(rename = "shader")]
    pub shaders: Vec<ShaderJob>,
    /// Mesh directories to process
    #[serde(rename = "mesh")]
    pub meshes: Vec<MeshJob>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            texture_tool: PathBuf::from("texconv/texconv.exe"),
            shader_tool: PathBuf::from("dxc/dxc.exe"),
            mesh_tool: PathBuf::from("asset_pipeline/AssetPipelineCmd.exe"),
            shader_source: PathBuf::from("src/shaders/HLSL"),
            shader_output: PathBuf::from("compiled_shaders/DIRECT3D12"),
            shader_model: "6_6".to_string(),
            install_textures: Vec::new(),
            textures: Vec::new(),
            shaders: Vec::new(),
            meshes: Vec::new(),
        }
    }
}

/// License report settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicensesConfig {
    /// Report path, relative to the project root
    pub output: PathBuf,
    /// Input tables, rendered in order
    #[serde(rename = "table")]
    pub tables: Vec<LicenseTable>,
}

impl Default for LicensesConfig {
    fn default() -> Self {
        use crate::licenses::LicenseKind;
        Self {
            output: PathBuf::from("licenses.txt"),
            tables: vec![
                LicenseTable::new("src/licenses.csv", LicenseKind::Code),
                LicenseTable::new("content/content.csv", LicenseKind::Content),
                LicenseTable::new(
                    "../tides-rpg-source-assets/source_assets.csv",
                    LicenseKind::SourceAssets,
                )
                .optional(),
            ],
        }
    }
}

/// Release packaging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Product name prefix
    pub product: String,
    /// Release name
    pub name: String,
    /// Build stage (Alpha, Beta, ...)
    pub stage: String,
    /// Arguments passed to the build tool for a release build
    pub build_args: Vec<String>,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            product: "Tides_of_Revival".to_string(),
            name: "A_Sense_Of_Scale".to_string(),
            stage: "Beta".to_string(),
            build_args: [
                "build",
                "-Dtarget=native-native-msvc",
                "-Doptimize=ReleaseSafe",
                "-Dcpu=baseline",
                "--summary",
                "failures",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
        }
    }
}

/// Header binding generation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingsConfig {
    /// Generator checkout, relative to the external dir
    pub generator: PathBuf,
    /// Generator binary, relative to the generator checkout
    pub generator_binary: PathBuf,
    /// Headers to translate, relative to the external dir
    pub headers: Vec<PathBuf>,
}

impl Default for BindingsConfig {
    fn default() -> Self {
        Self {
            generator: PathBuf::from("c2z"),
            generator_binary: PathBuf::from("zig-out/bin/c2z"),
            headers: Vec::new(),
        }
    }
}

/// Project source control settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VcsConfig {
    /// Git executable
    pub git: PathBuf,
    /// Pull the project repository in the full-pull workflow
    pub pull_project: bool,
    /// Subversion executable
    pub svn: PathBuf,
    /// Run `svn update` for large content in the full-pull workflow
    pub update_content: bool,
}

impl Default for VcsConfig {
    fn default() -> Self {
        Self {
            git: PathBuf::from("git"),
            pull_project: true,
            svn: PathBuf::from("svn"),
            update_content: true,
        }
    }
}
