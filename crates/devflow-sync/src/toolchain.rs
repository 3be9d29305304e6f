//! Toolchain archive fetching
//!
//! Downloads a specific compiler build by constructing its canonical archive
//! name and trying the primary host once, then the mirror once. An archive
//! already on disk is returned without touching the network. Unpacking and
//! installing stay with the operator.

use crate::error::{DownloadFailure, SyncError};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Where toolchain archives come from and where they go
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSpec {
    /// Archive name prefix, e.g. `zig-windows-x86_64`
    pub platform_triple: String,
    /// Archive extension without the dot
    pub extension: String,
    /// Base URL of the primary distribution host
    pub primary_url: String,
    /// Base URL of the fallback host
    pub mirror_url: String,
    /// Local directory archives are stored in
    pub download_dir: PathBuf,
    /// Version pinned by the project, used when none is given explicitly
    pub version: Option<String>,
}

impl Default for ToolchainSpec {
    fn default() -> Self {
        Self {
            platform_triple: "zig-windows-x86_64".to_string(),
            extension: "zip".to_string(),
            primary_url: "https://ziglang.org/builds".to_string(),
            mirror_url: "https://pkg.machengine.org/zig".to_string(),
            download_dir: PathBuf::from("toolchain"),
            version: None,
        }
    }
}

impl ToolchainSpec {
    /// `<platform-triple>-<version>.<ext>`
    #[must_use]
    pub fn archive_name(&self, version: &str) -> String {
        format!("{}-{}.{}", self.platform_triple, version, self.extension)
    }
}

/// Which source satisfied [`ToolchainFetcher::ensure_toolchain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveSource {
    /// Already on disk
    Cached,
    /// Downloaded from the primary host
    Primary,
    /// Downloaded from the mirror after the primary failed
    Mirror,
}

/// A toolchain archive present on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolchainArchive {
    /// Local archive path
    pub path: PathBuf,
    /// Where it came from
    pub source: ArchiveSource,
}

impl ToolchainArchive {
    /// Manual step the operator still has to perform
    #[must_use]
    pub fn install_instruction(&self) -> String {
        format!(
            "Toolchain archive ready at {}. Unpack it and put the extracted directory on PATH.",
            self.path.display()
        )
    }
}

/// Blocking transfer of one URL to one file
#[cfg_attr(test, mockall::automock)]
pub trait Downloader {
    /// Download `url` into `dest`; `dest` must not exist afterwards on failure
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadFailure>;
}

/// Fetches toolchain archives
#[derive(Debug)]
pub struct ToolchainFetcher<D> {
    spec: ToolchainSpec,
    downloader: D,
}

impl<D: Downloader> ToolchainFetcher<D> {
    /// Create a fetcher
    pub fn new(spec: ToolchainSpec, downloader: D) -> Self {
        Self { spec, downloader }
    }

    /// Source/destination settings
    #[must_use]
    pub fn spec(&self) -> &ToolchainSpec {
        &self.spec
    }

    /// Local path the archive for `version` lives at
    #[must_use]
    pub fn local_path(&self, version: &str) -> PathBuf {
        self.spec.download_dir.join(self.spec.archive_name(version))
    }

    /// Make sure the archive for `version` is on disk
    ///
    /// # Errors
    /// Returns [`SyncError::DownloadError`] when both hosts fail, or
    /// [`SyncError::Io`] when the download directory cannot be created
    pub fn ensure_toolchain(&self, version: &str) -> Result<ToolchainArchive, SyncError> {
        let archive = self.spec.archive_name(version);
        let path = self.local_path(version);

        if path.is_file() {
            tracing::info!("{} already downloaded", archive);
            return Ok(ToolchainArchive {
                path,
                source: ArchiveSource::Cached,
            });
        }

        std::fs::create_dir_all(&self.spec.download_dir)
            .map_err(|e| SyncError::io(&self.spec.download_dir, e))?;

        let primary_url = join_url(&self.spec.primary_url, &archive);
        tracing::info!("downloading {}", primary_url);
        let primary = match self.downloader.download(&primary_url, &path) {
            Ok(()) => {
                return Ok(ToolchainArchive {
                    path,
                    source: ArchiveSource::Primary,
                })
            }
            Err(failure) => failure,
        };

        tracing::warn!("primary download failed ({}), trying mirror", primary.reason);
        let mirror_url = join_url(&self.spec.mirror_url, &archive);
        match self.downloader.download(&mirror_url, &path) {
            Ok(()) => Ok(ToolchainArchive {
                path,
                source: ArchiveSource::Mirror,
            }),
            Err(mirror) => Err(SyncError::DownloadError {
                archive,
                primary,
                mirror,
            }),
        }
    }
}

fn join_url(base: &str, file: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), file)
}

/// [`Downloader`] over blocking HTTP
///
/// The body is streamed into a temporary file in the destination directory
/// and renamed into place only once complete.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::blocking::Client,
}

impl HttpDownloader {
    /// Create a downloader with a default client
    ///
    /// # Errors
    /// Returns the failure when the HTTP client cannot be constructed
    pub fn new() -> Result<Self, DownloadFailure> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("devflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DownloadFailure::new("", e.to_string()))?;
        Ok(Self { client })
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadFailure> {
        let fail = |reason: String| DownloadFailure::new(url, reason);

        let mut response = self
            .client
            .get(url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| fail(e.to_string()))?;

        let dir = dest.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| fail(e.to_string()))?;
        let bytes = response
            .copy_to(tmp.as_file_mut())
            .map_err(|e| fail(e.to_string()))?;
        tmp.as_file_mut().flush().map_err(|e| fail(e.to_string()))?;
        tmp.persist(dest).map_err(|e| fail(e.error.to_string()))?;

        tracing::debug!("wrote {} bytes to {}", bytes, dest.display());
        Ok(())
    }
}
