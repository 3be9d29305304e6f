//! License report
//!
//! Aggregates tab-separated license tables into the plain-text
//! `licenses.txt` shipped with every release. Each table has a header row;
//! only rows whose first column starts with `Y` (used) are reported.

use crate::config::DevflowConfig;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Layout of a license table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LicenseKind {
    /// `used, name, origin, license`
    Code,
    /// `used, path, asset, origin, license, original_filename`
    Content,
    /// `used, path, asset, origin, license`
    SourceAssets,
}

impl LicenseKind {
    /// Section heading in the report
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Code => "CODE LICENCES",
            Self::Content => "CONTENT LICENCES",
            Self::SourceAssets => "SOURCE ASSET LICENCES",
        }
    }

    /// Number of tab-separated columns per row
    #[must_use]
    pub const fn columns(self) -> usize {
        match self {
            Self::Code => 4,
            Self::Content => 6,
            Self::SourceAssets => 5,
        }
    }

    fn entry(self, fields: &[&str]) -> LicenseEntry {
        let (title, origin, license) = match self {
            Self::Code => (fields[1].to_string(), fields[2], fields[3]),
            Self::Content => (format!("{}/{}", fields[1], fields[2]), fields[3], fields[4]),
            Self::SourceAssets => (fields[2].to_string(), fields[3], fields[4]),
        };
        LicenseEntry {
            title,
            origin: origin.to_string(),
            license: license.to_string(),
        }
    }
}

/// One input table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseTable {
    /// File path, relative to the project root
    pub path: PathBuf,
    /// Column layout
    pub kind: LicenseKind,
    /// Skip with a warning instead of failing when the file is missing
    #[serde(default)]
    pub optional: bool,
}

impl LicenseTable {
    /// Required table
    pub fn new(path: impl Into<PathBuf>, kind: LicenseKind) -> Self {
        Self {
            path: path.into(),
            kind,
            optional: false,
        }
    }

    /// Mark as optional
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// One reported component
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseEntry {
    /// Component name or asset path
    pub title: String,
    /// Where it came from
    pub origin: String,
    /// License name
    pub license: String,
}

/// Parse the used rows of one table
///
/// # Errors
/// Returns [`CoreError::License`] for a used row with the wrong column count
pub fn parse_table(
    kind: LicenseKind,
    text: &str,
    file: &Path,
) -> Result<Vec<LicenseEntry>, CoreError> {
    let mut entries = Vec::new();
    for (index, line) in text.lines().enumerate().skip(1) {
        let line = line.trim();
        if !line.starts_with('Y') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        if fields.len() != kind.columns() {
            return Err(CoreError::License {
                file: file.to_path_buf(),
                line: index + 1,
                reason: format!(
                    "expected {} columns, found {}",
                    kind.columns(),
                    fields.len()
                ),
            });
        }
        entries.push(kind.entry(&fields));
    }
    Ok(entries)
}

/// Render report sections in the given order
#[must_use]
pub fn render(sections: &[(LicenseKind, Vec<LicenseEntry>)]) -> String {
    let mut out = String::new();
    for (i, (kind, entries)) in sections.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let rule = "-".repeat(kind.title().len());
        let _ = writeln!(out, "{rule}\n{}\n{rule}", kind.title());
        for entry in entries {
            let _ = writeln!(
                out,
                "{}\nOrigin: {}\nLicense: {}\n",
                entry.title, entry.origin, entry.license
            );
        }
    }
    out
}

/// Read every configured table and write the report
///
/// # Errors
/// Returns error for a missing required table, a malformed row, or a
/// failed write
pub fn build_report(config: &DevflowConfig) -> Result<PathBuf, CoreError> {
    let mut sections = Vec::with_capacity(config.licenses.tables.len());
    for table in &config.licenses.tables {
        let path = config.resolve(&table.path);
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => parse_table(table.kind, &text, &path)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && table.optional => {
                tracing::warn!("optional license table {} not found", path.display());
                Vec::new()
            }
            Err(e) => return Err(CoreError::io(&path, e)),
        };
        tracing::debug!("{}: {} entries", path.display(), entries.len());
        sections.push((table.kind, entries));
    }

    let output = config.resolve(&config.licenses.output);
    std::fs::write(&output, render(&sections)).map_err(|e| CoreError::io(&output, e))?;
    tracing::info!("wrote {}", output.display());
    Ok(output)
}
