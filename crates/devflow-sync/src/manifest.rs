//! Dependency manifest
//!
//! An ordered list of pinned external repositories. Records are immutable
//! once a [`Manifest`] has been built; order is preserved because later
//! entries may expect earlier ones to be on disk already.

use crate::error::ManifestError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One pinned external repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    /// Directory name under the checkout root
    #[serde(rename = "name")]
    pub local_name: String,
    /// Clone URL (or local path)
    #[serde(rename = "url")]
    pub remote_location: String,
    /// Commit hash, branch or tag
    #[serde(rename = "revision")]
    pub target_revision: String,
}

impl DependencyRecord {
    /// Create a record
    #[must_use]
    pub fn new(
        local_name: impl Into<String>,
        remote_location: impl Into<String>,
        target_revision: impl Into<String>,
    ) -> Self {
        Self {
            local_name: local_name.into(),
            remote_location: remote_location.into(),
            target_revision: target_revision.into(),
        }
    }

    fn validate(&self) -> Result<(), ManifestError> {
        if !is_safe_name(&self.local_name) {
            return Err(ManifestError::UnsafeName(self.local_name.clone()));
        }
        if self.remote_location.trim().is_empty() {
            return Err(ManifestError::MissingRemote(self.local_name.clone()));
        }
        if self.target_revision.trim().is_empty() {
            return Err(ManifestError::MissingRevision(self.local_name.clone()));
        }
        Ok(())
    }
}

/// A local name must be a single plain path component.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Validated, ordered set of dependency records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Manifest {
    records: Vec<DependencyRecord>,
}

impl Manifest {
    /// Build a manifest, preserving declaration order
    ///
    /// # Errors
    /// Returns error if any record is invalid or two records share a name
    pub fn new(records: Vec<DependencyRecord>) -> Result<Self, ManifestError> {
        let mut seen = HashSet::new();
        for record in &records {
            record.validate()?;
            if !seen.insert(record.local_name.as_str()) {
                return Err(ManifestError::DuplicateName(record.local_name.clone()));
            }
        }
        Ok(Self { records })
    }

    /// Records in declaration order
    #[inline]
    #[must_use]
    pub fn records(&self) -> &[DependencyRecord] {
        &self.records
    }

    /// Look up a record by local name
    #[must_use]
    pub fn get(&self, local_name: &str) -> Option<&DependencyRecord> {
        self.records.iter().find(|r| r.local_name == local_name)
    }

    /// Restrict to the named records, keeping declaration order
    ///
    /// Unknown names are ignored; callers that need to report them should
    /// check with [`Manifest::get`] first.
    #[must_use]
    pub fn only(&self, names: &[String]) -> Self {
        Self {
            records: self
                .records
                .iter()
                .filter(|r| names.iter().any(|n| *n == r.local_name))
                .cloned()
                .collect(),
        }
    }

    /// Number of records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'de> Deserialize<'de> for Manifest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let records = Vec::<DependencyRecord>::deserialize(deserializer)?;
        Manifest::new(records).map_err(serde::de::Error::custom)
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a DependencyRecord;
    type IntoIter = std::slice::Iter<'a, DependencyRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(name: &str) -> DependencyRecord {
        DependencyRecord::new(name, format!("https://github.com/example/{name}.git"), "main")
    }

    #[test]
    fn preserves_declaration_order() {
        let manifest = Manifest::new(vec![
            record("zig-args"),
            record("zig-flecs"),
            record("zig-gamedev"),
            record("zigimg"),
        ])
        .unwrap();

        let names: Vec<_> = manifest.records().iter().map(|r| r.local_name.as_str()).collect();
        assert_eq!(names, ["zig-args", "zig-flecs", "zig-gamedev", "zigimg"]);
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Manifest::new(vec![record("zigimg"), record("zigimg")]).unwrap_err();
        assert_eq!(err, ManifestError::DuplicateName("zigimg".into()));
    }

    #[test]
    fn rejects_path_like_names() {
        for name in ["", ".", "..", "../escape", "a/b", "a\\b", "-rf"] {
            let err = Manifest::new(vec![record(name)]).unwrap_err();
            assert_eq!(err, ManifestError::UnsafeName(name.into()), "name {name:?}");
        }
    }

    #[test]
    fn rejects_blank_remote_and_revision() {
        let mut r = record("a");
        r.remote_location = "  ".into();
        assert_eq!(
            Manifest::new(vec![r]).unwrap_err(),
            ManifestError::MissingRemote("a".into())
        );

        let mut r = record("a");
        r.target_revision = String::new();
        assert_eq!(
            Manifest::new(vec![r]).unwrap_err(),
            ManifestError::MissingRevision("a".into())
        );
    }

    #[test]
    fn only_keeps_order_and_skips_unknown() {
        let manifest = Manifest::new(vec![record("a"), record("b"), record("c")]).unwrap();
        let subset = manifest.only(&["c".to_string(), "a".to_string(), "zz".to_string()]);
        let names: Vec<_> = subset.into_iter().map(|r| r.local_name.as_str()).collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[test]
    fn deserializes_from_toml_array_of_tables() {
        #[derive(Deserialize)]
        struct Doc {
            dependency: Manifest,
        }

        let doc: Doc = toml::from_str(
            r#"
            [[dependency]]
            name = "zig-args"
            url = "https://github.com/MasterQ32/zig-args.git"
            revision = "872272205d95bdba33798c94e72c5387a31bc806"

            [[dependency]]
            name = "zigimg"
            url = "https://github.com/zigimg/zigimg.git"
            revision = "main"
            "#,
        )
        .unwrap();

        assert_eq!(doc.dependency.len(), 2);
        assert_eq!(doc.dependency.get("zigimg").unwrap().target_revision, "main");
    }

    #[test]
    fn deserialize_surfaces_validation_errors() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Doc {
            dependency: Manifest,
        }

        let err = toml::from_str::<Doc>(
            r#"
            [[dependency]]
            name = "a"
            url = "u"
            revision = "main"

            [[dependency]]
            name = "a"
            url = "u"
            revision = "main"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("declared more than once"));
    }

    proptest! {
        #[test]
        fn prop_plain_names_accepted(name in "[a-zA-Z0-9_][a-zA-Z0-9_.-]{0,30}") {
            prop_assume!(name != "." && name != "..");
            prop_assert!(is_safe_name(&name));
        }

        #[test]
        fn prop_separators_rejected(a in "[a-z]{1,8}", b in "[a-z]{1,8}", sep in "[/\\\\]") {
            let name = format!("{a}{sep}{b}");
            prop_assert!(!is_safe_name(&name));
        }
    }
}
