use std::fmt;

use crate::package::{PackageName, PackageRef};
use crate::version::Version;

/// Separator between the fields of an [`ArtifactKey`].
///
/// None of the filename grammars admit it, so it never occurs inside a field.
pub const KEY_DELIMITER: char = ':';

/// A stored (or storable) artifact: a package reference with a pinned version.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArtifactId {
    pub name: PackageName,
    pub version: Version,
    pub variant: String,
}

impl ArtifactId {
    /// Deterministic store key, `name:version:variant`.
    pub fn storage_key(&self) -> ArtifactKey {
        ArtifactKey(format!(
            "{}{KEY_DELIMITER}{}{KEY_DELIMITER}{}",
            self.name, self.version, self.variant
        ))
    }

    /// Display filename rebuilt from the identity, e.g. `mypkg-1.2.0.tar.gz`.
    pub fn canonical_filename(&self) -> String {
        format!("{}-{}{}", self.name, self.version, self.variant)
    }
}

impl From<ArtifactId> for PackageRef {
    fn from(id: ArtifactId) -> Self {
        PackageRef {
            name: id.name,
            version: Some(id.version),
            variant: id.variant,
        }
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_filename())
    }
}

/// Store key of a single artifact.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArtifactKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Key prefix shared by every artifact of `name`.
pub fn package_prefix(name: &PackageName) -> String {
    format!("{name}{KEY_DELIMITER}")
}
