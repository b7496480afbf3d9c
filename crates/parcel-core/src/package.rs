use std::fmt;
use std::sync::OnceLock;

use crate::error::ParseError;
use crate::key::ArtifactId;
use crate::version::{Version, VERSION_GRAMMAR};

/// Version token that asks for the newest stored version.
pub const LATEST: &str = "latest";

/// Normalized package name: lowercase, `-` and `_` both written as `_`.
///
/// `Foo-Bar`, `foo_bar` and `FOO_BAR` all normalize to `foo_bar`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageName(String);

impl PackageName {
    fn normalize(raw: &str) -> Self {
        let normalized = raw
            .chars()
            .map(|ch| match ch {
                '-' | '_' => '_',
                other => other.to_ascii_lowercase(),
            })
            .collect();
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A package as addressed by a request filename.
///
/// `version` is `None` when the filename used the [`LATEST`] sentinel and the
/// caller still has to resolve it against the store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PackageRef {
    pub name: PackageName,
    pub version: Option<Version>,
    pub variant: String,
}

impl PackageRef {
    pub fn is_latest(&self) -> bool {
        self.version.is_none()
    }

    /// Pin the reference to `version`, replacing whatever the filename said.
    pub fn resolve(self, version: Version) -> ArtifactId {
        ArtifactId {
            name: self.name,
            version,
            variant: self.variant,
        }
    }

    /// The artifact this reference names, if its version is already known.
    pub fn into_artifact(self) -> Option<ArtifactId> {
        let version = self.version?;
        Some(ArtifactId {
            name: self.name,
            version,
            variant: self.variant,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ArchiveShape {
    Tarball,
    Wheel,
}

impl ArchiveShape {
    fn detect(filename: &str) -> Option<Self> {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") {
            Some(ArchiveShape::Tarball)
        } else if lower.ends_with(".whl") {
            Some(ArchiveShape::Wheel)
        } else {
            None
        }
    }

    fn matcher(self) -> &'static regex::Regex {
        static TARBALL_RE: OnceLock<regex::Regex> = OnceLock::new();
        static WHEEL_RE: OnceLock<regex::Regex> = OnceLock::new();

        match self {
            // Tarball names may contain `-`; the greedy name run splits at the
            // last `-` that is followed by a complete version token.
            ArchiveShape::Tarball => TARBALL_RE.get_or_init(|| {
                regex::Regex::new(&format!(
                    r"(?i-u)^(?P<name>[a-z0-9][a-z0-9._-]*)-(?P<version>{LATEST}|{VERSION_GRAMMAR})(?P<variant>\.tar\.gz)$"
                ))
                .expect("tarball regex should compile")
            }),
            // Wheel names never contain `-`; the variant is the tag suffix
            // (optional build tag, python, abi, platform).
            ArchiveShape::Wheel => WHEEL_RE.get_or_init(|| {
                regex::Regex::new(&format!(
                    r"(?i-u)^(?P<name>[a-z0-9][a-z0-9._]*)-(?P<version>{LATEST}|{VERSION_GRAMMAR})(?P<variant>(?:-[a-z0-9._]+){{3,4}}\.whl)$"
                ))
                .expect("wheel regex should compile")
            }),
        }
    }

    fn mismatch(self, filename: &str) -> ParseError {
        match self {
            ArchiveShape::Tarball => ParseError::InvalidTarball(filename.to_owned()),
            ArchiveShape::Wheel => ParseError::InvalidWheel(filename.to_owned()),
        }
    }
}

/// Parse an archive filename into a [`PackageRef`].
///
/// Recognized shapes (case-insensitive):
/// - `<name>-<version>.tar.gz`
/// - `<name>-<version>-<tags>.whl`, where `<name>` has no `-`
///
/// With `allow_latest`, a version segment equal to `latest` yields a reference
/// with `version: None`; otherwise it is rejected.
pub fn parse_filename(filename: &str, allow_latest: bool) -> Result<PackageRef, ParseError> {
    let shape = ArchiveShape::detect(filename)
        .ok_or_else(|| ParseError::UnknownArchive(filename.to_owned()))?;
    let caps = shape
        .matcher()
        .captures(filename)
        .ok_or_else(|| shape.mismatch(filename))?;

    let raw_version = &caps["version"];
    let version = if raw_version.eq_ignore_ascii_case(LATEST) {
        if !allow_latest {
            return Err(ParseError::LatestNotAllowed(filename.to_owned()));
        }
        None
    } else {
        Some(Version::parse(raw_version)?)
    };

    Ok(PackageRef {
        name: PackageName::normalize(&caps["name"]),
        version,
        variant: caps["variant"].to_ascii_lowercase(),
    })
}

/// Validate and normalize a bare package name, as used by listing requests.
pub fn parse_package_name(raw: &str) -> Result<PackageName, ParseError> {
    static NAME_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = NAME_RE.get_or_init(|| {
        regex::Regex::new(r"(?i-u)^[a-z0-9][a-z0-9._-]*$").expect("package name regex should compile")
    });

    if !re.is_match(raw) {
        return Err(ParseError::InvalidPackageName(raw.to_owned()));
    }
    Ok(PackageName::normalize(raw))
}
