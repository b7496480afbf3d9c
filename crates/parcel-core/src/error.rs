/// Errors produced while parsing filenames, package names and versions.
///
/// Every variant carries the offending input so callers can surface it
/// verbatim; none of them mention the storage key layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid filename \"{0}\", should be a valid .whl or .tar.gz filename")]
    UnknownArchive(String),

    #[error("invalid tarball filename \"{0}\", expected <name>-<version>.tar.gz")]
    InvalidTarball(String),

    #[error(
        "invalid wheel filename \"{0}\", expected <name>-<version>-<python>-<abi>-<platform>.whl"
    )]
    InvalidWheel(String),

    #[error("\"latest\" is not a valid version for \"{0}\"")]
    LatestNotAllowed(String),

    #[error("invalid package name \"{0}\"")]
    InvalidPackageName(String),

    #[error("invalid version \"{0}\"")]
    InvalidVersion(String),
}

impl ParseError {
    /// `true` for errors about the version segment itself rather than the
    /// overall filename shape.
    pub fn is_invalid_version(&self) -> bool {
        matches!(self, ParseError::InvalidVersion(_))
    }
}
