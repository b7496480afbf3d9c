use std::fmt;

use parcel_core::ParseError;
use parcel_storage::StorageError;

/// The operation a request asks for; each needs its own permission bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Download,
    Upload,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Download => "download",
            Operation::Upload => "upload",
        })
    }
}

/// Coarse classification of a [`GatewayError`], used by the transport layer
/// to pick a status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidFilename,
    InvalidVersion,
    NotFound,
    Conflict,
    Forbidden,
    Storage,
}

/// Errors produced by the resolver and the gateway.
///
/// Everything except [`GatewayError::Storage`] describes the request itself
/// and is not worth retrying.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidFilename(#[source] ParseError),

    #[error("{0}")]
    InvalidVersion(#[source] ParseError),

    #[error("no versions found for package \"{package}-*{variant}\"")]
    NoMatchingVersion { package: String, variant: String },

    #[error("file {filename} not found")]
    ArtifactNotFound { filename: String },

    #[error("file \"{filename}\" already exists")]
    Conflict { filename: String },

    #[error("{operation} is not permitted for these credentials")]
    Forbidden { operation: Operation },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::InvalidFilename(_) => ErrorKind::InvalidFilename,
            GatewayError::InvalidVersion(_) => ErrorKind::InvalidVersion,
            GatewayError::NoMatchingVersion { .. } | GatewayError::ArtifactNotFound { .. } => {
                ErrorKind::NotFound
            }
            GatewayError::Conflict { .. } => ErrorKind::Conflict,
            GatewayError::Forbidden { .. } => ErrorKind::Forbidden,
            GatewayError::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<ParseError> for GatewayError {
    fn from(err: ParseError) -> Self {
        if err.is_invalid_version() {
            GatewayError::InvalidVersion(err)
        } else {
            GatewayError::InvalidFilename(err)
        }
    }
}
