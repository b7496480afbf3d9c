use std::sync::Arc;

use bytes::Bytes;
use parcel_core::{
    parse_filename, parse_package_name, ArtifactId, PackageName, ParseError, Version,
};
use parcel_storage::{ObjectMetadata, ObjectStore, PutOutcome};

use crate::error::{GatewayError, Operation};
use crate::resolver::{VersionEntry, VersionResolver};

/// Permission bits granted by the authentication layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Entitlement {
    pub may_download: bool,
    pub may_upload: bool,
}

impl Entitlement {
    pub fn download_only() -> Self {
        Self {
            may_download: true,
            may_upload: false,
        }
    }

    pub fn full() -> Self {
        Self {
            may_download: true,
            may_upload: true,
        }
    }

    /// `Forbidden` unless these credentials may perform `operation`.
    pub fn require(self, operation: Operation) -> Result<(), GatewayError> {
        let allowed = match operation {
            Operation::Download => self.may_download,
            Operation::Upload => self.may_upload,
        };
        if allowed {
            Ok(())
        } else {
            Err(GatewayError::Forbidden { operation })
        }
    }
}

/// A download as addressed by the transport layer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Request path without the leading `/`: a filename, or a bare package
    /// name when `list` is set.
    pub path: String,
    /// Return the version listing instead of an artifact.
    pub list: bool,
    /// Explicit version that takes precedence over the one in the filename.
    pub version: Option<String>,
}

impl DownloadRequest {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn listing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            list: true,
            version: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadOutcome {
    Listing {
        package: PackageName,
        versions: Vec<VersionEntry>,
    },
    Artifact {
        id: ArtifactId,
        body: Bytes,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadOutcome {
    pub id: ArtifactId,
    pub filename: String,
}

/// Upload and download orchestration on top of an [`ObjectStore`].
///
/// Holds no per-request state; clones share the same store.
#[derive(Clone)]
pub struct ArtifactGateway {
    store: Arc<dyn ObjectStore>,
}

impl ArtifactGateway {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn resolver(&self) -> VersionResolver<'_> {
        VersionResolver::new(self.store.as_ref())
    }

    pub async fn download(
        &self,
        entitlement: Entitlement,
        request: &DownloadRequest,
    ) -> Result<DownloadOutcome, GatewayError> {
        entitlement.require(Operation::Download)?;

        if request.list {
            let package = listing_package(&request.path)?;
            let versions = self.resolver().list_versions(&package).await?;
            return Ok(DownloadOutcome::Listing { package, versions });
        }

        let mut reference = parse_filename(&request.path, true)?;
        if let Some(raw) = request.version.as_deref() {
            reference.version = Some(Version::parse(raw)?);
        }

        let id = match reference.version.clone() {
            Some(version) => reference.resolve(version),
            None => {
                let version = self
                    .resolver()
                    .resolve_latest(&reference.name, &reference.variant)
                    .await?;
                tracing::debug!(
                    target: "parcel.index",
                    package = %reference.name,
                    variant = %reference.variant,
                    version = %version,
                    "resolved latest version"
                );
                reference.resolve(version)
            }
        };

        // A resolved version can still be missing here if the object vanished
        // between the listing and this read; that is an ordinary not-found.
        match self.store.get(id.storage_key().as_str()).await? {
            Some(object) => Ok(DownloadOutcome::Artifact {
                id,
                body: object.body,
            }),
            None => Err(GatewayError::ArtifactNotFound {
                filename: id.canonical_filename(),
            }),
        }
    }

    pub async fn upload(
        &self,
        entitlement: Entitlement,
        filename: &str,
        body: Bytes,
    ) -> Result<UploadOutcome, GatewayError> {
        entitlement.require(Operation::Upload)?;

        let id = parse_filename(filename, false)?
            .into_artifact()
            .ok_or_else(|| {
                GatewayError::InvalidFilename(ParseError::LatestNotAllowed(filename.to_owned()))
            })?;
        let metadata = ObjectMetadata {
            version: id.version.canonical(),
            variant: id.variant.clone(),
        };
        let size = body.len();

        match self
            .store
            .put_if_absent(id.storage_key().as_str(), body, metadata)
            .await?
        {
            PutOutcome::Stored => {
                let filename = id.canonical_filename();
                tracing::info!(
                    target: "parcel.index",
                    filename = %filename,
                    size,
                    "stored package"
                );
                Ok(UploadOutcome { id, filename })
            }
            PutOutcome::AlreadyExists => Err(GatewayError::Conflict {
                filename: id.canonical_filename(),
            }),
        }
    }
}

/// Package addressed by a listing request: either a full filename or a bare
/// package name. A path with an archive suffix must be a valid filename.
fn listing_package(path: &str) -> Result<PackageName, GatewayError> {
    match parse_filename(path, true) {
        Ok(reference) => Ok(reference.name),
        Err(ParseError::UnknownArchive(_)) => {
            parse_package_name(path).map_err(GatewayError::InvalidFilename)
        }
        Err(err) => Err(err.into()),
    }
}
