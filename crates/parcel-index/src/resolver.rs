use parcel_core::{package_prefix, ArtifactId, PackageName, Version};
use parcel_storage::ObjectStore;
use serde::Serialize;

use crate::error::GatewayError;

/// One stored artifact of a package, as reported by listings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VersionEntry {
    pub filename: String,
    pub version: String,
    pub variant: String,
}

impl From<&ArtifactId> for VersionEntry {
    fn from(id: &ArtifactId) -> Self {
        VersionEntry {
            filename: id.canonical_filename(),
            version: id.version.canonical(),
            variant: id.variant.clone(),
        }
    }
}

/// Answers "which versions of a package are stored" from object metadata.
///
/// Every query is a single prefix listing of the package namespace, so its
/// cost grows with the number of stored artifacts of that package.
pub struct VersionResolver<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> VersionResolver<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// All stored artifacts of `name`, newest first.
    ///
    /// Ordering is by [`Version::magnitude`] only; artifacts with equal
    /// magnitude (the same version in several variants, or colliding
    /// encodings) come out in no particular order.
    pub async fn artifacts(&self, name: &PackageName) -> Result<Vec<ArtifactId>, GatewayError> {
        let listed = self.store.list(&package_prefix(name)).await?;

        let mut artifacts = Vec::with_capacity(listed.len());
        for object in listed {
            match Version::parse(&object.metadata.version) {
                Ok(version) => artifacts.push(ArtifactId {
                    name: name.clone(),
                    version,
                    variant: object.metadata.variant,
                }),
                Err(err) => {
                    tracing::warn!(
                        target: "parcel.index",
                        key = %object.key,
                        error = %err,
                        "skipping stored artifact with unreadable version metadata"
                    );
                }
            }
        }

        artifacts.sort_unstable_by(|a, b| b.version.compare(&a.version));
        Ok(artifacts)
    }

    pub async fn list_versions(
        &self,
        name: &PackageName,
    ) -> Result<Vec<VersionEntry>, GatewayError> {
        let artifacts = self.artifacts(name).await?;
        Ok(artifacts.iter().map(VersionEntry::from).collect())
    }

    /// Newest stored version of `name` in the given variant.
    pub async fn resolve_latest(
        &self,
        name: &PackageName,
        variant: &str,
    ) -> Result<Version, GatewayError> {
        self.artifacts(name)
            .await?
            .into_iter()
            .find(|artifact| artifact.variant == variant)
            .map(|artifact| artifact.version)
            .ok_or_else(|| GatewayError::NoMatchingVersion {
                package: name.to_string(),
                variant: variant.to_owned(),
            })
    }
}
