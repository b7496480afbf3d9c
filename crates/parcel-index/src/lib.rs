//! Version resolution and upload/download orchestration for the parcel index.
//!
//! [`ArtifactGateway`] is the single entry point used by the HTTP layer:
//! - downloads parse the requested filename (accepting the `latest`
//!   sentinel), resolve the newest stored version when needed and fetch the
//!   artifact, or return the package listing when asked to
//! - uploads parse the filename (no `latest`), derive the storage key and
//!   store the body only if that key is still free
//!
//! Authentication happens elsewhere; the gateway only receives the resulting
//! [`Entitlement`] and refuses an operation whose bit is not set before it
//! looks at the request at all.

mod error;
mod gateway;
mod resolver;

pub use error::{ErrorKind, GatewayError, Operation};
pub use gateway::{
    ArtifactGateway, DownloadOutcome, DownloadRequest, Entitlement, UploadOutcome,
};
pub use resolver::{VersionEntry, VersionResolver};
