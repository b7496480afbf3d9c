//! HTTP front end of the parcel index.
//!
//! [`handle`] turns one `hyper` request into one response: Basic auth against
//! the configured accounts, then `GET` for downloads and listings and `POST`
//! for uploads, all delegated to an [`ArtifactGateway`]. [`serve`] runs it on a
//! TCP listener until a shutdown signal resolves.

use std::convert::Infallible;
use std::future::Future;
use std::net::TcpListener;
use std::sync::Arc;

use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use parcel_config::{AuthConfig, ParcelConfig, StorageBackend, StorageConfig};
use parcel_index::ArtifactGateway;
use parcel_storage::{FsStore, MemoryStore, ObjectStore, StorageError};

mod auth;
mod handler;

pub use auth::{authenticate, AuthFailure};
pub use handler::{handle, HEADER_PACKAGE_NAME, HEADER_PACKAGE_VARIANT, HEADER_PACKAGE_VERSION};

/// Everything a request needs, shared by all connections.
pub struct AppState {
    pub gateway: ArtifactGateway,
    pub auth: AuthConfig,
    pub realm: String,
    pub max_upload_bytes: u64,
}

impl AppState {
    pub fn new(gateway: ArtifactGateway, config: &ParcelConfig) -> Self {
        Self {
            gateway,
            auth: config.auth.clone(),
            realm: config.realm.clone(),
            max_upload_bytes: config.limits.max_upload_bytes,
        }
    }

    /// Open the configured store and wrap it in a gateway.
    pub fn from_config(config: &ParcelConfig) -> Result<Self, StorageError> {
        let store = open_store(&config.storage)?;
        Ok(Self::new(ArtifactGateway::new(store), config))
    }
}

pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    match config.backend {
        StorageBackend::Fs => Ok(Arc::new(FsStore::open(&config.root)?)),
        StorageBackend::Memory => {
            tracing::warn!(
                target: "parcel.server",
                "using the in-memory store; uploads are lost on shutdown"
            );
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Serve `state` on `listener` until `shutdown` resolves, then finish the
/// in-flight requests and return.
///
/// `listener` must already be in non-blocking mode.
pub async fn serve(
    state: Arc<AppState>,
    listener: TcpListener,
    shutdown: impl Future<Output = ()>,
) -> hyper::Result<()> {
    let make_svc = make_service_fn(move |_conn| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |request| {
                let state = state.clone();
                async move { Ok::<_, Infallible>(handle(state, request).await) }
            }))
        }
    });

    Server::from_tcp(listener)?
        .serve(make_svc)
        .with_graceful_shutdown(shutdown)
        .await
}
