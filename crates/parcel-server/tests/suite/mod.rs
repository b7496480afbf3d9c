mod packages;
mod routing;
mod smoke;

use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use hyper::header::{HeaderMap, AUTHORIZATION};
use hyper::{Body, Method, Request, StatusCode};
use parcel_config::{Credentials, ParcelConfig, StorageBackend};
use parcel_index::ArtifactGateway;
use parcel_server::{handle, AppState};
use parcel_storage::{MemoryStore, ObjectStore};

pub(crate) const READER: (&str, &str) = ("reader", "read-secret");
pub(crate) const PUBLISHER: (&str, &str) = ("publisher", "write-secret");
pub(crate) const MAX_UPLOAD_BYTES: u64 = 1024;

pub(crate) fn config() -> ParcelConfig {
    let mut config = ParcelConfig::default();
    config.realm = "Test realm".to_owned();
    config.storage.backend = StorageBackend::Memory;
    config.auth.download = Credentials {
        user: READER.0.to_owned(),
        password: READER.1.to_owned(),
    };
    config.auth.upload = Credentials {
        user: PUBLISHER.0.to_owned(),
        password: PUBLISHER.1.to_owned(),
    };
    config.limits.max_upload_bytes = MAX_UPLOAD_BYTES;
    config
}

pub(crate) fn state_with_store(store: Arc<dyn ObjectStore>) -> Arc<AppState> {
    Arc::new(AppState::new(ArtifactGateway::new(store), &config()))
}

pub(crate) fn state() -> Arc<AppState> {
    state_with_store(Arc::new(MemoryStore::new()))
}

pub(crate) fn basic((user, password): (&str, &str)) -> String {
    format!(
        "Basic {}",
        general_purpose::STANDARD.encode(format!("{user}:{password}"))
    )
}

pub(crate) fn request(
    method: Method,
    uri: &str,
    credentials: Option<(&str, &str)>,
    body: impl Into<Body>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(credentials) = credentials {
        builder = builder.header(AUTHORIZATION, basic(credentials));
    }
    builder.body(body.into()).expect("valid test request")
}

pub(crate) struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

pub(crate) async fn send(state: &Arc<AppState>, request: Request<Body>) -> Reply {
    let response = handle(state.clone(), request).await;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = hyper::body::to_bytes(response.into_body())
        .await
        .expect("read response body");
    Reply {
        status,
        headers,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    }
}

pub(crate) async fn upload(state: &Arc<AppState>, filename: &str, body: &'static [u8]) {
    let reply = send(
        state,
        request(Method::POST, &format!("/{filename}"), Some(PUBLISHER), body),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
}
