
use std::sync::Arc;

use bytes::Bytes;
use parcel_index::{ArtifactGateway, Entitlement};
use parcel_storage::MemoryStore;

pub(crate) fn memory_gateway() -> (Arc<MemoryStore>, ArtifactGateway) {
    let store = Arc::new(MemoryStore::new());
    let gateway = ArtifactGateway::new(store.clone());
    (store, gateway)
}

pub(crate) async fn upload(gateway: &ArtifactGateway, filename: &str, body: &'static [u8]) {
    gateway
        .upload(Entitlement::full(), filename, Bytes::from_static(body))
        .await
        .unwrap_or_else(|err| panic!("upload of {filename} failed: {err}"));
}
