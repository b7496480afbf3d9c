use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, StatusCode};
use parcel_server::{HEADER_PACKAGE_NAME, HEADER_PACKAGE_VARIANT, HEADER_PACKAGE_VERSION};
use parcel_storage::{ListedObject, ObjectMetadata, ObjectStore, StorageError, StoredObject};

use super::{
    request, send, state, state_with_store, upload, MAX_UPLOAD_BYTES, PUBLISHER, READER,
};

#[tokio::test]
async fn upload_then_download_latest() {
    let state = state();

    let reply = send(
        &state,
        request(
            Method::POST,
            "/MyPkg-v1.2.tar.gz",
            Some(PUBLISHER),
            &b"release bytes"[..],
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(
        reply.body,
        "uploaded package \"mypkg-1.2.0.tar.gz\" successfully!\n"
    );

    let reply = send(
        &state,
        request(Method::GET, "/mypkg-latest.tar.gz", Some(READER), ""),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.headers[HEADER_PACKAGE_NAME], "mypkg");
    assert_eq!(reply.headers[HEADER_PACKAGE_VERSION], "1.2.0");
    assert_eq!(reply.headers[HEADER_PACKAGE_VARIANT], ".tar.gz");
    assert_eq!(reply.body, "release bytes");
}

#[tokio::test]
async fn listing_is_json_newest_first() {
    let state = state();
    upload(&state, "mypkg-1.2.0a1.tar.gz", b"pre").await;
    upload(&state, "mypkg-1.2.0.tar.gz", b"final").await;
    upload(&state, "mypkg-1.1.0-py3-none-any.whl", b"wheel").await;

    let reply = send(
        &state,
        request(Method::GET, "/MyPkg?list=1", Some(READER), ""),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.headers[CONTENT_TYPE], "application/json");
    assert!(reply.body.ends_with('\n'));

    let json: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "package": "mypkg",
            "versions": [
                {"filename": "mypkg-1.2.0.tar.gz", "version": "1.2.0", "variant": ".tar.gz"},
                {"filename": "mypkg-1.2.0a1.tar.gz", "version": "1.2.0a1", "variant": ".tar.gz"},
                {
                    "filename": "mypkg-1.1.0-py3-none-any.whl",
                    "version": "1.1.0",
                    "variant": "-py3-none-any.whl"
                },
            ],
        })
    );
}

#[tokio::test]
async fn listing_accepts_a_filename_and_an_empty_package() {
    let state = state();
    upload(&state, "mypkg-1.0.tar.gz", b"x").await;

    let reply = send(
        &state,
        request(Method::GET, "/mypkg-latest.tar.gz?list=yes", Some(READER), ""),
    )
    .await;
    let json: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(json["versions"].as_array().map(Vec::len), Some(1));

    let reply = send(
        &state,
        request(Method::GET, "/other?list=1", Some(READER), ""),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(json, serde_json::json!({"package": "other", "versions": []}));
}

#[tokio::test]
async fn duplicate_upload_conflicts() {
    let state = state();
    upload(&state, "mypkg-1.2.0.tar.gz", b"first").await;

    let reply = send(
        &state,
        request(Method::POST, "/mypkg-1.2.tar.gz", Some(PUBLISHER), "second"),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.body, "409: file \"mypkg-1.2.0.tar.gz\" already exists\n");

    let reply = send(
        &state,
        request(Method::GET, "/mypkg-1.2.0.tar.gz", Some(READER), ""),
    )
    .await;
    assert_eq!(reply.body, "first");
}

#[tokio::test]
async fn unknown_package_is_not_found() {
    let state = state();
    let reply = send(
        &state,
        request(Method::GET, "/unknownpkg-latest.tar.gz", Some(READER), ""),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(
        reply.body,
        "404: no versions found for package \"unknownpkg-*.tar.gz\"\n"
    );
}

#[tokio::test]
async fn bad_filenames_and_versions_are_bad_requests() {
    let state = state();

    let reply = send(&state, request(Method::GET, "/mypkg.zip", Some(READER), "")).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        reply.body,
        "400: invalid filename \"mypkg.zip\", should be a valid .whl or .tar.gz filename\n"
    );

    let reply = send(
        &state,
        request(Method::GET, "/mypkg-latest.tar.gz?v=x.y", Some(READER), ""),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body, "400: invalid version \"x.y\"\n");

    let reply = send(
        &state,
        request(Method::POST, "/mypkg-latest.tar.gz", Some(PUBLISHER), "x"),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn download_account_cannot_upload() {
    let state = state();
    let reply = send(
        &state,
        request(Method::POST, "/mypkg-1.0.tar.gz", Some(READER), "x"),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(
        reply.body,
        "403: upload is not permitted for these credentials\n"
    );

    let reply = send(
        &state,
        request(Method::GET, "/mypkg?list=1", Some(READER), ""),
    )
    .await;
    assert_eq!(reply.body, "{\n  \"package\": \"mypkg\",\n  \"versions\": []\n}\n");
}

#[tokio::test]
async fn download_account_is_forbidden_before_the_body_is_read() {
    let state = state();
    let body = vec![0u8; MAX_UPLOAD_BYTES as usize + 1];
    let reply = send(
        &state,
        request(Method::POST, "/mypkg-1.0.tar.gz", Some(READER), body),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(
        reply.body,
        "403: upload is not permitted for these credentials\n"
    );
}

#[tokio::test]
async fn oversized_uploads_are_refused() {
    let state = state();
    let body = vec![0u8; MAX_UPLOAD_BYTES as usize + 1];
    let reply = send(
        &state,
        request(Method::POST, "/mypkg-1.0.tar.gz", Some(PUBLISHER), body),
    )
    .await;
    assert_eq!(reply.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        reply.body,
        format!("413: upload exceeds the limit of {MAX_UPLOAD_BYTES} bytes\n")
    );

    let body = vec![7u8; MAX_UPLOAD_BYTES as usize];
    let reply = send(
        &state,
        request(Method::POST, "/mypkg-1.0.tar.gz", Some(PUBLISHER), body),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
}

#[tokio::test]
async fn path_is_trimmed_and_percent_decoded() {
    let state = state();
    upload(&state, "my-pkg-1.0.tar.gz", b"bytes").await;

    for uri in ["/my-pkg-1.0.tar.gz/", "/my%2Dpkg-1.0.tar.gz", "/My_Pkg-latest.tar.gz//"] {
        let reply = send(&state, request(Method::GET, uri, Some(READER), "")).await;
        assert_eq!(reply.status, StatusCode::OK, "{uri}: {}", reply.body);
        assert_eq!(reply.body, "bytes");
    }
}

#[tokio::test]
async fn version_query_overrides_the_filename() {
    let state = state();
    upload(&state, "mypkg-1.0.0.tar.gz", b"old").await;
    upload(&state, "mypkg-2.0.0.tar.gz", b"new").await;

    let reply = send(
        &state,
        request(Method::GET, "/mypkg-latest.tar.gz", Some(READER), ""),
    )
    .await;
    assert_eq!(reply.body, "new");

    for uri in [
        "/mypkg-latest.tar.gz?version=1.0",
        "/mypkg-2.0.0.tar.gz?v=v1.0.0",
    ] {
        let reply = send(&state, request(Method::GET, uri, Some(READER), "")).await;
        assert_eq!(reply.status, StatusCode::OK, "{uri}");
        assert_eq!(reply.body, "old");
        assert_eq!(reply.headers[HEADER_PACKAGE_VERSION], "1.0.0");
    }
}

/// A store whose every operation fails.
struct BrokenStore;

fn broken() -> StorageError {
    StorageError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        "disk unavailable",
    ))
}

#[async_trait]
impl ObjectStore for BrokenStore {
    async fn get(&self, _key: &str) -> parcel_storage::Result<Option<StoredObject>> {
        Err(broken())
    }

    async fn put(
        &self,
        _key: &str,
        _body: Bytes,
        _metadata: ObjectMetadata,
    ) -> parcel_storage::Result<()> {
        Err(broken())
    }

    async fn list(&self, _prefix: &str) -> parcel_storage::Result<Vec<ListedObject>> {
        Err(broken())
    }
}

#[tokio::test]
async fn storage_failures_are_internal_errors() {
    let state = state_with_store(Arc::new(BrokenStore));

    let reply = send(
        &state,
        request(Method::GET, "/mypkg-latest.tar.gz", Some(READER), ""),
    )
    .await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.body, "500: internal storage error\n");

    let reply = send(
        &state,
        request(Method::POST, "/mypkg-1.0.tar.gz", Some(PUBLISHER), "x"),
    )
    .await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!reply.body.contains("disk unavailable"));
}
