use hyper::header::{ALLOW, CONTENT_TYPE, WWW_AUTHENTICATE};
use hyper::{Method, StatusCode};

use super::{request, send, state, PUBLISHER, READER};

#[tokio::test]
async fn landing_page_needs_no_credentials() {
    let state = state();
    let reply = send(&state, request(Method::GET, "/", None, "")).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.headers[CONTENT_TYPE], "text/html; charset=utf-8");
    assert!(reply.body.contains("<h1>parcel</h1>"), "{}", reply.body);
}

#[tokio::test]
async fn landing_page_only_answers_get() {
    let state = state();
    let reply = send(&state, request(Method::POST, "/", Some(PUBLISHER), "x")).await;

    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(reply.headers[ALLOW], "GET");
    assert_eq!(reply.body, "405: wrong method, expected GET\n");
}

#[tokio::test]
async fn missing_credentials_get_a_challenge() {
    let state = state();
    let reply = send(
        &state,
        request(Method::GET, "/mypkg-latest.tar.gz", None, ""),
    )
    .await;

    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.headers[WWW_AUTHENTICATE], "Basic realm=\"Test realm\"");
    assert_eq!(reply.body, "401: invalid \"Authorization\" header\n");
}

#[tokio::test]
async fn malformed_authorization_is_unauthorized() {
    let state = state();
    let request = hyper::Request::builder()
        .uri("/mypkg-latest.tar.gz")
        .header("authorization", "Basic not*base64")
        .body(hyper::Body::empty())
        .unwrap();
    let reply = send(&state, request).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_credentials_are_forbidden() {
    let state = state();
    let cases = [
        ((READER.0, "nope"), "403: password for downloading wrong\n"),
        ((PUBLISHER.0, "nope"), "403: password for uploading wrong\n"),
        (("stranger", READER.1), "403: username wrong\n"),
    ];

    for (credentials, expected) in cases {
        let reply = send(
            &state,
            request(Method::GET, "/mypkg-latest.tar.gz", Some(credentials), ""),
        )
        .await;
        assert_eq!(reply.status, StatusCode::FORBIDDEN);
        assert_eq!(reply.body, expected);
    }
}

#[tokio::test]
async fn credentials_are_checked_before_the_method() {
    let state = state();
    let reply = send(&state, request(Method::PUT, "/mypkg-1.0.tar.gz", None, "")).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unsupported_methods_are_rejected() {
    let state = state();
    for method in [Method::PUT, Method::DELETE, Method::PATCH] {
        let reply = send(
            &state,
            request(method, "/mypkg-1.0.tar.gz", Some(PUBLISHER), ""),
        )
        .await;
        assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(reply.headers[ALLOW], "GET, POST");
        assert_eq!(reply.body, "405: wrong method, expected GET or POST\n");
    }
}
