use std::sync::Arc;

use bytes::Bytes;
use hyper::body::HttpBody as _;
use hyper::header::{HeaderValue, ALLOW, CONTENT_LENGTH, CONTENT_TYPE, WWW_AUTHENTICATE};
use hyper::{Body, Method, Request, Response, StatusCode};
use parcel_index::{
    DownloadOutcome, DownloadRequest, ErrorKind, GatewayError, Operation, VersionEntry,
};
use percent_encoding::percent_decode_str;
use serde::Serialize;

use crate::auth::{authenticate, AuthFailure};
use crate::AppState;

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head><title>parcel</title></head>
<body>
<h1>parcel</h1>
<p>Private Python package index.</p>
<p>
  Download with <code>GET /&lt;filename&gt;</code> (use <code>latest</code> as the
  version to get the newest release), list versions with
  <code>GET /&lt;package&gt;?list=1</code> and upload with
  <code>POST /&lt;filename&gt;</code>.
</p>
</body>
</html>
"#;

pub const HEADER_PACKAGE_NAME: &str = "package-name";
pub const HEADER_PACKAGE_VERSION: &str = "package-version";
pub const HEADER_PACKAGE_VARIANT: &str = "package-variant";

/// Serve one request. Never fails; every error becomes a response.
pub async fn handle(state: Arc<AppState>, request: Request<Body>) -> Response<Body> {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let response = route(&state, request).await;

    tracing::info!(
        target: "parcel.server",
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        "handled request"
    );
    response
}

async fn route(state: &AppState, request: Request<Body>) -> Response<Body> {
    if request.uri().path() == "/" {
        if *request.method() != Method::GET {
            return wrong_method("GET");
        }
        return respond(
            Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, "text/html; charset=utf-8"),
            Body::from(INDEX_HTML),
        );
    }

    let entitlement = match authenticate(&state.auth, request.headers()) {
        Ok(entitlement) => entitlement,
        Err(failure) => return refuse(state, failure),
    };

    let filename = match request_filename(request.uri().path()) {
        Some(filename) => filename,
        None => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "request path is not valid UTF-8 after percent-decoding",
            )
        }
    };

    let method = request.method().clone();
    match method {
        Method::GET => {
            let download = download_request(filename, request.uri().query());
            match state.gateway.download(entitlement, &download).await {
                Ok(outcome) => download_response(outcome),
                Err(err) => gateway_error_response(&err),
            }
        }
        Method::POST => {
            if let Err(err) = entitlement.require(Operation::Upload) {
                return gateway_error_response(&err);
            }
            let body = match read_body(request, state.max_upload_bytes).await {
                Ok(body) => body,
                Err(response) => return response,
            };
            match state.gateway.upload(entitlement, &filename, body).await {
                Ok(outcome) => respond(
                    Response::builder()
                        .status(StatusCode::CREATED)
                        .header(CONTENT_TYPE, "text/plain; charset=utf-8"),
                    Body::from(format!(
                        "uploaded package \"{}\" successfully!\n",
                        outcome.filename
                    )),
                ),
                Err(err) => gateway_error_response(&err),
            }
        }
        _ => wrong_method("GET, POST"),
    }
}

/// Request path without its leading `/` and trailing `/`s, percent-decoded.
pub(crate) fn request_filename(path: &str) -> Option<String> {
    let trimmed = path.strip_prefix('/').unwrap_or(path).trim_end_matches('/');
    percent_decode_str(trimmed)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Build the gateway request from the filename and the query string.
///
/// `list` counts as set when it has a non-empty value; `version` (alias `v`)
/// overrides the version in the filename.
pub(crate) fn download_request(path: String, query: Option<&str>) -> DownloadRequest {
    let mut request = DownloadRequest::file(path);
    let Some(query) = query else {
        return request;
    };

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "list" if !value.is_empty() => request.list = true,
            "version" | "v" if !value.is_empty() && request.version.is_none() => {
                request.version = Some(value.into_owned());
            }
            _ => {}
        }
    }
    request
}

/// Collect the request body, refusing anything above `limit` bytes.
async fn read_body(request: Request<Body>, limit: u64) -> Result<Bytes, Response<Body>> {
    let too_large = || {
        error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            &format!("upload exceeds the limit of {limit} bytes"),
        )
    };

    let declared = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(too_large());
    }

    let mut body = request.into_body();
    let mut collected = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(|err| {
            tracing::debug!(target: "parcel.server", error = %err, "failed to read request body");
            error_response(StatusCode::BAD_REQUEST, "failed to read request body")
        })?;
        if (collected.len() + chunk.len()) as u64 > limit {
            return Err(too_large());
        }
        collected.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(collected))
}

#[derive(Serialize)]
struct ListingBody<'a> {
    package: &'a str,
    versions: &'a [VersionEntry],
}

fn download_response(outcome: DownloadOutcome) -> Response<Body> {
    match outcome {
        DownloadOutcome::Listing { package, versions } => {
            let listing = ListingBody {
                package: package.as_str(),
                versions: &versions,
            };
            match serde_json::to_string_pretty(&listing) {
                Ok(mut json) => {
                    json.push('\n');
                    respond(
                        Response::builder()
                            .status(StatusCode::OK)
                            .header(CONTENT_TYPE, "application/json"),
                        Body::from(json),
                    )
                }
                Err(err) => {
                    tracing::error!(target: "parcel.server", error = %err, "failed to encode listing");
                    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
                }
            }
        }
        DownloadOutcome::Artifact { id, body } => respond(
            Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, "application/octet-stream")
                .header(HEADER_PACKAGE_NAME, id.name.as_str())
                .header(HEADER_PACKAGE_VERSION, id.version.canonical())
                .header(HEADER_PACKAGE_VARIANT, id.variant.as_str()),
            Body::from(body),
        ),
    }
}

fn gateway_error_response(err: &GatewayError) -> Response<Body> {
    let status = match err.kind() {
        ErrorKind::InvalidFilename | ErrorKind::InvalidVersion => StatusCode::BAD_REQUEST,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Storage => {
            tracing::error!(target: "parcel.server", error = %err, "storage failure");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal storage error");
        }
    };
    error_response(status, &err.to_string())
}

fn refuse(state: &AppState, failure: AuthFailure) -> Response<Body> {
    match failure {
        AuthFailure::MissingOrMalformed => {
            let challenge = format!("Basic realm=\"{}\"", state.realm.replace('"', "'"));
            let mut response = error_response(StatusCode::UNAUTHORIZED, failure.message());
            if let Ok(value) = HeaderValue::from_str(&challenge) {
                response.headers_mut().insert(WWW_AUTHENTICATE, value);
            }
            response
        }
        _ => error_response(StatusCode::FORBIDDEN, failure.message()),
    }
}

fn wrong_method(allowed: &'static str) -> Response<Body> {
    let mut response = error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &format!("wrong method, expected {}", allowed.replace(", ", " or ")),
    );
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static(allowed));
    response
}

/// Plain-text error body of the form `<status>: <message>\n`.
fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(format!("{}: {message}\n", status.as_u16())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn respond(builder: hyper::http::response::Builder, body: Body) -> Response<Body> {
    builder.body(body).unwrap_or_else(|err| {
        tracing::error!(target: "parcel.server", error = %err, "failed to build response");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    })
}
