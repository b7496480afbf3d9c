use base64::{engine::general_purpose, Engine as _};
use hyper::header::{HeaderMap, AUTHORIZATION};
use parcel_config::AuthConfig;
use parcel_index::Entitlement;

/// Why a request was refused before it reached the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthFailure {
    /// No `Authorization` header, or not a decodable `Basic` one.
    MissingOrMalformed,
    WrongDownloadPassword,
    WrongUploadPassword,
    UnknownUser,
}

impl AuthFailure {
    pub fn message(self) -> &'static str {
        match self {
            AuthFailure::MissingOrMalformed => "invalid \"Authorization\" header",
            AuthFailure::WrongDownloadPassword => "password for downloading wrong",
            AuthFailure::WrongUploadPassword => "password for uploading wrong",
            AuthFailure::UnknownUser => "username wrong",
        }
    }
}

/// Decode `Authorization: Basic <base64(user:password)>`.
pub(crate) fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_owned(), password.to_owned()))
}

/// Map the request's credentials onto the configured accounts.
pub fn authenticate(auth: &AuthConfig, headers: &HeaderMap) -> Result<Entitlement, AuthFailure> {
    let (user, password) = basic_credentials(headers).ok_or(AuthFailure::MissingOrMalformed)?;

    if user == auth.download.user {
        if password == auth.download.password {
            Ok(Entitlement::download_only())
        } else {
            Err(AuthFailure::WrongDownloadPassword)
        }
    } else if user == auth.upload.user {
        if password == auth.upload.password {
            Ok(Entitlement::full())
        } else {
            Err(AuthFailure::WrongUploadPassword)
        }
    } else {
        Err(AuthFailure::UnknownUser)
    }
}
