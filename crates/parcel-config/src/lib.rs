//! Runtime configuration for the parcel server.
//!
//! Configuration is read from a TOML file (`parcel.toml`), then selected keys
//! can be overridden from `PARCEL_*` environment variables, and finally the
//! result is validated. Every section is optional except the two credential
//! pairs.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod logging;

pub use logging::{init_tracing, LoggingConfig};

pub const ENV_LISTEN: &str = "PARCEL_LISTEN";
pub const ENV_DOWNLOAD_USER: &str = "PARCEL_DOWNLOAD_USER";
pub const ENV_DOWNLOAD_PASSWORD: &str = "PARCEL_DOWNLOAD_PASSWORD";
pub const ENV_UPLOAD_USER: &str = "PARCEL_UPLOAD_USER";
pub const ENV_UPLOAD_PASSWORD: &str = "PARCEL_UPLOAD_PASSWORD";
pub const ENV_STORAGE_ROOT: &str = "PARCEL_STORAGE_ROOT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParcelConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "ParcelConfig::default_listen")]
    pub listen: SocketAddr,

    /// Realm advertised in `WWW-Authenticate` challenges.
    #[serde(default = "ParcelConfig::default_realm")]
    pub realm: String,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ParcelConfig {
    fn default_listen() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 8080))
    }

    fn default_realm() -> String {
        "Access to the parcel index".to_owned()
    }
}

impl Default for ParcelConfig {
    fn default() -> Self {
        Self {
            listen: Self::default_listen(),
            realm: Self::default_realm(),
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
            limits: LimitsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Fs,
    Memory,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Fs => f.write_str("fs"),
            StorageBackend::Memory => f.write_str("memory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "StorageConfig::default_backend")]
    pub backend: StorageBackend,

    /// Data directory of the `fs` backend. Ignored by `memory`.
    #[serde(default = "StorageConfig::default_root")]
    pub root: PathBuf,
}

impl StorageConfig {
    fn default_backend() -> StorageBackend {
        StorageBackend::Fs
    }

    fn default_root() -> PathBuf {
        PathBuf::from("parcel-data")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Self::default_backend(),
            root: Self::default_root(),
        }
    }
}

/// One user/password pair.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_empty() {
            ""
        } else {
            "<redacted>"
        };
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &password)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Account allowed to download and list.
    #[serde(default)]
    pub download: Credentials,

    /// Account allowed to download, list and upload.
    #[serde(default)]
    pub upload: Credentials,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Largest accepted upload body, in bytes.
    #[serde(default = "LimitsConfig::default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl LimitsConfig {
    fn default_max_upload_bytes() -> u64 {
        100 * 1024 * 1024
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: Self::default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The `Display` form of a toml error quotes the offending source line,
        // which may be a password. Keep only the message, with values redacted.
        ConfigError::Toml(sanitize_toml_error_message(err.message()))
    }
}

/// Redact user-provided values from a toml/serde error message.
///
/// Quoted strings are always redacted. Backticked segments are redacted when
/// they hold user input (`unknown field`, `unknown variant`, the value of an
/// `invalid type`/`invalid value`) and kept when they name schema fields.
fn sanitize_toml_error_message(message: &str) -> String {
    static DOUBLE_QUOTED_RE: OnceLock<regex::Regex> = OnceLock::new();
    static SINGLE_QUOTED_RE: OnceLock<regex::Regex> = OnceLock::new();

    let double = DOUBLE_QUOTED_RE.get_or_init(|| {
        regex::Regex::new(r#""(?:\\.|[^"\\])*""#).expect("quoted-string regex should compile")
    });
    let single = SINGLE_QUOTED_RE.get_or_init(|| {
        regex::Regex::new(r"'(?:\\.|[^'\\])*'").expect("single-quoted-string regex should compile")
    });

    let out = double.replace_all(message, r#""<redacted>""#);
    let mut out = single.replace_all(&out, "'<redacted>'").into_owned();

    let user_value_start = ["unknown field `", "unknown variant `"]
        .iter()
        .filter_map(|marker| out.find(marker).map(|pos| pos + marker.len()))
        .min()
        .or_else(|| {
            if !(out.contains("invalid type:") || out.contains("invalid value:")) {
                return None;
            }
            let boundary = out.find(", expected").unwrap_or(out.len());
            out[..boundary].find('`').map(|pos| pos + 1)
        });

    if let Some(start) = user_value_start {
        if let Some(len) = out[start..].find('`') {
            out.replace_range(start..start + len, "<redacted>");
        }
    }

    out
}

impl ParcelConfig {
    /// Parse a TOML document. No environment overrides, no validation.
    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a config file. No environment overrides, no validation.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    /// Effective configuration: the file at `path` (or the defaults when there
    /// is none), then `PARCEL_*` environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (environment-shaped keys).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(listen) = lookup(ENV_LISTEN) {
            self.listen = listen.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{ENV_LISTEN} is not a socket address"))
            })?;
        }
        if let Some(user) = lookup(ENV_DOWNLOAD_USER) {
            self.auth.download.user = user;
        }
        if let Some(password) = lookup(ENV_DOWNLOAD_PASSWORD) {
            self.auth.download.password = password;
        }
        if let Some(user) = lookup(ENV_UPLOAD_USER) {
            self.auth.upload.user = user;
        }
        if let Some(password) = lookup(ENV_UPLOAD_PASSWORD) {
            self.auth.upload.password = password;
        }
        if let Some(root) = lookup(ENV_STORAGE_ROOT) {
            self.storage.root = PathBuf::from(root);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (section, credentials) in [
            ("auth.download", &self.auth.download),
            ("auth.upload", &self.auth.upload),
        ] {
            if credentials.user.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{section}.user must not be empty"
                )));
            }
            if credentials.password.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{section}.password must not be empty"
                )));
            }
        }
        if self.auth.download.user == self.auth.upload.user {
            return Err(ConfigError::Invalid(
                "auth.download.user and auth.upload.user must differ".to_owned(),
            ));
        }
        if self.storage.backend == StorageBackend::Fs && self.storage.root.as_os_str().is_empty()
        {
            return Err(ConfigError::Invalid(
                "storage.root is required for the fs backend".to_owned(),
            ));
        }
        if self.limits.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_upload_bytes must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}
