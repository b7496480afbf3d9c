use std::path::PathBuf;

use parcel_config::{ConfigError, Credentials, ParcelConfig, StorageBackend};

fn valid() -> ParcelConfig {
    let mut config = ParcelConfig::default();
    config.auth.download = Credentials {
        user: "reader".to_owned(),
        password: "r".to_owned(),
    };
    config.auth.upload = Credentials {
        user: "publisher".to_owned(),
        password: "w".to_owned(),
    };
    config
}

fn invalid_message(config: &ParcelConfig) -> String {
    match config.validate() {
        Err(ConfigError::Invalid(message)) => message,
        other => panic!("expected an invalid config, got {other:?}"),
    }
}

#[test]
fn complete_credentials_validate() {
    valid().validate().unwrap();
}

#[test]
fn credentials_are_required() {
    let mut config = valid();
    config.auth.download.user.clear();
    assert_eq!(
        invalid_message(&config),
        "auth.download.user must not be empty"
    );

    let mut config = valid();
    config.auth.upload.password.clear();
    assert_eq!(
        invalid_message(&config),
        "auth.upload.password must not be empty"
    );

    assert_eq!(
        invalid_message(&ParcelConfig::default()),
        "auth.download.user must not be empty"
    );
}

#[test]
fn user_names_must_differ() {
    let mut config = valid();
    config.auth.upload.user = "reader".to_owned();
    assert_eq!(
        invalid_message(&config),
        "auth.download.user and auth.upload.user must differ"
    );
}

#[test]
fn fs_backend_needs_a_root() {
    let mut config = valid();
    config.storage.root = PathBuf::new();
    assert_eq!(
        invalid_message(&config),
        "storage.root is required for the fs backend"
    );

    config.storage.backend = StorageBackend::Memory;
    config.validate().unwrap();
}

#[test]
fn zero_upload_limit_is_rejected() {
    let mut config = valid();
    config.limits.max_upload_bytes = 0;
    assert!(invalid_message(&config).contains("max_upload_bytes"));
}

#[test]
fn debug_output_never_contains_passwords() {
    let debug = format!("{:?}", valid());
    assert!(debug.contains("publisher"), "{debug}");
    assert!(!debug.contains("password: \"w\""), "{debug}");
    assert!(!debug.contains("password: \"r\""), "{debug}");
}
