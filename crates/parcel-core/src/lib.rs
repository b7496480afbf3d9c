//! Package identity and versioning for the parcel index.
//!
//! Everything the index knows about an archive is derived from its filename:
//! - [`parse_filename`] splits `<name>-<version><variant>` into a [`PackageRef`]
//!   (tarball and wheel shapes, optional `latest` sentinel)
//! - [`Version`] parses version strings, renders their canonical form and
//!   orders them by magnitude
//! - [`ArtifactId`] is a reference with a resolved version; it derives the
//!   storage key (`name:version:variant`) and the canonical display filename
//!
//! ## Storage layout
//! One object per `(name, version, variant)`:
//! - key: [`ArtifactKey`], `name:version:variant`
//! - namespace for a package: [`package_prefix`], `name:`
//!
//! `:` never appears inside a normalized field, so keys are collision-free and
//! the prefix of `foo` never matches the keys of `foo_bar`.

mod error;
mod key;
mod package;
mod version;

pub use error::ParseError;
pub use key::{package_prefix, ArtifactId, ArtifactKey, KEY_DELIMITER};
pub use package::{parse_filename, parse_package_name, PackageName, PackageRef, LATEST};
pub use version::{PreRelease, Version};

pub type Result<T> = std::result::Result<T, ParseError>;
