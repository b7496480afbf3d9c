//! Key-value object storage used by the parcel index.
//!
//! The index only needs four operations, captured by [`ObjectStore`]:
//! point `get`, point `put`, conditional `put_if_absent` and prefix `list`.
//! Every object carries a small [`ObjectMetadata`] record next to its opaque
//! body; listings return the metadata without touching bodies.
//!
//! Backends:
//! - [`MemoryStore`]: process-local map, used by tests and ephemeral servers
//! - [`FsStore`]: one file per object under a root directory
//!
//! ## On-disk layout ([`FsStore`])
//! - `<root>/objects/<hex(sha256(key))>.obj`
//!   - first line: the key and its [`ObjectMetadata`] as compact JSON
//!   - remainder: the object body, byte for byte
//! - `<root>/objects/.<name>.tmp.<pid>.<counter>`: in-flight writes
//!
//! File names are a fixed-length digest, so keys of any length (including
//! `:`) map to valid file names. Prefix listing reads the key back from the
//! header line.

mod error;
mod fs_store;
mod memory;
mod util;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub use error::StorageError;
pub use fs_store::FsStore;
pub use memory::MemoryStore;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Small metadata record stored alongside every object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub version: String,
    pub variant: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Bytes,
    pub metadata: ObjectMetadata,
}

/// One row of a prefix listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListedObject {
    pub key: String,
    pub metadata: ObjectMetadata,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    AlreadyExists,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<StoredObject>>;

    /// Store `body` under `key`, replacing any existing object.
    async fn put(&self, key: &str, body: Bytes, metadata: ObjectMetadata) -> Result<()>;

    /// All objects whose key starts with `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> Result<Vec<ListedObject>>;

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Store `body` under `key` unless an object already exists there.
    ///
    /// The default implementation is a check-then-act sequence and is NOT
    /// atomic: two concurrent callers can both observe the key as absent and
    /// the later `put` wins. Backends that can claim a key atomically override
    /// this.
    async fn put_if_absent(
        &self,
        key: &str,
        body: Bytes,
        metadata: ObjectMetadata,
    ) -> Result<PutOutcome> {
        if self.contains(key).await? {
            return Ok(PutOutcome::AlreadyExists);
        }
        self.put(key, body, metadata).await?;
        Ok(PutOutcome::Stored)
    }
}
