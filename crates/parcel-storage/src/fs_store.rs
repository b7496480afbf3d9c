use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StorageError;
use crate::util::{publish_if_absent, publish_replace, write_tmp_sibling};
use crate::{ListedObject, ObjectMetadata, ObjectStore, PutOutcome, Result, StoredObject};

const OBJECTS_DIR: &str = "objects";
const OBJECT_SUFFIX: &str = ".obj";

/// Upper bound on the JSON header line of an object file.
///
/// Real headers are at most a few hundred bytes; a missing newline in a corrupt file
/// must not make a listing read the whole body.
const HEADER_LIMIT_BYTES: u64 = 16 * 1024;

/// Filesystem-backed store: one file per object.
///
/// Objects are written to a temporary sibling first and then published, so
/// readers never observe a partially written object. `put_if_absent` publishes
/// with a hard link and is atomic across processes sharing the directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    objects_dir: PathBuf,
}

impl FsStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let objects_dir = root.as_ref().join(OBJECTS_DIR);
        fs::create_dir_all(&objects_dir)?;
        Ok(Self { objects_dir })
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    fn object_path(&self, key: &str) -> PathBuf {
        object_path(&self.objects_dir, key)
    }
}

/// First line of every object file.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
struct ObjectHeader {
    key: String,
    #[serde(flatten)]
    metadata: ObjectMetadata,
}

/// Object files are named by the SHA-256 of the key, so the name length is
/// fixed no matter how long the key is.
fn object_path(objects_dir: &Path, key: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    objects_dir.join(format!("{}{OBJECT_SUFFIX}", hex::encode(hasher.finalize())))
}

fn write_object(
    file: &mut fs::File,
    key: &str,
    metadata: &ObjectMetadata,
    body: &[u8],
) -> io::Result<()> {
    let header = ObjectHeader {
        key: key.to_owned(),
        metadata: metadata.clone(),
    };
    let header = serde_json::to_vec(&header).map_err(io::Error::other)?;
    file.write_all(&header)?;
    file.write_all(b"\n")?;
    file.write_all(body)?;
    Ok(())
}

fn corrupt(path: &Path, message: impl Into<String>) -> StorageError {
    StorageError::CorruptObject {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn parse_header(path: &Path, line: &[u8]) -> Result<ObjectHeader> {
    serde_json::from_slice(line).map_err(|err| corrupt(path, err.to_string()))
}

fn read_object(path: &Path, key: &str) -> Result<Option<StoredObject>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let split = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| corrupt(path, "missing header terminator"))?;
    let header = parse_header(path, &bytes[..split])?;
    if header.key != key {
        return Err(corrupt(path, format!("header names key {:?}", header.key)));
    }
    let body = Bytes::from(bytes).slice(split + 1..);
    Ok(Some(StoredObject {
        body,
        metadata: header.metadata,
    }))
}

fn read_header(path: &Path) -> Result<Option<ObjectHeader>> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let mut line = Vec::new();
    BufReader::new(file)
        .take(HEADER_LIMIT_BYTES)
        .read_until(b'\n', &mut line)?;
    if line.pop() != Some(b'\n') {
        return Err(corrupt(path, "missing header terminator"));
    }
    parse_header(path, &line).map(Some)
}

fn list_objects(objects_dir: &Path, prefix: &str) -> Result<Vec<ListedObject>> {
    let entries = match fs::read_dir(objects_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut listed = Vec::new();
    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if file_name.starts_with('.') || !file_name.ends_with(OBJECT_SUFFIX) {
            continue;
        }

        match read_header(&entry.path()) {
            Ok(Some(header)) if header.key.starts_with(prefix) => listed.push(ListedObject {
                key: header.key,
                metadata: header.metadata,
            }),
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(
                    target: "parcel.storage",
                    path = %entry.path().display(),
                    error = %err,
                    "skipping unreadable object during listing"
                );
            }
        }
    }

    listed.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(listed)
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn get(&self, key: &str) -> Result<Option<StoredObject>> {
        let path = self.object_path(key);
        let key = key.to_owned();
        tokio::task::spawn_blocking(move || read_object(&path, &key)).await?
    }

    async fn put(&self, key: &str, body: Bytes, metadata: ObjectMetadata) -> Result<()> {
        let path = self.object_path(key);
        let key = key.to_owned();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let tmp = write_tmp_sibling(&path, |file| write_object(file, &key, &metadata, &body))?;
            publish_replace(&tmp, &path)?;
            Ok(())
        })
        .await?
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ListedObject>> {
        let objects_dir = self.objects_dir.clone();
        let prefix = prefix.to_owned();
        tokio::task::spawn_blocking(move || list_objects(&objects_dir, &prefix)).await?
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        let path = self.object_path(key);
        tokio::task::spawn_blocking(move || match fs::symlink_metadata(&path) {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::from(err)),
        })
        .await?
    }

    async fn put_if_absent(
        &self,
        key: &str,
        body: Bytes,
        metadata: ObjectMetadata,
    ) -> Result<PutOutcome> {
        let path = self.object_path(key);
        let key = key.to_owned();
        tokio::task::spawn_blocking(move || -> Result<PutOutcome> {
            if path.exists() {
                return Ok(PutOutcome::AlreadyExists);
            }
            let tmp = write_tmp_sibling(&path, |file| write_object(file, &key, &metadata, &body))?;
            if publish_if_absent(&tmp, &path)? {
                Ok(PutOutcome::Stored)
            } else {
                Ok(PutOutcome::AlreadyExists)
            }
        })
        .await?
    }
}
