use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::{ListedObject, ObjectMetadata, ObjectStore, PutOutcome, Result, StoredObject};

/// In-process store backed by a sorted map.
///
/// `put_if_absent` runs under the write lock, so it is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<StoredObject>> {
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, body: Bytes, metadata: ObjectMetadata) -> Result<()> {
        self.objects
            .write()
            .await
            .insert(key.to_owned(), StoredObject { body, metadata });
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ListedObject>> {
        let objects = self.objects.read().await;
        Ok(objects
            .range(prefix.to_owned()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| ListedObject {
                key: key.clone(),
                metadata: object.metadata.clone(),
            })
            .collect())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn put_if_absent(
        &self,
        key: &str,
        body: Bytes,
        metadata: ObjectMetadata,
    ) -> Result<PutOutcome> {
        let mut objects = self.objects.write().await;
        if objects.contains_key(key) {
            return Ok(PutOutcome::AlreadyExists);
        }
        objects.insert(key.to_owned(), StoredObject { body, metadata });
        Ok(PutOutcome::Stored)
    }
}
