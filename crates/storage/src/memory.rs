//! Reference in-memory backend, used in tests and as the behavioral
//! baseline for real backends.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::traits::{Entity, Gateway};

/// An in-memory gateway over a `BTreeMap`, so `fetch_all` iterates in
/// id order like a keyed table would.
#[derive(Debug, Default)]
pub struct MemoryGateway<T> {
    records: RwLock<BTreeMap<String, T>>,
}

impl<T: Entity> MemoryGateway<T> {
    pub fn new() -> Self {
        MemoryGateway {
            records: RwLock::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl<T: Entity> Gateway<T> for MemoryGateway<T> {
    async fn create(&self, entity: &T) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        if records.contains_key(entity.id()) {
            return Err(StorageError::already_exists(T::KIND, entity.id()));
        }
        records.insert(entity.id().to_string(), entity.clone());
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<T, StorageError> {
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(T::KIND, id))
    }

    async fn exists(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.records.read().await.contains_key(id))
    }

    async fn fetch_list(&self, ids: &[String]) -> Result<Vec<T>, StorageError> {
        let records = self.records.read().await;
        Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
    }

    async fn fetch_all(&self) -> Result<Vec<T>, StorageError> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn count(&self) -> Result<usize, StorageError> {
        Ok(self.records.read().await.len())
    }

    async fn save(&self, entity: &T) -> Result<(), StorageError> {
        self.records
            .write()
            .await
            .insert(entity.id().to_string(), entity.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.records
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(T::KIND, id))
    }
}
