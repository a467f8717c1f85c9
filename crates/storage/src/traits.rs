use async_trait::async_trait;

use waymark_model::{Process, Scenario};

use crate::error::StorageError;

/// A persistable record: scenarios and processes both qualify.
pub trait Entity: Clone + Send + Sync + 'static {
    /// The record kind, used in error messages and log fields.
    const KIND: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
}

impl Entity for Scenario {
    const KIND: &'static str = "scenario";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Entity for Process {
    const KIND: &'static str = "process";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// Durable storage for one kind of entity.
///
/// Implementations must be `Send + Sync + 'static` so a gateway can be
/// shared across async task boundaries.
#[async_trait]
pub trait Gateway<T: Entity>: Send + Sync + 'static {
    /// Insert a new record. Fails with [`StorageError::AlreadyExists`]
    /// when the id is taken.
    async fn create(&self, entity: &T) -> Result<(), StorageError>;

    /// Fetch a record by id.
    async fn fetch(&self, id: &str) -> Result<T, StorageError>;

    async fn exists(&self, id: &str) -> Result<bool, StorageError>;

    /// Fetch the records with the given ids, skipping missing ones.
    async fn fetch_list(&self, ids: &[String]) -> Result<Vec<T>, StorageError>;

    /// All records, in id order.
    async fn fetch_all(&self) -> Result<Vec<T>, StorageError>;

    async fn count(&self) -> Result<usize, StorageError>;

    /// Insert or replace a record.
    async fn save(&self, entity: &T) -> Result<(), StorageError>;

    /// Delete a record. Fails with [`StorageError::NotFound`] when the
    /// id is unknown.
    async fn delete(&self, id: &str) -> Result<(), StorageError>;
}
