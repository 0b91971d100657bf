//! Storage traits and error types

use crate::storage::PageRecord;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Store already closed: {0}")]
    Closed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One task's storage session
#[async_trait]
pub trait PageDataStore: Send + Sync {
    /// Persists a page record
    ///
    /// A record whose key already exists fails with
    /// [`StorageError::DuplicateKey`] and leaves the store usable.
    async fn save(&self, record: &PageRecord) -> StorageResult<()>;

    /// Writes everything stored so far to durable export files
    async fn export(&self) -> StorageResult<Vec<PathBuf>>;

    /// Releases the session. Later calls fail with [`StorageError::Closed`].
    async fn close(&self) -> StorageResult<()>;
}

/// Opens storage sessions scoped to a task id
#[async_trait]
pub trait PageDataStorage: Send + Sync {
    async fn open(&self, task_id: &str) -> StorageResult<Arc<dyn PageDataStore>>;
}
