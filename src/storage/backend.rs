//! Abstract storage backend traits.
//!
//! One trait per managed storage kind.  Every method resolves to a
//! [`StorageResult`]; an absent target is reported as
//! [`StorageError::NotFound`](crate::errors::StorageError::NotFound) so
//! callers can tell absence apart from other failures.

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::errors::StorageResult;
use crate::models::{DirectoryEntry, QueueMessage, TableEntity};

/// Boxed future returned by every backend method.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = StorageResult<T>> + Send + 'a>>;

/// Key-addressed table store.
pub trait TableBackend: Send + Sync + 'static {
    /// Create `table` unless it already exists.
    fn create_table_if_not_exists(&self, table: &str) -> BackendFuture<'_, ()>;

    /// Return every entity stored under `partition_key`.
    fn query_partition(&self, table: &str, partition_key: &str)
        -> BackendFuture<'_, Vec<TableEntity>>;

    /// Fetch one entity.  `NotFound` when absent.
    fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> BackendFuture<'_, TableEntity>;

    /// Insert `entity`, or fully replace the stored one with the same keys.
    fn upsert_replace(&self, table: &str, entity: TableEntity) -> BackendFuture<'_, ()>;

    /// Delete one entity.  `NotFound` when absent.
    fn delete_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> BackendFuture<'_, ()>;
}

/// State of a server-side blob copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyStatus {
    Pending,
    Success,
    /// The copy failed or was aborted; carries the service's description.
    Failed(String),
}

/// Named object store within a container.
pub trait BlobBackend: Send + Sync + 'static {
    /// Create `container` with private access unless it already exists.
    fn create_container_if_not_exists(&self, container: &str) -> BackendFuture<'_, ()>;

    /// Return every blob name in `container`, in service order.
    fn list_blob_names(&self, container: &str) -> BackendFuture<'_, Vec<String>>;

    /// Write `data` to `name`, overwriting any existing blob.
    fn upload(&self, container: &str, name: &str, data: Bytes) -> BackendFuture<'_, ()>;

    /// Delete `name`.  Returns whether a blob was actually removed.
    fn delete_if_exists(&self, container: &str, name: &str) -> BackendFuture<'_, bool>;

    /// Start a server-side copy of `source` to `destination`.
    fn start_copy(
        &self,
        container: &str,
        source: &str,
        destination: &str,
    ) -> BackendFuture<'_, CopyStatus>;

    /// Report the copy state recorded on `destination`.
    fn copy_status(&self, container: &str, destination: &str) -> BackendFuture<'_, CopyStatus>;
}

/// Hierarchical file store; only the share root is used.
pub trait FileShareBackend: Send + Sync + 'static {
    /// Create `share` unless it already exists.
    fn create_share_if_not_exists(&self, share: &str) -> BackendFuture<'_, ()>;

    /// List the files and directories directly under the share root.
    fn list_root(&self, share: &str) -> BackendFuture<'_, Vec<DirectoryEntry>>;

    /// Create (or truncate) `name` with a fixed length of `length` bytes.
    fn create_file(&self, share: &str, name: &str, length: u64) -> BackendFuture<'_, ()>;

    /// Write `data` at `offset` into an existing file.
    fn write_range(
        &self,
        share: &str,
        name: &str,
        offset: u64,
        data: Bytes,
    ) -> BackendFuture<'_, ()>;

    /// Delete `name`.  Returns whether a file was actually removed.
    fn delete_if_exists(&self, share: &str, name: &str) -> BackendFuture<'_, bool>;

    /// Atomically rename `source` to `destination`.
    fn rename(&self, share: &str, source: &str, destination: &str) -> BackendFuture<'_, ()>;
}

/// Message queue.
pub trait QueueBackend: Send + Sync + 'static {
    /// Create `queue` unless it already exists.
    fn create_queue_if_not_exists(&self, queue: &str) -> BackendFuture<'_, ()>;

    /// Return up to `max` visible messages without changing their visibility.
    /// Results never carry a pop receipt.
    fn peek(&self, queue: &str, max: u32) -> BackendFuture<'_, Vec<QueueMessage>>;

    /// Append a message with body `text`.
    fn send(&self, queue: &str, text: &str) -> BackendFuture<'_, ()>;

    /// Receive up to `max` visible messages, hiding them for
    /// `visibility_timeout`.  Results carry a pop receipt.
    fn receive(
        &self,
        queue: &str,
        max: u32,
        visibility_timeout: Duration,
    ) -> BackendFuture<'_, Vec<QueueMessage>>;

    /// Delete the delivery identified by `(id, pop_receipt)`.
    fn delete_message(&self, queue: &str, id: &str, pop_receipt: &str) -> BackendFuture<'_, ()>;
}
