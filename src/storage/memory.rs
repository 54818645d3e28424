//! In-memory storage backends.
//!
//! Non-persistent stand-ins for the four managed services, used to
//! exercise the façade and the HTTP layer without an account.  State is
//! held in `tokio::sync::RwLock` maps.  Each backend honours the same
//! not-found contracts as the Azure clients, and the queue models
//! visibility windows and per-delivery pop receipts.

use bytes::Bytes;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::backend::{
    BackendFuture, BlobBackend, CopyStatus, FileShareBackend, QueueBackend, TableBackend,
};
use crate::errors::StorageError;
use crate::models::{DirectoryEntry, QueueMessage, TableEntity};

/// Maximum number of messages a single peek or receive can return.
const MAX_MESSAGES_PER_CALL: u32 = 32;

// ── Tables ──────────────────────────────────────────────────────────

/// In-memory table store.
#[derive(Default)]
pub struct MemoryTableBackend {
    tables: RwLock<HashMap<String, BTreeMap<(String, String), TableEntity>>>,
}

impl MemoryTableBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn missing_table(table: &str) -> StorageError {
        StorageError::not_found(format!("table '{table}'"))
    }
}

impl TableBackend for MemoryTableBackend {
    fn create_table_if_not_exists(&self, table: &str) -> BackendFuture<'_, ()> {
        let table = table.to_string();
        Box::pin(async move {
            self.tables.write().await.entry(table).or_default();
            Ok(())
        })
    }

    fn query_partition(
        &self,
        table: &str,
        partition_key: &str,
    ) -> BackendFuture<'_, Vec<TableEntity>> {
        let table = table.to_string();
        let partition_key = partition_key.to_string();
        Box::pin(async move {
            let tables = self.tables.read().await;
            let rows = tables.get(&table).ok_or_else(|| Self::missing_table(&table))?;
            Ok(rows
                .values()
                .filter(|e| e.partition_key == partition_key)
                .cloned()
                .collect())
        })
    }

    fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> BackendFuture<'_, TableEntity> {
        let table = table.to_string();
        let key = (partition_key.to_string(), row_key.to_string());
        Box::pin(async move {
            let tables = self.tables.read().await;
            let rows = tables.get(&table).ok_or_else(|| Self::missing_table(&table))?;
            rows.get(&key)
                .cloned()
                .ok_or_else(|| StorageError::not_found(format!("entity '{}'", key.1)))
        })
    }

    fn upsert_replace(&self, table: &str, entity: TableEntity) -> BackendFuture<'_, ()> {
        let table = table.to_string();
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let rows = tables
                .get_mut(&table)
                .ok_or_else(|| Self::missing_table(&table))?;
            let now = Utc::now();
            let stored = TableEntity {
                timestamp: Some(now),
                etag: Some(format!("W/\"datetime'{}'\"", now.to_rfc3339())),
                ..entity
            };
            rows.insert(
                (stored.partition_key.clone(), stored.row_key.clone()),
                stored,
            );
            Ok(())
        })
    }

    fn delete_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> BackendFuture<'_, ()> {
        let table = table.to_string();
        let key = (partition_key.to_string(), row_key.to_string());
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let rows = tables
                .get_mut(&table)
                .ok_or_else(|| Self::missing_table(&table))?;
            rows.remove(&key)
                .map(|_| ())
                .ok_or_else(|| StorageError::not_found(format!("entity '{}'", key.1)))
        })
    }
}

// ── Blobs ───────────────────────────────────────────────────────────

/// In-memory blob containers.  Copies complete synchronously.
#[derive(Default)]
pub struct MemoryBlobBackend {
    containers: RwLock<HashMap<String, BTreeMap<String, Bytes>>>,
}

impl MemoryBlobBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a blob's bytes, if present.
    pub async fn contents(&self, container: &str, name: &str) -> Option<Bytes> {
        self.containers
            .read()
            .await
            .get(container)
            .and_then(|blobs| blobs.get(name).cloned())
    }

    fn missing_container(container: &str) -> StorageError {
        StorageError::not_found(format!("container '{container}'"))
    }
}

impl BlobBackend for MemoryBlobBackend {
    fn create_container_if_not_exists(&self, container: &str) -> BackendFuture<'_, ()> {
        let container = container.to_string();
        Box::pin(async move {
            self.containers.write().await.entry(container).or_default();
            Ok(())
        })
    }

    fn list_blob_names(&self, container: &str) -> BackendFuture<'_, Vec<String>> {
        let container = container.to_string();
        Box::pin(async move {
            let containers = self.containers.read().await;
            let blobs = containers
                .get(&container)
                .ok_or_else(|| Self::missing_container(&container))?;
            Ok(blobs.keys().cloned().collect())
        })
    }

    fn upload(&self, container: &str, name: &str, data: Bytes) -> BackendFuture<'_, ()> {
        let container = container.to_string();
        let name = name.to_string();
        Box::pin(async move {
            let mut containers = self.containers.write().await;
            let blobs = containers
                .get_mut(&container)
                .ok_or_else(|| Self::missing_container(&container))?;
            blobs.insert(name, data);
            Ok(())
        })
    }

    fn delete_if_exists(&self, container: &str, name: &str) -> BackendFuture<'_, bool> {
        let container = container.to_string();
        let name = name.to_string();
        Box::pin(async move {
            let mut containers = self.containers.write().await;
            let blobs = containers
                .get_mut(&container)
                .ok_or_else(|| Self::missing_container(&container))?;
            Ok(blobs.remove(&name).is_some())
        })
    }

    fn start_copy(
        &self,
        container: &str,
        source: &str,
        destination: &str,
    ) -> BackendFuture<'_, CopyStatus> {
        let container = container.to_string();
        let source = source.to_string();
        let destination = destination.to_string();
        Box::pin(async move {
            let mut containers = self.containers.write().await;
            let blobs = containers
                .get_mut(&container)
                .ok_or_else(|| Self::missing_container(&container))?;
            let data = blobs
                .get(&source)
                .cloned()
                .ok_or_else(|| StorageError::not_found(format!("blob '{source}'")))?;
            blobs.insert(destination, data);
            Ok(CopyStatus::Success)
        })
    }

    fn copy_status(&self, container: &str, destination: &str) -> BackendFuture<'_, CopyStatus> {
        let container = container.to_string();
        let destination = destination.to_string();
        Box::pin(async move {
            let containers = self.containers.read().await;
            let blobs = containers
                .get(&container)
                .ok_or_else(|| Self::missing_container(&container))?;
            if blobs.contains_key(&destination) {
                Ok(CopyStatus::Success)
            } else {
                Err(StorageError::not_found(format!("blob '{destination}'")))
            }
        })
    }
}

// ── File shares ─────────────────────────────────────────────────────

enum FileNode {
    File(Vec<u8>),
    Directory,
}

/// In-memory file shares holding a flat root directory.
#[derive(Default)]
pub struct MemoryFileShareBackend {
    shares: RwLock<HashMap<String, BTreeMap<String, FileNode>>>,
}

impl MemoryFileShareBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subdirectory to the share root.
    pub async fn create_directory(&self, share: &str, name: &str) {
        self.shares
            .write()
            .await
            .entry(share.to_string())
            .or_default()
            .insert(name.to_string(), FileNode::Directory);
    }

    /// Read a file's bytes, if present.
    pub async fn contents(&self, share: &str, name: &str) -> Option<Vec<u8>> {
        match self.shares.read().await.get(share)?.get(name)? {
            FileNode::File(data) => Some(data.clone()),
            FileNode::Directory => None,
        }
    }

    fn missing_share(share: &str) -> StorageError {
        StorageError::not_found(format!("share '{share}'"))
    }
}

impl FileShareBackend for MemoryFileShareBackend {
    fn create_share_if_not_exists(&self, share: &str) -> BackendFuture<'_, ()> {
        let share = share.to_string();
        Box::pin(async move {
            self.shares.write().await.entry(share).or_default();
            Ok(())
        })
    }

    fn list_root(&self, share: &str) -> BackendFuture<'_, Vec<DirectoryEntry>> {
        let share = share.to_string();
        Box::pin(async move {
            let shares = self.shares.read().await;
            let root = shares.get(&share).ok_or_else(|| Self::missing_share(&share))?;
            Ok(root
                .iter()
                .map(|(name, node)| DirectoryEntry {
                    name: name.clone(),
                    is_directory: matches!(node, FileNode::Directory),
                })
                .collect())
        })
    }

    fn create_file(&self, share: &str, name: &str, length: u64) -> BackendFuture<'_, ()> {
        let share = share.to_string();
        let name = name.to_string();
        Box::pin(async move {
            let length = usize::try_from(length)
                .map_err(|_| anyhow::anyhow!("file length {length} exceeds addressable memory"))?;
            let mut shares = self.shares.write().await;
            let root = shares
                .get_mut(&share)
                .ok_or_else(|| Self::missing_share(&share))?;
            root.insert(name, FileNode::File(vec![0; length]));
            Ok(())
        })
    }

    fn write_range(
        &self,
        share: &str,
        name: &str,
        offset: u64,
        data: Bytes,
    ) -> BackendFuture<'_, ()> {
        let share = share.to_string();
        let name = name.to_string();
        Box::pin(async move {
            let mut shares = self.shares.write().await;
            let root = shares
                .get_mut(&share)
                .ok_or_else(|| Self::missing_share(&share))?;
            let Some(FileNode::File(contents)) = root.get_mut(&name) else {
                return Err(StorageError::not_found(format!("file '{name}'")));
            };
            let start = offset as usize;
            let end = start + data.len();
            if end > contents.len() {
                return Err(StorageError::Remote {
                    operation: "put_range",
                    status: 416,
                    body: "InvalidRange".to_string(),
                });
            }
            contents[start..end].copy_from_slice(&data);
            Ok(())
        })
    }

    fn delete_if_exists(&self, share: &str, name: &str) -> BackendFuture<'_, bool> {
        let share = share.to_string();
        let name = name.to_string();
        Box::pin(async move {
            let mut shares = self.shares.write().await;
            let root = shares
                .get_mut(&share)
                .ok_or_else(|| Self::missing_share(&share))?;
            match root.get(&name) {
                Some(FileNode::File(_)) => Ok(root.remove(&name).is_some()),
                _ => Ok(false),
            }
        })
    }

    fn rename(&self, share: &str, source: &str, destination: &str) -> BackendFuture<'_, ()> {
        let share = share.to_string();
        let source = source.to_string();
        let destination = destination.to_string();
        Box::pin(async move {
            let mut shares = self.shares.write().await;
            let root = shares
                .get_mut(&share)
                .ok_or_else(|| Self::missing_share(&share))?;
            if !root.contains_key(&source) {
                return Err(StorageError::not_found(format!("file '{source}'")));
            }
            if root.contains_key(&destination) {
                return Err(StorageError::Remote {
                    operation: "rename",
                    status: 409,
                    body: "ResourceAlreadyExists".to_string(),
                });
            }
            if let Some(node) = root.remove(&source) {
                root.insert(destination, node);
            }
            Ok(())
        })
    }
}

// ── Queues ──────────────────────────────────────────────────────────

struct StoredMessage {
    id: String,
    text: String,
    inserted_on: chrono::DateTime<Utc>,
    visible_at: Instant,
    pop_receipt: Option<String>,
}

/// In-memory queues with visibility timeouts.
#[derive(Default)]
pub struct MemoryQueueBackend {
    queues: RwLock<HashMap<String, VecDeque<StoredMessage>>>,
}

impl MemoryQueueBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages in `queue`, visible or not.
    pub async fn len(&self, queue: &str) -> usize {
        self.queues.read().await.get(queue).map_or(0, VecDeque::len)
    }

    fn missing_queue(queue: &str) -> StorageError {
        StorageError::not_found(format!("queue '{queue}'"))
    }
}

impl QueueBackend for MemoryQueueBackend {
    fn create_queue_if_not_exists(&self, queue: &str) -> BackendFuture<'_, ()> {
        let queue = queue.to_string();
        Box::pin(async move {
            self.queues.write().await.entry(queue).or_default();
            Ok(())
        })
    }

    fn peek(&self, queue: &str, max: u32) -> BackendFuture<'_, Vec<QueueMessage>> {
        let queue = queue.to_string();
        Box::pin(async move {
            let queues = self.queues.read().await;
            let messages = queues.get(&queue).ok_or_else(|| Self::missing_queue(&queue))?;
            let now = Instant::now();
            Ok(messages
                .iter()
                .filter(|m| m.visible_at <= now)
                .take(max.min(MAX_MESSAGES_PER_CALL) as usize)
                .map(|m| QueueMessage {
                    id: m.id.clone(),
                    pop_receipt: None,
                    text: m.text.clone(),
                    inserted_on: Some(m.inserted_on),
                })
                .collect())
        })
    }

    fn send(&self, queue: &str, text: &str) -> BackendFuture<'_, ()> {
        let queue = queue.to_string();
        let text = text.to_string();
        Box::pin(async move {
            let mut queues = self.queues.write().await;
            let messages = queues
                .get_mut(&queue)
                .ok_or_else(|| Self::missing_queue(&queue))?;
            messages.push_back(StoredMessage {
                id: uuid::Uuid::new_v4().to_string(),
                text,
                inserted_on: Utc::now(),
                visible_at: Instant::now(),
                pop_receipt: None,
            });
            Ok(())
        })
    }

    fn receive(
        &self,
        queue: &str,
        max: u32,
        visibility_timeout: Duration,
    ) -> BackendFuture<'_, Vec<QueueMessage>> {
        let queue = queue.to_string();
        Box::pin(async move {
            let mut queues = self.queues.write().await;
            let messages = queues
                .get_mut(&queue)
                .ok_or_else(|| Self::missing_queue(&queue))?;
            let now = Instant::now();
            let mut received = Vec::new();
            for m in messages.iter_mut().filter(|m| m.visible_at <= now) {
                if received.len() >= max.min(MAX_MESSAGES_PER_CALL) as usize {
                    break;
                }
                let receipt = uuid::Uuid::new_v4().to_string();
                m.visible_at = now + visibility_timeout;
                m.pop_receipt = Some(receipt.clone());
                received.push(QueueMessage {
                    id: m.id.clone(),
                    pop_receipt: Some(receipt),
                    text: m.text.clone(),
                    inserted_on: Some(m.inserted_on),
                });
            }
            Ok(received)
        })
    }

    fn delete_message(&self, queue: &str, id: &str, pop_receipt: &str) -> BackendFuture<'_, ()> {
        let queue = queue.to_string();
        let id = id.to_string();
        let pop_receipt = pop_receipt.to_string();
        Box::pin(async move {
            let mut queues = self.queues.write().await;
            let messages = queues
                .get_mut(&queue)
                .ok_or_else(|| Self::missing_queue(&queue))?;
            let pos = messages
                .iter()
                .position(|m| m.id == id)
                .ok_or_else(|| StorageError::not_found(format!("message '{id}'")))?;
            if messages[pos].pop_receipt.as_deref() != Some(pop_receipt.as_str()) {
                return Err(StorageError::Remote {
                    operation: "delete_message",
                    status: 400,
                    body: "PopReceiptMismatch".to_string(),
                });
            }
            messages.remove(pos);
            Ok(())
        })
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_table_requires_creation() {
        let backend = MemoryTableBackend::new();
        let err = backend.query_partition("t", "Customer").await.unwrap_err();
        assert!(err.is_not_found());
        backend.create_table_if_not_exists("t").await.unwrap();
        backend.create_table_if_not_exists("t").await.unwrap();
        assert!(backend.query_partition("t", "Customer").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_table_upsert_assigns_system_properties() {
        let backend = MemoryTableBackend::new();
        backend.create_table_if_not_exists("t").await.unwrap();
        backend
            .upsert_replace("t", TableEntity::new("Customer", "r1"))
            .await
            .unwrap();
        let stored = backend.get_entity("t", "Customer", "r1").await.unwrap();
        assert!(stored.timestamp.is_some());
        assert!(stored.etag.is_some());
    }

    #[tokio::test]
    async fn test_table_delete_missing_is_not_found() {
        let backend = MemoryTableBackend::new();
        backend.create_table_if_not_exists("t").await.unwrap();
        let err = backend.delete_entity("t", "Customer", "nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_blob_copy_missing_source() {
        let backend = MemoryBlobBackend::new();
        backend.create_container_if_not_exists("c").await.unwrap();
        let err = backend.start_copy("c", "a", "b").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_blob_delete_reports_existence() {
        let backend = MemoryBlobBackend::new();
        backend.create_container_if_not_exists("c").await.unwrap();
        backend.upload("c", "a", Bytes::from_static(b"x")).await.unwrap();
        assert!(backend.delete_if_exists("c", "a").await.unwrap());
        assert!(!backend.delete_if_exists("c", "a").await.unwrap());
    }

    #[tokio::test]
    async fn test_file_range_out_of_bounds() {
        let backend = MemoryFileShareBackend::new();
        backend.create_share_if_not_exists("s").await.unwrap();
        backend.create_file("s", "f", 2).await.unwrap();
        let err = backend
            .write_range("s", "f", 0, Bytes::from_static(b"abc"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(416));
    }

    #[tokio::test]
    async fn test_file_rename_refuses_existing_destination() {
        let backend = MemoryFileShareBackend::new();
        backend.create_share_if_not_exists("s").await.unwrap();
        backend.create_file("s", "a", 0).await.unwrap();
        backend.create_file("s", "b", 0).await.unwrap();
        let err = backend.rename("s", "a", "b").await.unwrap_err();
        assert_eq!(err.status(), Some(409));
    }

    #[tokio::test]
    async fn test_queue_receive_hides_until_timeout() {
        tokio::time::pause();
        let backend = MemoryQueueBackend::new();
        backend.create_queue_if_not_exists("q").await.unwrap();
        backend.send("q", "hello").await.unwrap();

        let got = backend.receive("q", 32, Duration::from_secs(5)).await.unwrap();
        assert_eq!(got.len(), 1);
        assert!(got[0].pop_receipt.is_some());
        assert!(backend.peek("q", 32).await.unwrap().is_empty());

        tokio::time::advance(Duration::from_secs(6)).await;
        let peeked = backend.peek("q", 32).await.unwrap();
        assert_eq!(peeked.len(), 1);
        assert!(peeked[0].pop_receipt.is_none());
    }

    #[tokio::test]
    async fn test_queue_stale_receipt_is_rejected() {
        tokio::time::pause();
        let backend = MemoryQueueBackend::new();
        backend.create_queue_if_not_exists("q").await.unwrap();
        backend.send("q", "hello").await.unwrap();

        let first = backend.receive("q", 1, Duration::from_secs(1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        let second = backend.receive("q", 1, Duration::from_secs(1)).await.unwrap();
        assert_eq!(first[0].id, second[0].id);

        let stale = first[0].pop_receipt.as_deref().unwrap();
        let err = backend.delete_message("q", &first[0].id, stale).await.unwrap_err();
        assert_eq!(err.status(), Some(400));

        let fresh = second[0].pop_receipt.as_deref().unwrap();
        backend.delete_message("q", &second[0].id, fresh).await.unwrap();
        assert_eq!(backend.len("q").await, 0);
    }

    #[tokio::test]
    async fn test_queue_calls_are_capped_at_32() {
        let backend = MemoryQueueBackend::new();
        backend.create_queue_if_not_exists("q").await.unwrap();
        for i in 0..40 {
            backend.send("q", &format!("m{i}")).await.unwrap();
        }
        assert_eq!(backend.peek("q", 100).await.unwrap().len(), 32);
        let got = backend.receive("q", 100, Duration::from_secs(5)).await.unwrap();
        assert_eq!(got.len(), 32);
        assert_eq!(got[0].text, "m0");
    }
}
