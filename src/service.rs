//! Storage façade.
//!
//! [`StorageService`] offers one operation per (resource kind × verb) over
//! the four backends.  Each operation provisions its resource on first use;
//! provisioning runs once per process and is retried on the next call if it
//! failed.  Absence is absorbed where it is a valid outcome (fetching a
//! customer, the three deletes, the queue scan) and propagated everywhere
//! else.

use bytes::Bytes;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::{QueueDeleteConfig, StorageConfig};
use crate::errors::{StorageError, StorageResult};
use crate::metrics::{record_storage_op, record_upload_bytes};
use crate::models::{new_row_key, normalize_tier, CustomerProfile, QueueMessage, CUSTOMER_PARTITION};
use crate::storage::backend::CopyStatus;
use crate::storage::Backends;

/// Service-side page size limit for queue peeks and receives.
pub const MAX_PEEK_MESSAGES: u32 = 32;

/// Interval between copy-status polls during a blob rename.
const COPY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound on how long a blob rename waits for its copy.
const COPY_TIMEOUT: Duration = Duration::from_secs(60);

/// Names of the four managed resources.
#[derive(Debug, Clone)]
pub struct ResourceNames {
    pub table: String,
    pub blob_container: String,
    pub file_share: String,
    pub queue: String,
}

impl From<&StorageConfig> for ResourceNames {
    fn from(cfg: &StorageConfig) -> Self {
        Self {
            table: cfg.table_name.clone(),
            blob_container: cfg.blob_container.clone(),
            file_share: cfg.file_share.clone(),
            queue: cfg.queue_name.clone(),
        }
    }
}

/// Count the outcome of one façade call and pass it through.
fn observe<T>(kind: &'static str, operation: &'static str, result: StorageResult<T>) -> StorageResult<T> {
    record_storage_op(kind, operation, result.is_ok());
    if let Err(e) = &result {
        warn!(kind, operation, error = %e, "storage operation failed");
    }
    result
}

/// Turn `NotFound` into success.
fn absorb_not_found(result: StorageResult<()>) -> StorageResult<()> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

pub struct StorageService {
    backends: Backends,
    names: ResourceNames,
    queue_delete: QueueDeleteConfig,
    table_ready: OnceCell<()>,
    container_ready: OnceCell<()>,
    share_ready: OnceCell<()>,
    queue_ready: OnceCell<()>,
}

impl StorageService {
    pub fn new(backends: Backends, names: ResourceNames, queue_delete: QueueDeleteConfig) -> Self {
        Self {
            backends,
            names,
            queue_delete,
            table_ready: OnceCell::new(),
            container_ready: OnceCell::new(),
            share_ready: OnceCell::new(),
            queue_ready: OnceCell::new(),
        }
    }

    pub fn names(&self) -> &ResourceNames {
        &self.names
    }

    // -- Provisioning ---------------------------------------------------------

    async fn ensure_table(&self) -> StorageResult<()> {
        self.table_ready
            .get_or_try_init(|| async {
                info!(table = %self.names.table, "provisioning table");
                self.backends
                    .tables
                    .create_table_if_not_exists(&self.names.table)
                    .await
            })
            .await
            .map(|_| ())
    }

    async fn ensure_container(&self) -> StorageResult<()> {
        self.container_ready
            .get_or_try_init(|| async {
                info!(container = %self.names.blob_container, "provisioning blob container");
                self.backends
                    .blobs
                    .create_container_if_not_exists(&self.names.blob_container)
                    .await
            })
            .await
            .map(|_| ())
    }

    async fn ensure_share(&self) -> StorageResult<()> {
        self.share_ready
            .get_or_try_init(|| async {
                info!(share = %self.names.file_share, "provisioning file share");
                self.backends
                    .files
                    .create_share_if_not_exists(&self.names.file_share)
                    .await
            })
            .await
            .map(|_| ())
    }

    async fn ensure_queue(&self) -> StorageResult<()> {
        self.queue_ready
            .get_or_try_init(|| async {
                info!(queue = %self.names.queue, "provisioning queue");
                self.backends
                    .queues
                    .create_queue_if_not_exists(&self.names.queue)
                    .await
            })
            .await
            .map(|_| ())
    }

    // -- Customers ------------------------------------------------------------

    /// All customer profiles, sorted by full name.
    pub async fn list_customers(&self) -> StorageResult<Vec<CustomerProfile>> {
        let result: StorageResult<Vec<CustomerProfile>> = async {
            self.ensure_table().await?;
            let entities = self
                .backends
                .tables
                .query_partition(&self.names.table, CUSTOMER_PARTITION)
                .await?;
            let mut profiles: Vec<CustomerProfile> =
                entities.iter().map(CustomerProfile::from_entity).collect();
            profiles.sort_by(|a, b| a.full_name.cmp(&b.full_name));
            Ok(profiles)
        }
        .await;
        observe("table", "list_customers", result)
    }

    /// Fetch one profile.  `None` when it does not exist.
    pub async fn get_customer(&self, row_key: &str) -> StorageResult<Option<CustomerProfile>> {
        if row_key.is_empty() {
            return Ok(None);
        }
        let result: StorageResult<Option<CustomerProfile>> = async {
            self.ensure_table().await?;
            match self
                .backends
                .tables
                .get_entity(&self.names.table, CUSTOMER_PARTITION, row_key)
                .await
            {
                Ok(entity) => Ok(Some(CustomerProfile::from_entity(&entity))),
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(e),
            }
        }
        .await;
        observe("table", "get_customer", result)
    }

    /// Store a new profile under the customer partition, generating an
    /// identifier if it has none.  Returns the stored profile.
    pub async fn add_customer(&self, mut profile: CustomerProfile) -> StorageResult<CustomerProfile> {
        profile.partition_key = CUSTOMER_PARTITION.to_string();
        if profile.row_key.is_empty() {
            profile.row_key = new_row_key();
        }
        profile.loyalty_tier = normalize_tier(&profile.loyalty_tier);
        let result: StorageResult<CustomerProfile> = async {
            self.ensure_table().await?;
            self.backends
                .tables
                .upsert_replace(&self.names.table, profile.to_entity())
                .await?;
            debug!(row_key = %profile.row_key, "customer added");
            Ok(profile)
        }
        .await;
        observe("table", "add_customer", result)
    }

    /// Replace the stored profile with the same identifier.  Fields are not
    /// merged.
    pub async fn update_customer(&self, mut profile: CustomerProfile) -> StorageResult<()> {
        if profile.row_key.is_empty() {
            return Err(StorageError::Other(anyhow::anyhow!(
                "cannot update a customer without an identifier"
            )));
        }
        profile.partition_key = CUSTOMER_PARTITION.to_string();
        let result: StorageResult<()> = async {
            self.ensure_table().await?;
            self.backends
                .tables
                .upsert_replace(&self.names.table, profile.to_entity())
                .await
        }
        .await;
        observe("table", "update_customer", result)
    }

    /// Delete a profile.  Deleting an absent profile succeeds.
    pub async fn delete_customer(&self, row_key: &str) -> StorageResult<()> {
        let result: StorageResult<()> = async {
            self.ensure_table().await?;
            absorb_not_found(
                self.backends
                    .tables
                    .delete_entity(&self.names.table, CUSTOMER_PARTITION, row_key)
                    .await,
            )
        }
        .await;
        observe("table", "delete_customer", result)
    }

    // -- Blobs ----------------------------------------------------------------

    /// All blob names, sorted.
    pub async fn list_blobs(&self) -> StorageResult<Vec<String>> {
        let result: StorageResult<Vec<String>> = async {
            self.ensure_container().await?;
            let mut names = self
                .backends
                .blobs
                .list_blob_names(&self.names.blob_container)
                .await?;
            names.sort();
            Ok(names)
        }
        .await;
        observe("blob", "list_blobs", result)
    }

    /// Write `data` to `name`, overwriting any existing blob.
    pub async fn upload_blob(&self, name: &str, data: Bytes) -> StorageResult<()> {
        let len = data.len();
        let result: StorageResult<()> = async {
            self.ensure_container().await?;
            self.backends
                .blobs
                .upload(&self.names.blob_container, name, data)
                .await
        }
        .await;
        if result.is_ok() {
            record_upload_bytes("blob", len);
        }
        observe("blob", "upload_blob", result)
    }

    pub async fn delete_blob(&self, name: &str) -> StorageResult<()> {
        let result: StorageResult<()> = async {
            self.ensure_container().await?;
            let removed = self
                .backends
                .blobs
                .delete_if_exists(&self.names.blob_container, name)
                .await?;
            debug!(name, removed, "blob delete");
            Ok(())
        }
        .await;
        observe("blob", "delete_blob", result)
    }

    /// Rename by server-side copy followed by deleting the source.
    ///
    /// Not atomic: if the source delete fails after the copy completed,
    /// both names remain.  Names equal ignoring case are left untouched.
    pub async fn rename_blob_non_atomic(&self, old_name: &str, new_name: &str) -> StorageResult<()> {
        if same_name(old_name, new_name) {
            return Ok(());
        }
        let result: StorageResult<()> = async {
            self.ensure_container().await?;
            let container = self.names.blob_container.as_str();
            let blobs = &self.backends.blobs;

            let first = blobs.start_copy(container, old_name, new_name).await?;
            let waited = tokio::time::timeout(COPY_TIMEOUT, async {
                let mut status = first;
                while status == CopyStatus::Pending {
                    tokio::time::sleep(COPY_POLL_INTERVAL).await;
                    status = blobs.copy_status(container, new_name).await?;
                }
                Ok::<_, StorageError>(status)
            })
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "copy of '{old_name}' to '{new_name}' did not finish within {}s",
                    COPY_TIMEOUT.as_secs()
                )
            })??;

            if let CopyStatus::Failed(reason) = waited {
                return Err(StorageError::Other(anyhow::anyhow!(
                    "copy of '{old_name}' to '{new_name}' failed: {reason}"
                )));
            }

            blobs.delete_if_exists(container, old_name).await?;
            info!(from = old_name, to = new_name, "blob renamed");
            Ok(())
        }
        .await;
        observe("blob", "rename_blob", result)
    }

    // -- Files ----------------------------------------------------------------

    /// Names of the files (not directories) in the share root, sorted.
    pub async fn list_files(&self) -> StorageResult<Vec<String>> {
        let result: StorageResult<Vec<String>> = async {
            self.ensure_share().await?;
            let entries = self.backends.files.list_root(&self.names.file_share).await?;
            let mut names: Vec<String> = entries
                .into_iter()
                .filter(|e| !e.is_directory)
                .map(|e| e.name)
                .collect();
            names.sort();
            Ok(names)
        }
        .await;
        observe("file", "list_files", result)
    }

    /// Create `name` with exactly `data.len()` bytes and write them in one
    /// range.  An empty payload creates an empty file.
    pub async fn upload_file(&self, name: &str, data: Bytes) -> StorageResult<()> {
        let len = data.len();
        let result: StorageResult<()> = async {
            self.ensure_share().await?;
            let share = self.names.file_share.as_str();
            self.backends.files.create_file(share, name, len as u64).await?;
            if len > 0 {
                self.backends.files.write_range(share, name, 0, data).await?;
            }
            Ok(())
        }
        .await;
        if result.is_ok() {
            record_upload_bytes("file", len);
        }
        observe("file", "upload_file", result)
    }

    pub async fn delete_file(&self, name: &str) -> StorageResult<()> {
        let result: StorageResult<()> = async {
            self.ensure_share().await?;
            let removed = self
                .backends
                .files
                .delete_if_exists(&self.names.file_share, name)
                .await?;
            debug!(name, removed, "file delete");
            Ok(())
        }
        .await;
        observe("file", "delete_file", result)
    }

    /// Atomic rename.  Names equal ignoring case are left untouched.
    pub async fn rename_file(&self, old_name: &str, new_name: &str) -> StorageResult<()> {
        if same_name(old_name, new_name) {
            return Ok(());
        }
        let result: StorageResult<()> = async {
            self.ensure_share().await?;
            self.backends
                .files
                .rename(&self.names.file_share, old_name, new_name)
                .await?;
            info!(from = old_name, to = new_name, "file renamed");
            Ok(())
        }
        .await;
        observe("file", "rename_file", result)
    }

    // -- Queue ----------------------------------------------------------------

    /// Up to `max` visible messages, left in place.  `max` is clamped to
    /// 1..=32.  Results never carry a pop receipt.
    pub async fn peek_messages(&self, max: u32) -> StorageResult<Vec<QueueMessage>> {
        let max = max.clamp(1, MAX_PEEK_MESSAGES);
        let result: StorageResult<Vec<QueueMessage>> = async {
            self.ensure_queue().await?;
            let mut messages = self.backends.queues.peek(&self.names.queue, max).await?;
            for m in &mut messages {
                m.pop_receipt = None;
            }
            Ok(messages)
        }
        .await;
        observe("queue", "peek_messages", result)
    }

    /// Append `text` unchanged.
    pub async fn send_message(&self, text: &str) -> StorageResult<()> {
        let result: StorageResult<()> = async {
            self.ensure_queue().await?;
            self.backends.queues.send(&self.names.queue, text).await
        }
        .await;
        observe("queue", "send_message", result)
    }

    /// Delete the message with identifier `id`.
    ///
    /// A message can only be deleted with the pop receipt of a live
    /// delivery, so this receives up to `passes` batches and deletes the
    /// first delivery whose id matches.  Returns whether a message was
    /// deleted; a miss is not an error.  Messages beyond the scanned
    /// batches are out of reach, and every scanned message stays hidden for
    /// the configured visibility timeout.
    pub async fn delete_message_by_id(&self, id: &str) -> StorageResult<bool> {
        if id.trim().is_empty() {
            return Ok(false);
        }
        let result: StorageResult<bool> = async {
            self.ensure_queue().await?;
            let queue = self.names.queue.as_str();
            let batch = self.queue_delete.batch_size.clamp(1, MAX_PEEK_MESSAGES);
            let visibility = self.queue_delete.visibility_timeout();

            for pass in 1..=self.queue_delete.passes {
                let received = self.backends.queues.receive(queue, batch, visibility).await?;
                let found = received
                    .into_iter()
                    .find(|m| m.id == id)
                    .and_then(|m| m.pop_receipt);
                if let Some(receipt) = found {
                    return match self.backends.queues.delete_message(queue, id, &receipt).await {
                        Ok(()) => {
                            debug!(id, pass, "queue message deleted");
                            Ok(true)
                        }
                        // Another consumer removed it after our receive.
                        Err(e) if e.is_not_found() => {
                            debug!(id, pass, "queue message already gone");
                            Ok(false)
                        }
                        Err(e) => Err(e),
                    };
                }
            }
            debug!(id, passes = self.queue_delete.passes, "queue message not found");
            Ok(false)
        }
        .await;
        observe("queue", "delete_message", result)
    }
}
