//! Storage backends.
//!
//! [`backend`] declares one trait per storage kind.  [`azure`] implements
//! them over the Azure Storage REST APIs; [`memory`] implements them in
//! process for tests.  [`Backends`] bundles one of each for the service
//! façade.

pub mod azure;
pub mod backend;
pub mod memory;

use std::sync::Arc;

use crate::errors::StorageResult;
use backend::{BlobBackend, FileShareBackend, QueueBackend, TableBackend};

/// One client per storage kind, shared by all requests.
#[derive(Clone)]
pub struct Backends {
    pub tables: Arc<dyn TableBackend>,
    pub blobs: Arc<dyn BlobBackend>,
    pub files: Arc<dyn FileShareBackend>,
    pub queues: Arc<dyn QueueBackend>,
}

impl Backends {
    /// Build the Azure clients for the account in `connection_string`.
    pub fn azure(connection_string: &str) -> StorageResult<Self> {
        let conn = azure::ConnectionString::parse(connection_string)?;
        Ok(Self {
            tables: Arc::new(azure::AzureTableBackend::new(&conn)?),
            blobs: Arc::new(azure::AzureBlobBackend::new(&conn)?),
            files: Arc::new(azure::AzureFileShareBackend::new(&conn)?),
            queues: Arc::new(azure::AzureQueueBackend::new(&conn)?),
        })
    }

    /// Fresh, empty in-process backends.
    pub fn in_memory() -> Self {
        Self {
            tables: Arc::new(memory::MemoryTableBackend::new()),
            blobs: Arc::new(memory::MemoryBlobBackend::new()),
            files: Arc::new(memory::MemoryFileShareBackend::new()),
            queues: Arc::new(memory::MemoryQueueBackend::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_azure_backends_from_account_key() {
        let cs = "DefaultEndpointsProtocol=https;AccountName=abc;AccountKey=a2V5";
        assert!(Backends::azure(cs).is_ok());
    }

    #[test]
    fn test_azure_backends_reject_bad_connection_string() {
        assert!(Backends::azure("AccountName=abc").is_err());
        assert!(Backends::azure("UseDevelopmentStorage=true").is_err());
        assert!(Backends::azure(
            "UseDevelopmentStorage=true;FileEndpoint=http://127.0.0.1:10004/devstoreaccount1"
        )
        .is_ok());
    }
}
