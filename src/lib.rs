//! retailstore library -- admin pages over Azure Table, Blob, File and
//! Queue storage.
//!
//! This crate provides the storage backends (Azure REST clients and
//! in-memory test doubles), the storage façade with its lazy resource
//! provisioning and queue delete-by-id scan, and the HTML pages that drive
//! it.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod server;
pub mod service;
pub mod storage;
pub mod templates;
pub mod xml;

use crate::config::Config;
use crate::service::{ResourceNames, StorageService};
use crate::storage::Backends;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Façade over the four storage resources.
    pub storage: StorageService,
}

impl AppState {
    pub fn new(config: Config, backends: Backends) -> Self {
        let storage = StorageService::new(
            backends,
            ResourceNames::from(&config.storage),
            config.queue_delete.clone(),
        );
        Self { config, storage }
    }
}
