// Delivery store adapters
//
//   memory – process-local store for tests and local runs
//   rest   – PostgREST API in front of the hosted queue tables

pub mod memory;
pub mod rest;

use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};
use crate::domain::ports::{DeliveryStore, StoreError};

pub use memory::InMemoryDeliveryStore;
pub use rest::RestDeliveryStore;

/// Build the store selected by `store.backend`
pub fn build_store(config: &StoreConfig) -> Result<Arc<dyn DeliveryStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryDeliveryStore::new())),
        StoreBackend::Rest => Ok(Arc::new(RestDeliveryStore::new(config)?)),
    }
}
