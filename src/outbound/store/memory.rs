use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::models::{
    DeliveryRecord, DeliveryStatus, DeliveryUpdate, DestinationConfig, PendingDelivery,
};
use crate::domain::ports::{DeliveryStore, StoreError};

// ============================================================================
// InMemoryDeliveryStore
// ============================================================================
#[derive(Debug, Default, Clone)]
pub struct InMemoryDeliveryStore {
    state: Arc<Mutex<StoreState>>,
}

#[derive(Debug, Default)]
struct StoreState {
    /// Kept in insertion order, which stands in for `created_at` ordering.
    deliveries: Vec<DeliveryRecord>,

    destinations: HashMap<Uuid, DestinationConfig>,
}

impl InMemoryDeliveryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_destination(&self, destination: DestinationConfig) {
        self.lock_or_panic()
            .destinations
            .insert(destination.id, destination);
    }

    pub fn insert_delivery(&self, record: DeliveryRecord) {
        self.lock_or_panic().deliveries.push(record);
    }

    pub fn get(&self, id: Uuid) -> Option<DeliveryRecord> {
        self.lock_or_panic()
            .deliveries
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Overwrite a record's `next_retry_at`, e.g. to make a rescheduled record due now.
    pub fn reschedule(&self, id: Uuid, next_retry_at: Option<OffsetDateTime>) {
        if let Some(record) = self
            .lock_or_panic()
            .deliveries
            .iter_mut()
            .find(|r| r.id == id)
        {
            record.next_retry_at = next_retry_at;
        }
    }

    /// Return a snapshot of all stored records (for test assertions).
    pub fn snapshot(&self) -> Vec<DeliveryRecord> {
        self.lock_or_panic().deliveries.clone()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("InMemoryDeliveryStore lock poisoned: {e}")))
    }

    fn lock_or_panic(&self) -> MutexGuard<'_, StoreState> {
        self.state
            .lock()
            .expect("InMemoryDeliveryStore lock poisoned")
    }
}

#[async_trait]
impl DeliveryStore for InMemoryDeliveryStore {
    async fn fetch_eligible(
        &self,
        limit: usize,
        now: OffsetDateTime,
    ) -> Result<Vec<PendingDelivery>, StoreError> {
        let state = self.lock()?;

        Ok(state
            .deliveries
            .iter()
            .filter(|record| record.is_eligible(now))
            .take(limit)
            .map(|record| PendingDelivery {
                record: record.clone(),
                destination: state.destinations.get(&record.destination_id).cloned(),
            })
            .collect())
    }

    async fn claim(
        &self,
        delivery: &PendingDelivery,
        lease_until: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        let observed = &delivery.record;

        let Some(record) = state.deliveries.iter_mut().find(|r| r.id == observed.id) else {
            return Ok(false);
        };

        if record.status != observed.status
            || record.attempt_count != observed.attempt_count
            || record.next_retry_at != observed.next_retry_at
        {
            return Ok(false);
        }

        record.status = DeliveryStatus::InProgress;
        record.next_retry_at = Some(lease_until);
        Ok(true)
    }

    async fn update_status(
        &self,
        id: Uuid,
        lease_until: OffsetDateTime,
        update: &DeliveryUpdate,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;

        let record = state
            .deliveries
            .iter_mut()
            .find(|r| {
                r.id == id
                    && r.status == DeliveryStatus::InProgress
                    && r.next_retry_at == Some(lease_until)
            })
            .ok_or(StoreError::LeaseLost(id))?;

        record.apply(update);
        Ok(())
    }
}
