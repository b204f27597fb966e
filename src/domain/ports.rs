/*
   This module specifies the API by which the delivery processor reaches its collaborators:
   the durable delivery queue and the outbound HTTP transport.
*/

use crate::domain::models::{DeliveryUpdate, PendingDelivery};
use crate::outbound::webhook::http_client::HttpClientError;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Error type for delivery store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Store request failed: {0}")]
    Request(String),

    #[error("Store returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Failed to decode store response: {0}")]
    Decode(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Delivery {0} is no longer leased to this pass")]
    LeaseLost(Uuid),
}

/// Durable queue of delivery records
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Up to `limit` records eligible at `now`, oldest first, joined with their destination.
    async fn fetch_eligible(
        &self,
        limit: usize,
        now: OffsetDateTime,
    ) -> Result<Vec<PendingDelivery>, StoreError>;

    /// Move the record to `in_progress` until `lease_until`, provided its status and
    /// attempt count are still the ones observed in `delivery`.
    ///
    /// Returns `false` when the record changed in the meantime.
    async fn claim(
        &self,
        delivery: &PendingDelivery,
        lease_until: OffsetDateTime,
    ) -> Result<bool, StoreError>;

    /// Persist the outcome of an attempt in a single write, provided the record is
    /// still `in_progress` under the lease taken by [`DeliveryStore::claim`].
    ///
    /// Fails with [`StoreError::LeaseLost`] when no record matches.
    async fn update_status(
        &self,
        id: Uuid,
        lease_until: OffsetDateTime,
        update: &DeliveryUpdate,
    ) -> Result<(), StoreError>;
}

/// A signed webhook ready to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundWebhook {
    pub url: String,

    pub delivery_id: Uuid,

    pub event_type: String,

    pub body: Vec<u8>,

    pub signature: Option<String>,
}

/// HTTP outcome of a delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status_code: u16,

    pub body: String,

    pub response_time_ms: u64,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Outbound HTTP POST of a webhook.
///
/// Any HTTP response is `Ok`, whatever its status; `Err` means the request
/// never produced a response (DNS, connect, timeout).
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    async fn send(&self, webhook: &OutboundWebhook) -> Result<TransportResponse, HttpClientError>;
}
