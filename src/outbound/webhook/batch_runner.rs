use crate::config::DeliveryConfig;
use crate::domain::models::{
    BatchReport, DeliveryResult, DeliveryStatus, DeliveryUpdate, PendingDelivery,
};
use crate::domain::ports::{DeliveryStore, DeliveryTransport, OutboundWebhook, StoreError};
use crate::outbound::webhook::hmac_signer::signature_header_for;
use crate::outbound::webhook::retry_strategy::RetryStrategy;
use futures::StreamExt;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_LEASE_SECS: i64 = 300;
pub const MAX_LEASE_SECS: i64 = 86_400;

/// Store writes retried before an outcome is reported as not persisted
const PERSIST_ATTEMPTS: u32 = 3;
const PERSIST_BACKOFF: std::time::Duration = std::time::Duration::from_millis(100);

/// Runs one delivery pass over the eligible window of the queue.
///
/// Each call to [`BatchRunner::run_once`]:
/// 1. Fetches up to `batch_size` eligible records joined with their destination.
/// 2. Claims each record with a short lease so overlapping passes cannot both attempt it.
/// 3. Skips records whose destination is missing or inactive.
/// 4. Signs the payload and POSTs it through the [`DeliveryTransport`].
/// 5. Consults the [`RetryStrategy`] on failure and writes the outcome back in one update.
///
/// Records are isolated from each other: a failure on one never aborts the pass.
pub struct BatchRunner {
    store: Arc<dyn DeliveryStore>,

    transport: Arc<dyn DeliveryTransport>,

    retry_strategy: RetryStrategy,

    batch_size: usize,

    /// Records attempted at the same time within a pass.
    concurrency: usize,

    lease: Duration,
}

impl BatchRunner {
    /// Create a runner with the default batch size, concurrency, lease and retry strategy.
    pub fn new(store: Arc<dyn DeliveryStore>, transport: Arc<dyn DeliveryTransport>) -> Self {
        Self {
            store,
            transport,
            retry_strategy: RetryStrategy::default_strategy(),
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            lease: Duration::seconds(DEFAULT_LEASE_SECS),
        }
    }

    /// Create a runner tuned by the `delivery` configuration section.
    pub fn from_config(
        config: &DeliveryConfig,
        store: Arc<dyn DeliveryStore>,
        transport: Arc<dyn DeliveryTransport>,
    ) -> Self {
        Self::new(store, transport)
            .with_retry_strategy(
                RetryStrategy::default_strategy().with_max_attempts(config.max_attempts),
            )
            .with_batch_size(config.batch_size)
            .with_concurrency(config.concurrency)
            .with_lease(Duration::seconds(
                i64::try_from(config.lease_secs)
                    .unwrap_or(MAX_LEASE_SECS)
                    .min(MAX_LEASE_SECS),
            ))
    }

    /// Override the retry strategy.
    pub fn with_retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.retry_strategy = strategy;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Process one batch and return the per-status summary.
    ///
    /// Only a failure to read the queue aborts the pass.
    pub async fn run_once(&self) -> Result<BatchReport, ProcessError> {
        let now = OffsetDateTime::now_utc();
        let deliveries = self.store.fetch_eligible(self.batch_size, now).await?;

        if deliveries.is_empty() {
            debug!("No eligible webhook deliveries");
            return Ok(BatchReport::empty());
        }

        info!(count = deliveries.len(), "Processing webhook delivery batch");

        let results: Vec<Option<DeliveryResult>> = futures::stream::iter(deliveries)
            .map(|delivery| self.process_delivery(delivery))
            .buffered(self.concurrency)
            .collect()
            .await;

        let report = BatchReport::from_results(results.into_iter().flatten().collect());

        info!(
            processed = report.processed,
            success = report.summary.success,
            failed = report.summary.failed,
            pending = report.summary.pending,
            skipped = report.summary.skipped,
            "Webhook delivery batch complete"
        );

        Ok(report)
    }

    /// Claim, attempt and persist a single record.
    ///
    /// Returns `None` when another pass holds the record; it is left alone.
    async fn process_delivery(&self, delivery: PendingDelivery) -> Option<DeliveryResult> {
        let id = delivery.record.id;
        let lease_until = self.lease_deadline(OffsetDateTime::now_utc());

        match self.store.claim(&delivery, lease_until).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(delivery_id = %id, "Delivery claimed by another pass – leaving it");
                return None;
            }
            Err(e) => {
                warn!(delivery_id = %id, error = %e, "Failed to claim delivery – leaving it");
                // Still eligible, so the next pass picks it up
                return Some(DeliveryResult {
                    id,
                    status: DeliveryStatus::Pending,
                    error: Some(format!("claim failed: {e}")),
                });
            }
        }

        let (update, error) = self.attempt(&delivery).await;
        let mut result = DeliveryResult {
            id,
            status: update.status,
            error,
        };

        match self.persist(id, lease_until, &update).await {
            Ok(()) => {}
            Err(e @ StoreError::LeaseLost(_)) => {
                warn!(
                    delivery_id = %id,
                    status = update.status.as_str(),
                    "Lease expired before the outcome was written – another pass owns the record"
                );
                result.error = Some(format!("outcome not persisted: {e}"));
            }
            Err(e) => {
                error!(
                    delivery_id = %id,
                    status = update.status.as_str(),
                    error = %e,
                    "Failed to persist delivery outcome – record will be retried after its lease expires"
                );
                result.error = Some(format!("outcome not persisted: {e}"));
            }
        }

        Some(result)
    }

    /// End of the lease taken at `now`, at the microsecond precision the store keeps.
    fn lease_deadline(&self, now: OffsetDateTime) -> OffsetDateTime {
        let lease_until = now + self.lease;
        lease_until
            .replace_nanosecond(lease_until.nanosecond() / 1_000 * 1_000)
            .unwrap_or(lease_until)
    }

    /// Deliver the record and decide its next state.
    async fn attempt(&self, delivery: &PendingDelivery) -> (DeliveryUpdate, Option<String>) {
        let record = &delivery.record;

        let destination = match &delivery.destination {
            Some(destination) if destination.is_active => destination,
            other => {
                let note = if other.is_some() {
                    "destination inactive"
                } else {
                    "destination not found"
                };
                info!(
                    delivery_id = %record.id,
                    destination_id = %record.destination_id,
                    reason = note,
                    "Skipping webhook delivery"
                );
                return (
                    DeliveryUpdate::skipped(record.attempt_count, note),
                    Some(note.to_string()),
                );
            }
        };

        let attempt_count = record.attempt_count.saturating_add(1);

        let body = match record.payload_bytes() {
            Ok(body) => body,
            Err(e) => {
                let message = format!("Failed to serialize payload: {e}");
                return self.failure(record.id, attempt_count, None, &message, message.clone());
            }
        };

        let webhook = OutboundWebhook {
            url: destination.url.clone(),
            delivery_id: record.id,
            event_type: record.event_type.clone(),
            signature: signature_header_for(destination.secret.as_deref(), &body),
            body,
        };

        match self.transport.send(&webhook).await {
            Ok(response) if response.is_success() => {
                info!(
                    delivery_id = %record.id,
                    destination_id = %destination.id,
                    tenant_id = %record.tenant_id,
                    attempt = attempt_count,
                    status_code = response.status_code,
                    response_time_ms = response.response_time_ms,
                    "Webhook delivered successfully"
                );
                (
                    DeliveryUpdate::success(attempt_count, response.status_code, &response.body),
                    None,
                )
            }
            Ok(response) => self.failure(
                record.id,
                attempt_count,
                Some(response.status_code),
                &response.body,
                format!("HTTP {}", response.status_code),
            ),
            Err(e) => {
                let message = e.to_string();
                self.failure(record.id, attempt_count, None, &message, message.clone())
            }
        }
    }

    /// Reschedule or give up after a failed attempt.
    fn failure(
        &self,
        id: Uuid,
        attempt_count: u32,
        response_code: Option<u16>,
        diagnostic: &str,
        error: String,
    ) -> (DeliveryUpdate, Option<String>) {
        let now = OffsetDateTime::now_utc();

        match self.retry_strategy.next_retry_at(attempt_count, now) {
            Some(next_retry_at) => {
                warn!(
                    delivery_id = %id,
                    attempt = attempt_count,
                    max_attempts = self.retry_strategy.max_attempts(),
                    error = %error,
                    "Webhook delivery failed – will retry"
                );
                (
                    DeliveryUpdate::retry(attempt_count, next_retry_at, response_code, diagnostic),
                    Some(error),
                )
            }
            None => {
                error!(
                    delivery_id = %id,
                    attempt = attempt_count,
                    error = %error,
                    "Webhook delivery permanently failed"
                );
                (
                    DeliveryUpdate::failed(attempt_count, response_code, diagnostic),
                    Some(error),
                )
            }
        }
    }

    async fn persist(
        &self,
        id: Uuid,
        lease_until: OffsetDateTime,
        update: &DeliveryUpdate,
    ) -> Result<(), StoreError> {
        let mut attempt = 0;
        loop {
            match self.store.update_status(id, lease_until, update).await {
                Ok(()) => return Ok(()),
                Err(e @ StoreError::LeaseLost(_)) => return Err(e),
                Err(e) if attempt + 1 < PERSIST_ATTEMPTS => {
                    warn!(delivery_id = %id, attempt = attempt + 1, error = %e, "Store update failed – retrying");
                    tokio::time::sleep(PERSIST_BACKOFF * 2_u32.pow(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Errors that abort a whole pass.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to fetch eligible deliveries: {0}")]
    Store(#[from] StoreError),
}
