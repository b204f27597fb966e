use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// Upper bound on the length of a stored response body or error message.
pub const MAX_DIAGNOSTIC_CHARS: usize = 1000;

/// Lifecycle state of a delivery record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,

    /// Claimed by a running pass; `next_retry_at` holds the lease deadline.
    InProgress,

    Success,

    Failed,

    Skipped,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::InProgress => "in_progress",
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Skipped => "skipped",
        }
    }

    /// Terminal records are never selected again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Success | DeliveryStatus::Failed | DeliveryStatus::Skipped
        )
    }
}

/// One queued webhook notification for a single destination
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryRecord {
    pub id: Uuid,

    pub destination_id: Uuid,

    pub tenant_id: Uuid,

    pub event_type: String,

    pub payload: Value,

    pub status: DeliveryStatus,

    pub attempt_count: u32,

    #[serde(default, with = "time::serde::rfc3339::option")]
    pub next_retry_at: Option<OffsetDateTime>,

    #[serde(default)]
    pub response_code: Option<u16>,

    #[serde(default)]
    pub response_body: Option<String>,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl DeliveryRecord {
    /// A freshly produced record: pending, never attempted, eligible now.
    pub fn new(destination_id: Uuid, tenant_id: Uuid, event_type: String, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            destination_id,
            tenant_id,
            event_type,
            payload,
            status: DeliveryStatus::Pending,
            attempt_count: 0,
            next_retry_at: None,
            response_code: None,
            response_body: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn with_attempt_count(mut self, attempt_count: u32) -> Self {
        self.attempt_count = attempt_count;
        self
    }

    pub fn with_next_retry_at(mut self, next_retry_at: Option<OffsetDateTime>) -> Self {
        self.next_retry_at = next_retry_at;
        self
    }

    /// Whether a pass running at `now` may pick this record up.
    ///
    /// Expired `in_progress` leases count as eligible so a crashed pass
    /// cannot strand a record.
    pub fn is_eligible(&self, now: OffsetDateTime) -> bool {
        match self.status {
            DeliveryStatus::Pending => self.next_retry_at.is_none_or(|at| at <= now),
            DeliveryStatus::InProgress => self.next_retry_at.is_some_and(|at| at <= now),
            _ => false,
        }
    }

    /// Serialized payload bytes; the same bytes are signed and sent.
    pub fn payload_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.payload)
    }

    pub fn apply(&mut self, update: &DeliveryUpdate) {
        self.status = update.status;
        self.attempt_count = update.attempt_count;
        self.next_retry_at = update.next_retry_at;
        self.response_code = update.response_code;
        self.response_body = update.response_body.clone();
    }
}

/// Delivery target configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DestinationConfig {
    pub id: Uuid,

    pub url: String,

    #[serde(default)]
    pub secret: Option<String>,

    pub is_active: bool,
}

impl DestinationConfig {
    pub fn new(url: String, secret: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url,
            secret,
            is_active: true,
        }
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// A record as returned by the store, joined with its destination
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingDelivery {
    #[serde(flatten)]
    pub record: DeliveryRecord,

    #[serde(default)]
    pub destination: Option<DestinationConfig>,
}

/// The single post-attempt write applied to a record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryUpdate {
    pub status: DeliveryStatus,

    pub attempt_count: u32,

    #[serde(with = "time::serde::rfc3339::option")]
    pub next_retry_at: Option<OffsetDateTime>,

    pub response_code: Option<u16>,

    pub response_body: Option<String>,
}

impl DeliveryUpdate {
    pub fn success(attempt_count: u32, response_code: u16, body: &str) -> Self {
        Self {
            status: DeliveryStatus::Success,
            attempt_count,
            next_retry_at: None,
            response_code: Some(response_code),
            response_body: Some(truncate_diagnostic(body)),
        }
    }

    pub fn retry(
        attempt_count: u32,
        next_retry_at: OffsetDateTime,
        response_code: Option<u16>,
        diagnostic: &str,
    ) -> Self {
        Self {
            status: DeliveryStatus::Pending,
            attempt_count,
            next_retry_at: Some(next_retry_at),
            response_code,
            response_body: Some(truncate_diagnostic(diagnostic)),
        }
    }

    pub fn failed(attempt_count: u32, response_code: Option<u16>, diagnostic: &str) -> Self {
        Self {
            status: DeliveryStatus::Failed,
            attempt_count,
            next_retry_at: None,
            response_code,
            response_body: Some(truncate_diagnostic(diagnostic)),
        }
    }

    /// Inactive or missing destination. The attempt count is carried over untouched.
    pub fn skipped(attempt_count: u32, note: &str) -> Self {
        Self {
            status: DeliveryStatus::Skipped,
            attempt_count,
            next_retry_at: None,
            response_code: None,
            response_body: Some(truncate_diagnostic(note)),
        }
    }
}

/// Cap a diagnostic string at [`MAX_DIAGNOSTIC_CHARS`] characters
pub fn truncate_diagnostic(text: &str) -> String {
    match text.char_indices().nth(MAX_DIAGNOSTIC_CHARS) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

/// Per-status counts for one batch pass
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchSummary {
    pub success: usize,

    pub failed: usize,

    pub pending: usize,

    pub skipped: usize,
}

impl BatchSummary {
    pub fn record(&mut self, status: DeliveryStatus) {
        match status {
            DeliveryStatus::Success => self.success += 1,
            DeliveryStatus::Failed => self.failed += 1,
            DeliveryStatus::Pending => self.pending += 1,
            DeliveryStatus::Skipped => self.skipped += 1,
            DeliveryStatus::InProgress => {}
        }
    }
}

/// Outcome of one record within a pass
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryResult {
    pub id: Uuid,

    pub status: DeliveryStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary returned by a batch pass
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchReport {
    pub success: bool,

    pub processed: usize,

    pub summary: BatchSummary,

    pub results: Vec<DeliveryResult>,
}

impl BatchReport {
    pub fn empty() -> Self {
        Self::from_results(Vec::new())
    }

    pub fn from_results(results: Vec<DeliveryResult>) -> Self {
        let mut summary = BatchSummary::default();
        for result in &results {
            summary.record(result.status);
        }

        Self {
            success: true,
            processed: results.len(),
            summary,
            results,
        }
    }
}
