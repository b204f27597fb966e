use time::{Duration, OffsetDateTime};

/// Delay before the next attempt, indexed by `attempt_count - 1`: 1 min, 5 min, 15 min, 1 hr, 4 hr.
pub const BACKOFF_SCHEDULE_SECS: [i64; 5] = [60, 300, 900, 3600, 14_400];

/// Attempts after which a failing delivery is given up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Retry strategy for webhook delivery
/// Failed deliveries are rescheduled with increasing delays until the attempt ceiling is hit.
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    max_attempts: u32,

    schedule: Vec<Duration>,
}

impl RetryStrategy {
    /// Create a new retry strategy from a schedule in seconds
    pub fn new(max_attempts: u32, schedule_secs: &[i64]) -> Self {
        Self {
            max_attempts,
            schedule: schedule_secs.iter().map(|s| Duration::seconds(*s)).collect(),
        }
    }

    /// Create default retry strategy
    pub fn default_strategy() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, &BACKOFF_SCHEDULE_SECS)
    }

    /// Override the attempt ceiling
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Get maximum number of attempts
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn schedule(&self) -> &[Duration] {
        &self.schedule
    }

    /// Whether a delivery that has made `attempt_count` attempts is out of retries
    pub fn is_exhausted(&self, attempt_count: u32) -> bool {
        attempt_count >= self.max_attempts
    }

    /// Delay after the `attempt_count`-th failure, clamped to the last schedule entry
    pub fn delay_for(&self, attempt_count: u32) -> Duration {
        let idx = attempt_count.saturating_sub(1) as usize;
        self.schedule
            .get(idx)
            .or_else(|| self.schedule.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// When the delivery becomes eligible again, or `None` once retries are exhausted
    pub fn next_retry_at(&self, attempt_count: u32, now: OffsetDateTime) -> Option<OffsetDateTime> {
        if self.is_exhausted(attempt_count) {
            return None;
        }

        Some(now + self.delay_for(attempt_count))
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::default_strategy()
    }
}
