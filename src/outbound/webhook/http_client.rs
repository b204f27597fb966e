use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::ports::{DeliveryTransport, OutboundWebhook, TransportResponse};

pub const EVENT_HEADER: &str = "X-Webhook-Event";
pub const DELIVERY_ID_HEADER: &str = "X-Webhook-Delivery-Id";
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Responses larger than this are cut before decoding
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Error type for HTTP client operations
#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// HTTP client wrapper for webhook delivery
pub struct WebhookHttpClient {
    client: Client,
    timeout: Duration,
}

impl WebhookHttpClient {
    /// Create a new HTTP client with default timeout (30 seconds)
    pub fn new() -> Result<Self, HttpClientError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .build()
            .map_err(|e| HttpClientError::RequestFailed(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Send a webhook POST request
    pub async fn send_webhook(
        &self,
        webhook: &OutboundWebhook,
    ) -> Result<TransportResponse, HttpClientError> {
        let url = reqwest::Url::parse(&webhook.url)
            .map_err(|e| HttpClientError::InvalidUrl(format!("{}: {e}", webhook.url)))?;

        debug!(url = %url, delivery_id = %webhook.delivery_id, "Sending webhook");

        let start = Instant::now();

        let mut request = self
            .client
            .post(url.clone())
            .header("Content-Type", "application/json")
            .header(EVENT_HEADER, &webhook.event_type)
            .header(DELIVERY_ID_HEADER, webhook.delivery_id.to_string());

        if let Some(signature) = &webhook.signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let response = request
            .body(webhook.body.clone())
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "Webhook request failed");
                self.classify(e)
            })?;

        let response_time_ms = start.elapsed().as_millis() as u64;
        let status_code = response.status().as_u16();

        debug!(
            url = %url,
            status = %status_code,
            response_time_ms = %response_time_ms,
            "Webhook response received"
        );

        let body = read_response_body(response).await;

        Ok(TransportResponse {
            status_code,
            body,
            response_time_ms,
        })
    }

    fn classify(&self, err: reqwest::Error) -> HttpClientError {
        if err.is_timeout() {
            HttpClientError::Timeout(self.timeout)
        } else if err.is_connect() {
            HttpClientError::NetworkError(err.to_string())
        } else {
            HttpClientError::RequestFailed(err.to_string())
        }
    }

    /// Get configured timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl DeliveryTransport for WebhookHttpClient {
    async fn send(&self, webhook: &OutboundWebhook) -> Result<TransportResponse, HttpClientError> {
        self.send_webhook(webhook).await
    }
}

/// Fixed user agent identifying the sender
pub fn user_agent() -> String {
    format!("WebhookProcessor/{}", env!("CARGO_PKG_VERSION"))
}

/// Read the response body; a failed read is an empty body, not a failed attempt.
///
/// Reading stops once [`MAX_BODY_SIZE`] bytes have arrived.
async fn read_response_body(mut response: Response) -> String {
    let mut body = Vec::new();

    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let room = MAX_BODY_SIZE - body.len();
                if chunk.len() > room {
                    body.extend_from_slice(&chunk[..room]);
                    warn!(max_size = MAX_BODY_SIZE, "Response body too large, truncating");
                    break;
                }
                body.extend_from_slice(&chunk);
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read webhook response body");
                return String::new();
            }
        }
    }

    String::from_utf8_lossy(&body).into_owned()
}
