// Webhook delivery module
//
//   hmac_signer    – signs serialized payloads with the destination secret
//   http_client    – outbound POST with signed headers
//   retry_strategy – backoff schedule and attempt ceiling
//   batch_runner   – one processing pass over the delivery queue

pub mod batch_runner;
pub mod hmac_signer;
pub mod http_client;
pub mod retry_strategy;

// Re-export commonly used types
pub use batch_runner::{BatchRunner, ProcessError};
pub use hmac_signer::{
    HmacSigner, format_signature_header, parse_signature_header, signature_header_for,
};
pub use http_client::{HttpClientError, WebhookHttpClient};
pub use retry_strategy::RetryStrategy;
