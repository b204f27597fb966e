use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 signer for webhook payloads
pub struct HmacSigner {
    secret: String,
}

impl HmacSigner {
    /// New HMAC signer with the given secret
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    /// Hex-encoded HMAC-SHA256 of the payload bytes
    pub fn sign(&self, payload: &[u8]) -> String {
        let mut mac = self.mac();
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Signature formatted as a `sha256=<hex>` header value
    pub fn signature_header(&self, payload: &[u8]) -> String {
        format_signature_header(&self.sign(payload))
    }

    /// Verify a `sha256=<hex>` header against the payload in constant time
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<(), String> {
        let signature = parse_signature_header(header)?;
        let expected = hex::decode(&signature).map_err(|e| format!("Invalid signature hex: {e}"))?;

        let mut mac = self.mac();
        mac.update(payload);
        mac.verify_slice(&expected)
            .map_err(|_| "Invalid signature".to_string())
    }

    fn mac(&self) -> HmacSha256 {
        match HmacSha256::new_from_slice(self.secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC key can be of any size, as per crate documentation"),
        }
    }
}

/// Signature header for a destination, if it has a secret.
///
/// An empty secret is treated as no secret.
pub fn signature_header_for(secret: Option<&str>, payload: &[u8]) -> Option<String> {
    secret
        .filter(|s| !s.is_empty())
        .map(|s| HmacSigner::new(s.to_string()).signature_header(payload))
}

/// Helper function to format signature for HTTP header
pub fn format_signature_header(signature: &str) -> String {
    format!("sha256={}", signature)
}

/// Helper function to parse signature from HTTP header
pub fn parse_signature_header(header: &str) -> Result<String, String> {
    if let Some(sig) = header.strip_prefix("sha256=") {
        Ok(sig.to_string())
    } else {
        Err(format!("Invalid signature header format: {header}"))
    }
}
