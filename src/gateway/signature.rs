//! Webhook signature verification.
//!
//! The processor signs the raw request body with a shared secret and sends
//! the signature header as `t=<unix-ts>,v1=<hex hmac>`. The signed payload is
//! `"{t}.{body}"`; verification recomputes the HMAC-SHA256 and compares in
//! constant time, rejecting stale timestamps outside the tolerance window.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header is malformed")]
    MalformedHeader,
    #[error("signature timestamp outside tolerance window")]
    StaleTimestamp,
    #[error("signature does not match payload")]
    Mismatch,
}

/// Verifies inbound webhook signatures against the shared secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: u64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    /// Verifies `signature_header` against `payload`. Logs nothing itself so
    /// callers control what context (never the secret) reaches the logs.
    pub fn verify(&self, signature_header: &str, payload: &[u8]) -> Result<(), SignatureError> {
        let (timestamp, provided) = parse_header(signature_header)?;

        let now = chrono::Utc::now().timestamp();
        if (now - timestamp).unsigned_abs() > self.tolerance_secs {
            return Err(SignatureError::StaleTimestamp);
        }

        let expected = self.sign_payload(timestamp, payload);
        if constant_time_eq(&expected, provided) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }

    /// Computes the hex signature for a timestamped payload. Exposed so tests
    /// can produce valid headers.
    pub fn sign_payload(&self, timestamp: i64, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Builds a complete signature header for a payload signed now. Test aid.
    pub fn signature_header(&self, payload: &[u8]) -> String {
        let timestamp = chrono::Utc::now().timestamp();
        format!("t={},v1={}", timestamp, self.sign_payload(timestamp, payload))
    }
}

fn parse_header(header: &str) -> Result<(i64, &str), SignatureError> {
    let mut timestamp = None;
    let mut signature = None;
    for part in header.split(',') {
        let mut it = part.trim().splitn(2, '=');
        match (it.next(), it.next()) {
            (Some("t"), Some(val)) => timestamp = val.parse::<i64>().ok(),
            (Some("v1"), Some(val)) => signature = Some(val),
            _ => {}
        }
    }
    match (timestamp, signature) {
        (Some(t), Some(v1)) if !v1.is_empty() => Ok((t, v1)),
        _ => Err(SignatureError::MalformedHeader),
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(SECRET, 300)
    }

    #[test]
    fn valid_signature_verifies() {
        let verifier = verifier();
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = verifier.signature_header(payload);

        assert_eq!(verifier.verify(&header, payload), Ok(()));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let verifier = verifier();
        let header = verifier.signature_header(b"original body");

        assert_eq!(
            verifier.verify(&header, b"tampered body"),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let payload = b"body";
        let header = WebhookVerifier::new("whsec_other", 300).signature_header(payload);

        assert_eq!(
            verifier().verify(&header, payload),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let verifier = verifier();
        let payload = b"body";
        let old = chrono::Utc::now().timestamp() - 3600;
        let header = format!("t={},v1={}", old, verifier.sign_payload(old, payload));

        assert_eq!(
            verifier.verify(&header, payload),
            Err(SignatureError::StaleTimestamp)
        );
    }

    #[test]
    fn malformed_headers_are_rejected() {
        let verifier = verifier();
        for header in ["", "t=abc,v1=", "v1=deadbeef", "t=123", "nonsense"] {
            assert_eq!(
                verifier.verify(header, b"body"),
                Err(SignatureError::MalformedHeader),
                "header {:?} should be malformed",
                header
            );
        }
    }

    #[test]
    fn signature_is_hex_sha256_sized() {
        let sig = verifier().sign_payload(1_700_000_000, b"body");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
