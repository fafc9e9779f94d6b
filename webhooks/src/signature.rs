use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::api::WebhookError;
use crate::events::Event;

type HmacSha256 = Hmac<Sha256>;

/// The account's webhook signing key. Only ever used locally to recompute
/// the expected signature, never transmitted.
#[derive(Clone)]
pub struct SigningKey(String);

impl SigningKey {
    pub fn new(key: impl Into<String>) -> Self {
        SigningKey(key.into())
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SigningKey {
    // Keep the secret out of logs
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

impl From<&str> for SigningKey {
    fn from(key: &str) -> Self {
        SigningKey(key.to_owned())
    }
}

impl From<String> for SigningKey {
    fn from(key: String) -> Self {
        SigningKey(key)
    }
}

/// Hex-encoded HMAC-SHA256 over the timestamp then the token, no separator.
pub fn sign(key: &SigningKey, timestamp: &str, token: &str) -> Result<String, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| WebhookError::InvalidSigningKey(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(token.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Recomputes the signature for the event's timestamp and token and compares
/// it, case-sensitively, to the signature the provider sent. The expected
/// value in the mismatch error is for audit logs, not for echoing back to
/// the sender.
pub fn validate(event: &Event, key: &SigningKey) -> Result<(), WebhookError> {
    let expected = sign(key, event.timestamp(), event.token())?;
    if expected == event.signature() {
        return Ok(());
    }
    Err(WebhookError::SignatureMismatch {
        expected,
        received: event.signature().to_owned(),
    })
}
