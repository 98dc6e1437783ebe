//! Authentication of Mercado Pago webhook notifications.
//!
//! Mercado Pago signs every notification with HMAC-SHA256, using the webhook secret from the integration panel as
//! the key. The signature arrives in the `x-signature` header as `ts=<unix ms>,v1=<hex digest>`, and covers a
//! manifest built from the resource id, the `x-request-id` header, and the timestamp:
//!
//! ```text
//!   id:{resource id};request-id:{x-request-id};ts:{ts};
//! ```
//!
//! Segments whose value is absent are left out of the manifest. Resource ids containing letters are lower-cased
//! before signing.
use chrono::Utc;
use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;
use thiserror::Error;

use crate::config::WebhookConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("No webhook secret has been configured, and unsigned notifications are not accepted")]
    SecretNotConfigured,
    #[error("The notification is not signed")]
    MissingSignature,
    #[error("The signature header is malformed. {0}")]
    MalformedSignature(String),
    #[error("The signature timestamp is not valid: {0}")]
    InvalidTimestamp(String),
    #[error("The signature timestamp {0} is too far from the current time")]
    Expired(i64),
    #[error("The signature does not match the notification")]
    Mismatch,
}

/// The parts of the `x-signature` header that take part in verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub ts: String,
    pub v1: String,
}

impl SignatureHeader {
    /// Parses `ts=..,v1=..`. The order of the parts does not matter, whitespace around keys and values is ignored,
    /// and unknown parts are skipped.
    pub fn parse(header: &str) -> Result<Self, SignatureError> {
        let mut ts = None;
        let mut v1 = None;
        for part in header.split(',') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            match key.trim() {
                "ts" => ts = Some(value.trim().to_string()),
                "v1" => v1 = Some(value.trim().to_string()),
                _ => {},
            }
        }
        match (ts, v1) {
            (Some(ts), Some(v1)) if !ts.is_empty() && !v1.is_empty() => Ok(Self { ts, v1 }),
            _ => Err(SignatureError::MalformedSignature(format!("Expected ts and v1 in '{header}'"))),
        }
    }
}

/// Builds the string that Mercado Pago signs.
pub fn manifest(data_id: Option<&str>, request_id: Option<&str>, ts: &str) -> String {
    let mut result = String::new();
    if let Some(id) = data_id.map(str::trim).filter(|s| !s.is_empty()) {
        let id = if id.chars().any(|c| c.is_ascii_alphabetic()) { id.to_lowercase() } else { id.to_string() };
        result.push_str(&format!("id:{id};"));
    }
    if let Some(request_id) = request_id.map(str::trim).filter(|s| !s.is_empty()) {
        result.push_str(&format!("request-id:{request_id};"));
    }
    result.push_str(&format!("ts:{ts};"));
    result
}

#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    config: WebhookConfig,
}

impl SignatureVerifier {
    pub fn new(config: WebhookConfig) -> Self {
        Self { config }
    }

    /// Checks the notification signature against the current time. See [`Self::verify_at`].
    pub fn verify(
        &self,
        signature: Option<&str>,
        request_id: Option<&str>,
        data_id: Option<&str>,
    ) -> Result<(), SignatureError> {
        self.verify_at(Utc::now().timestamp_millis(), signature, request_id, data_id)
    }

    /// Checks the notification signature, taking `now_ms` (unix time in milliseconds) as the current time.
    ///
    /// If no secret is configured, the notification is accepted unless strict mode is on. A timestamp exactly
    /// `tolerance` away from `now_ms` is still accepted.
    pub fn verify_at(
        &self,
        now_ms: i64,
        signature: Option<&str>,
        request_id: Option<&str>,
        data_id: Option<&str>,
    ) -> Result<(), SignatureError> {
        if self.config.secret.is_empty() {
            if self.config.strict {
                warn!("🔐️ Refusing notification. No webhook secret is configured and strict mode is on.");
                return Err(SignatureError::SecretNotConfigured);
            }
            warn!("🔐️ No webhook secret is configured. Accepting the notification without checking its signature.");
            return Ok(());
        }
        let header = signature.ok_or(SignatureError::MissingSignature)?;
        let SignatureHeader { ts, v1 } = SignatureHeader::parse(header)?;
        let ts_ms = ts.parse::<i64>().map_err(|_| SignatureError::InvalidTimestamp(ts.clone()))?;
        let tolerance_ms = self.config.tolerance.as_millis() as i128;
        if (i128::from(now_ms) - i128::from(ts_ms)).abs() > tolerance_ms {
            debug!("🔐️ Signature timestamp {ts_ms} is more than {tolerance_ms} ms away from {now_ms}");
            return Err(SignatureError::Expired(ts_ms));
        }
        let manifest = manifest(data_id, request_id, &ts);
        trace!("🔐️ Checking signature over '{manifest}'");
        let digest = hex::decode(&v1).map_err(|_| SignatureError::Mismatch)?;
        let mut mac = HmacSha256::new_from_slice(self.config.secret.reveal().as_bytes())
            .map_err(|e| SignatureError::MalformedSignature(e.to_string()))?;
        mac.update(manifest.as_bytes());
        mac.verify_slice(&digest).map_err(|_| SignatureError::Mismatch)?;
        trace!("🔐️ Notification signature ✅️");
        Ok(())
    }
}
