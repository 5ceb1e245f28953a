use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smsdesk_core::redact::redact_phone;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The carrier answered and refused the message; retrying will not help.
    #[error("carrier rejected message with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("carrier request failed: {0}")]
    Transport(String),
    #[error("sms delivery is not configured")]
    NotConfigured,
}

impl DeliveryError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            Self::NotConfigured => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub sid: String,
    pub status: String,
}

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<DeliveryReceipt, DeliveryError>;
}

/// Sender used when carrier credentials are absent. Messages are logged and
/// acknowledged locally so the rest of the pipeline can run.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSender;

#[async_trait]
impl SmsSender for NoopSender {
    async fn send(&self, to: &str, body: &str) -> Result<DeliveryReceipt, DeliveryError> {
        info!(
            event_name = "sms.delivery_skipped",
            to = %redact_phone(to),
            chars = body.chars().count(),
            "sms credentials not configured; reply not sent"
        );
        Ok(DeliveryReceipt { sid: "noop".to_string(), status: "skipped".to_string() })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 2, base_delay_ms: 250, max_delay_ms: 2_000 }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Sends `body`, retrying transient failures with exponential backoff.
/// Permanent rejections are returned on the first attempt.
pub async fn send_with_retry(
    sender: &dyn SmsSender,
    policy: &RetryPolicy,
    to: &str,
    body: &str,
) -> Result<DeliveryReceipt, DeliveryError> {
    let mut attempt = 0;
    loop {
        match sender.send(to, body).await {
            Ok(receipt) => {
                debug!(
                    event_name = "sms.delivered",
                    to = %redact_phone(to),
                    sid = %receipt.sid,
                    attempt,
                    "sms reply accepted by carrier"
                );
                return Ok(receipt);
            }
            Err(error) if error.is_retryable() && attempt < policy.max_retries => {
                warn!(
                    event_name = "sms.delivery_retry",
                    to = %redact_phone(to),
                    attempt,
                    max_retries = policy.max_retries,
                    error = %error,
                    "sms delivery failed; retrying"
                );

                let delay = policy.backoff(attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
            Err(error) => {
                warn!(
                    event_name = "sms.delivery_failed",
                    to = %redact_phone(to),
                    attempt,
                    error = %error,
                    "sms delivery failed"
                );
                return Err(error);
            }
        }
    }
}
