//! SMS carrier plumbing - Twilio-compatible webhook and delivery interface
//!
//! - **Webhook** (`webhook`) - inbound form payload parsing and TwiML replies
//! - **Signatures** (`signature`) - `X-Twilio-Signature` verification
//! - **Delivery** (`delivery`) - the `SmsSender` seam plus retry with backoff
//!
//! # Flow
//!
//! ```text
//! Carrier POST → SignatureValidator → InboundSms → Agent Runtime
//!                                                      ↓
//!                          SmsSender::send ← reply text
//! ```

pub mod delivery;
pub mod signature;
pub mod webhook;

pub use delivery::{
    send_with_retry, DeliveryError, DeliveryReceipt, NoopSender, RetryPolicy, SmsSender,
};
pub use signature::{SignatureError, SignatureValidator, SIGNATURE_HEADER};
pub use webhook::{param, twiml_message, InboundSms, WebhookError, EMPTY_TWIML};
