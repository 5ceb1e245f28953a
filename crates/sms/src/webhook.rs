use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Acknowledgement body for a webhook whose reply is sent out of band.
pub const EMPTY_TWIML: &str = "<Response></Response>";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("webhook payload is missing `{0}`")]
    MissingField(&'static str),
}

/// One inbound text message as posted by the carrier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundSms {
    pub from: String,
    pub to: String,
    pub body: String,
    pub message_sid: Option<String>,
}

impl InboundSms {
    /// Reads the carrier's form fields. `From` is required; an absent `Body`
    /// is treated as an empty message (e.g. media-only MMS).
    /// A repeated field reads as its first value.
    pub fn from_params(params: &[(String, String)]) -> Result<Self, WebhookError> {
        let from = param(params, "From")
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or(WebhookError::MissingField("From"))?;

        Ok(Self {
            from,
            to: param(params, "To").unwrap_or_default().to_string(),
            body: param(params, "Body").map(str::trim).unwrap_or_default().to_string(),
            message_sid: param(params, "MessageSid")
                .filter(|sid| !sid.is_empty())
                .map(str::to_string),
        })
    }

    /// Identifier used to correlate log events for this message.
    pub fn correlation_id(&self) -> String {
        self.message_sid.clone().unwrap_or_else(|| "unassigned".to_string())
    }
}

/// First value posted for `name`.
pub fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
}

/// TwiML that replies inline with `message`.
pub fn twiml_message(message: &str) -> String {
    format!("<Response><Message>{}</Message></Response>", escape_xml(message))
}

fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::{twiml_message, InboundSms, WebhookError};

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect()
    }

    #[test]
    fn parses_standard_twilio_fields() {
        let inbound = InboundSms::from_params(&params(&[
            ("From", "+15550001111"),
            ("To", "+15559998888"),
            ("Body", "  Do you sell mugs?  "),
            ("MessageSid", "SM0001"),
            ("NumMedia", "0"),
        ]))
        .expect("valid payload");

        assert_eq!(inbound.from, "+15550001111");
        assert_eq!(inbound.body, "Do you sell mugs?");
        assert_eq!(inbound.correlation_id(), "SM0001");
    }

    #[test]
    fn missing_sender_is_rejected() {
        let error = InboundSms::from_params(&params(&[("Body", "hello")]))
            .expect_err("sender is required");
        assert_eq!(error, WebhookError::MissingField("From"));
    }

    #[test]
    fn absent_body_reads_as_empty() {
        let inbound =
            InboundSms::from_params(&params(&[("From", "+15550001111")])).expect("valid payload");
        assert!(inbound.body.is_empty());
        assert_eq!(inbound.correlation_id(), "unassigned");
    }

    #[test]
    fn repeated_field_reads_first_value() {
        let inbound = InboundSms::from_params(&params(&[
            ("From", "+15550001111"),
            ("Body", "first"),
            ("Body", "second"),
        ]))
        .expect("valid payload");
        assert_eq!(inbound.body, "first");
    }

    #[test]
    fn inline_reply_is_xml_escaped() {
        assert_eq!(
            twiml_message("Tees < $20 & mugs"),
            "<Response><Message>Tees &lt; $20 &amp; mugs</Message></Response>"
        );
    }
}
