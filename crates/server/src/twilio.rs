use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use smsdesk_core::config::SmsConfig;
use smsdesk_sms::{DeliveryError, DeliveryReceipt, SmsSender};

const API_BASE: &str = "https://api.twilio.com/2010-04-01";
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Outbound SMS through the carrier Messages REST API.
pub struct TwilioSender {
    client: Client,
    account_sid: String,
    auth_token: SecretString,
    from_number: String,
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct ApiFailure {
    #[serde(default)]
    message: String,
}

impl TwilioSender {
    /// Returns `None` unless the account, token and sender number are all set.
    pub fn from_config(config: &SmsConfig) -> Result<Option<Self>, DeliveryError> {
        let (Some(account_sid), Some(auth_token), Some(from_number)) =
            (&config.account_sid, &config.auth_token, &config.from_number)
        else {
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|error| DeliveryError::Transport(error.to_string()))?;

        Ok(Some(Self {
            client,
            account_sid: account_sid.clone(),
            auth_token: auth_token.clone(),
            from_number: from_number.clone(),
        }))
    }

    pub fn messages_url(&self) -> String {
        format!("{API_BASE}/Accounts/{}/Messages.json", self.account_sid)
    }
}

#[async_trait]
impl SmsSender for TwilioSender {
    async fn send(&self, to: &str, body: &str) -> Result<DeliveryReceipt, DeliveryError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(|error| DeliveryError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiFailure>()
                .await
                .map(|failure| failure.message)
                .unwrap_or_default();
            return Err(DeliveryError::Rejected { status: status.as_u16(), message });
        }

        let resource: MessageResource = response
            .json()
            .await
            .map_err(|error| DeliveryError::Transport(format!("undecodable response: {error}")))?;
        Ok(DeliveryReceipt { sid: resource.sid, status: resource.status })
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use smsdesk_core::config::AppConfig;

    use super::TwilioSender;

    #[test]
    fn missing_credentials_yield_no_sender() {
        let config = AppConfig::default().sms;
        assert!(matches!(TwilioSender::from_config(&config), Ok(None)));
    }

    #[test]
    fn messages_url_is_scoped_to_account() {
        let mut config = AppConfig::default().sms;
        config.account_sid = Some("AC00000000000000000000000000000000".to_string());
        config.auth_token = Some(SecretString::from("token".to_string()));
        config.from_number = Some("+15559998888".to_string());

        let sender = TwilioSender::from_config(&config)
            .expect("client builds")
            .expect("credentials present");

        assert_eq!(
            sender.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC00000000000000000000000000000000/Messages.json"
        );
    }
}
