use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha1::Sha1;
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "X-Twilio-Signature";

type HmacSha1 = Hmac<Sha1>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("request carries no signature header")]
    Missing,
    #[error("signature header is not valid base64")]
    Malformed,
    #[error("signature does not match request")]
    Mismatch,
    #[error("signing key is empty")]
    EmptyKey,
}

/// Verifies carrier webhook signatures.
///
/// The signed string is the full public URL followed by every form
/// parameter name and value, sorted by name, concatenated without
/// separators. Repeated names contribute every value, in sorted order. The signature is the base64 HMAC-SHA1 of that string keyed
/// by the account auth token.
#[derive(Clone, Debug)]
pub struct SignatureValidator {
    auth_token: SecretString,
}

impl SignatureValidator {
    pub fn new(auth_token: SecretString) -> Self {
        Self { auth_token }
    }

    pub fn sign(&self, url: &str, params: &[(String, String)]) -> Result<String, SignatureError> {
        let mac = self.mac(url, params)?;
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    pub fn validate(
        &self,
        url: &str,
        params: &[(String, String)],
        signature: Option<&str>,
    ) -> Result<(), SignatureError> {
        let signature = signature.map(str::trim).filter(|value| !value.is_empty());
        let Some(signature) = signature else {
            return Err(SignatureError::Missing);
        };
        let expected = STANDARD.decode(signature).map_err(|_| SignatureError::Malformed)?;

        self.mac(url, params)?.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
    }

    fn mac(&self, url: &str, params: &[(String, String)]) -> Result<HmacSha1, SignatureError> {
        let key = self.auth_token.expose_secret();
        if key.is_empty() {
            return Err(SignatureError::EmptyKey);
        }

        let mut mac =
            HmacSha1::new_from_slice(key.as_bytes()).map_err(|_| SignatureError::EmptyKey)?;
        mac.update(url.as_bytes());

        let mut sorted = params.iter().collect::<Vec<_>>();
        sorted.sort();
        for (name, value) in sorted {
            mac.update(name.as_bytes());
            mac.update(value.as_bytes());
        }
        Ok(mac)
    }
}
