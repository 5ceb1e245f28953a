use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::post,
    Form, Router,
};
use smsdesk_core::redact::redact_phone;
use smsdesk_sms::{param, send_with_retry, InboundSms, EMPTY_TWIML, SIGNATURE_HEADER};
use tracing::{error, info, warn};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook/sms", post(inbound_sms))
}

/// Carrier webhook: verify, answer through the agent, send the reply out of
/// band, then acknowledge with empty TwiML. Form pairs keep their posted
/// order and repeats, since the carrier signs every value.
pub async fn inbound_sms(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Form(params): Form<Vec<(String, String)>>,
) -> Response {
    if let Some(validator) = &state.signatures {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());
        let verified = match signed_url(state.public_base_url.as_deref(), &headers, &uri) {
            Some(url) => validator.validate(&url, &params, signature).map_err(|e| e.to_string()),
            None => Err("request has no host to sign against".to_string()),
        };

        if let Err(reason) = verified {
            warn!(
                event_name = "webhook.signature_rejected",
                correlation_id = param(&params, "MessageSid").unwrap_or("unassigned"),
                reason = %reason,
                "inbound webhook failed signature check"
            );
            return (StatusCode::FORBIDDEN, "Forbidden").into_response();
        }
    }

    let inbound = match InboundSms::from_params(&params) {
        Ok(inbound) => inbound,
        Err(error) => {
            warn!(
                event_name = "webhook.invalid_payload",
                correlation_id = "unassigned",
                error = %error,
                "inbound webhook payload rejected"
            );
            return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
        }
    };
    let correlation_id = inbound.correlation_id();

    info!(
        event_name = "webhook.received",
        correlation_id = %correlation_id,
        customer = %redact_phone(&inbound.from),
        chars = inbound.body.chars().count(),
        "inbound sms received"
    );

    let outcome = state.runtime.handle_inbound(&inbound.from, &inbound.body).await;

    if let Err(error) =
        send_with_retry(state.sender.as_ref(), &state.retry, &inbound.from, &outcome.reply).await
    {
        error!(
            event_name = "webhook.delivery_failed",
            correlation_id = %correlation_id,
            customer = %redact_phone(&inbound.from),
            error = %error,
            "reply could not be delivered"
        );
        return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
    }

    info!(
        event_name = "webhook.replied",
        correlation_id = %correlation_id,
        customer = %redact_phone(&inbound.from),
        escalated = outcome.escalation.is_escalation(),
        fallback = outcome.used_fallback,
        "reply sent"
    );

    ([(header::CONTENT_TYPE, "text/xml")], EMPTY_TWIML).into_response()
}

/// Rebuilds the URL the carrier signed. A configured public base URL wins;
/// otherwise the `Host` header and `X-Forwarded-Proto` are trusted.
fn signed_url(public_base_url: Option<&str>, headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let path = uri.path_and_query().map(|value| value.as_str()).unwrap_or("/");

    if let Some(base) = public_base_url {
        return Some(format!("{}{path}", base.trim_end_matches('/')));
    }

    let host = headers.get(header::HOST)?.to_str().ok()?;
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");
    Some(format!("{scheme}://{host}{path}"))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, HeaderMap, HeaderValue, Request, StatusCode, Uri},
    };
    use secrecy::SecretString;
    use smsdesk_sms::SignatureValidator;
    use tower::ServiceExt;

    use super::signed_url;
    use crate::bootstrap::router;
    use crate::test_support::{TestApp, AUTH_TOKEN, PUBLIC_BASE_URL};

    const FORM: &str =
        "Body=How+much+is+a+mug%3F&From=%2B15550001111&MessageSid=SM123&To=%2B15559998888";
    const VALID_SIGNATURE: &str = "SSrSaK491bS0wHItEsfsyv7QLLI=";

    fn webhook_request(signature: Option<&str>, form: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook/sms")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(signature) = signature {
            builder = builder.header("X-Twilio-Signature", signature);
        }
        builder.body(Body::from(form.to_string())).expect("request")
    }

    #[tokio::test]
    async fn signed_message_is_answered_and_acknowledged_with_twiml() {
        let app = TestApp::with_signatures();

        let response = router(app.state.clone())
            .oneshot(webhook_request(Some(VALID_SIGNATURE), FORM))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("text/xml"))
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        assert_eq!(&body[..], b"<Response></Response>");

        let sent = app.sender.sent.lock().await.clone();
        assert_eq!(sent, vec![("+15550001111".to_string(), "Thanks for reaching out!".to_string())]);
        assert_eq!(app.state.sessions.get_context("+15550001111", 6).len(), 2);
    }

    #[tokio::test]
    async fn bad_signature_is_forbidden_and_nothing_is_recorded() {
        let app = TestApp::with_signatures();

        let response = router(app.state.clone())
            .oneshot(webhook_request(Some("AAAAAAAAAAAAAAAAAAAAAAAAAAA="), FORM))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(app.sender.sent.lock().await.is_empty());
        assert!(app.state.sessions.is_empty());
    }

    #[tokio::test]
    async fn repeated_form_fields_verify_against_every_value() {
        let app = TestApp::with_signatures();
        let pairs = [
            ("Body", "Two pictures"),
            ("From", "+15550001111"),
            ("MediaUrl", "https://media.example.com/1.jpg"),
            ("MediaUrl", "https://media.example.com/2.jpg"),
            ("MessageSid", "SM124"),
        ]
        .map(|(name, value)| (name.to_string(), value.to_string()));
        let signature = SignatureValidator::new(SecretString::from(AUTH_TOKEN.to_string()))
            .sign(&format!("{PUBLIC_BASE_URL}/webhook/sms"), &pairs)
            .expect("sign");
        let form = "Body=Two+pictures&From=%2B15550001111\
            &MediaUrl=https%3A%2F%2Fmedia.example.com%2F1.jpg\
            &MediaUrl=https%3A%2F%2Fmedia.example.com%2F2.jpg&MessageSid=SM124";

        let response = router(app.state.clone())
            .oneshot(webhook_request(Some(signature.as_str()), form))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(app.state.sessions.get_context("+15550001111", 6)[0].content, "Two pictures");
    }

    #[tokio::test]
    async fn missing_signature_is_forbidden() {
        let app = TestApp::with_signatures();

        let response =
            router(app.state.clone()).oneshot(webhook_request(None, FORM)).await.expect("response");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unsigned_requests_pass_when_validation_is_disabled() {
        let app = TestApp::new();

        let response =
            router(app.state.clone()).oneshot(webhook_request(None, FORM)).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn delivery_failure_maps_to_server_error_after_recording_turn() {
        let app = TestApp::with_failing_sender();

        let response =
            router(app.state.clone()).oneshot(webhook_request(None, FORM)).await.expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app.state.sessions.len(), 1);
    }

    #[tokio::test]
    async fn payload_without_sender_is_bad_request() {
        let app = TestApp::new();

        let response = router(app.state.clone())
            .oneshot(webhook_request(None, "Body=hello"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn signed_url_prefers_public_base_url() {
        let uri: Uri = "/webhook/sms?x=1".parse().expect("uri");
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("internal:3000"));

        assert_eq!(
            signed_url(Some("https://bot.example.com/"), &headers, &uri).as_deref(),
            Some("https://bot.example.com/webhook/sms?x=1")
        );
        assert_eq!(
            signed_url(None, &headers, &uri).as_deref(),
            Some("http://internal:3000/webhook/sms?x=1")
        );

        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert_eq!(
            signed_url(None, &headers, &uri).as_deref(),
            Some("https://internal:3000/webhook/sms?x=1")
        );
        assert_eq!(signed_url(None, &HeaderMap::new(), &uri), None);
    }
}
