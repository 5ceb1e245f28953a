use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::warn;
use uuid::Uuid;

use crate::api::ApiErrorBody;

/// Shared secret expected as `Authorization: Bearer <token>` on `/api/v1`.
#[derive(Clone)]
pub struct ApiToken(Arc<SecretString>);

impl ApiToken {
    pub fn new(token: SecretString) -> Self {
        Self(Arc::new(token))
    }

    pub fn matches(&self, presented: &str) -> bool {
        constant_time_eq(self.0.expose_secret().as_bytes(), presented.as_bytes())
    }
}

fn constant_time_eq(expected: &[u8], presented: &[u8]) -> bool {
    if expected.len() != presented.len() {
        return false;
    }
    expected.iter().zip(presented).fold(0u8, |diff, (a, b)| diff | (a ^ b)) == 0
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub async fn require_api_token(
    State(token): State<ApiToken>,
    request: Request,
    next: Next,
) -> Response {
    let verdict = bearer_token(request.headers()).map(|presented| token.matches(presented));
    let reason = match verdict {
        Some(true) => return next.run(request).await,
        Some(false) => "invalid api token",
        None => "missing api token",
    };

    let correlation_id = format!("api-{}", Uuid::new_v4().simple());
    warn!(
        event_name = "api.unauthorized",
        correlation_id = %correlation_id,
        path = %request.uri().path(),
        reason,
        "api request rejected"
    );
    let body = ApiErrorBody { error: "Missing or invalid API token.", correlation_id };
    (StatusCode::UNAUTHORIZED, [(header::WWW_AUTHENTICATE, "Bearer")], Json(body)).into_response()
}
