//! Conversation inspection and backup endpoints.
//!
//! - `GET  /api/v1/conversations/stats`
//! - `GET  /api/v1/conversations/search?q=`
//! - `GET  /api/v1/conversations/export`
//! - `POST /api/v1/conversations/import`
//! - `GET  /api/v1/conversations/{customer_id}`
//!
//! Every route requires the configured bearer token.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use smsdesk_core::domain::conversation::{Conversation, ConversationLookup};
use smsdesk_core::errors::{ApplicationError, InterfaceError};
use smsdesk_core::redact::redact_phone;
use smsdesk_core::session::{ConversationRecord, SearchHit, SessionStats};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{require_api_token, ApiToken};
use crate::state::AppState;

pub fn router(token: ApiToken) -> Router<AppState> {
    Router::new()
        .route("/api/v1/conversations/stats", get(stats))
        .route("/api/v1/conversations/search", get(search))
        .route("/api/v1/conversations/export", get(export))
        .route("/api/v1/conversations/import", post(import))
        .route("/api/v1/conversations/{customer_id}", get(conversation))
        .route_layer(middleware::from_fn_with_state(token, require_api_token))
}

#[derive(Debug, Deserialize, Default)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationBackup {
    pub exported_at: String,
    pub conversations: Vec<ConversationRecord>,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub conversations: Vec<ConversationRecord>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub imported: usize,
    pub resident: usize,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: &'static str,
    pub correlation_id: String,
}

/// HTTP rendering of [`InterfaceError`]; only the user-safe message leaves
/// the process.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(
            event_name = "api.request_failed",
            correlation_id = %self.0.correlation_id(),
            status = status.as_u16(),
            error = %self.0,
            "api request failed"
        );
        let body = ApiErrorBody {
            error: self.0.user_message(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn correlation_id() -> String {
    format!("api-{}", Uuid::new_v4().simple())
}

pub async fn stats(State(state): State<AppState>) -> Json<SessionStats> {
    Json(state.sessions.stats())
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let needle = query.q.unwrap_or_default();
    let needle = needle.trim();
    if needle.is_empty() {
        return Err(ApiError(InterfaceError::BadRequest {
            message: "query parameter `q` is required".to_string(),
            correlation_id: correlation_id(),
        }));
    }

    Ok(Json(SearchResponse { query: needle.to_string(), hits: state.sessions.search(needle) }))
}

pub async fn conversation(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    match state.sessions.get_conversation(&customer_id) {
        ConversationLookup::Found(conversation) => Ok(Json(conversation)),
        ConversationLookup::NotFound => Err(ApiError(
            ApplicationError::NotFound(format!(
                "no conversation for {}",
                redact_phone(&customer_id)
            ))
            .into_interface(correlation_id()),
        )),
    }
}

pub async fn export(State(state): State<AppState>) -> Json<ConversationBackup> {
    let conversations = state.sessions.export_all();
    info!(
        event_name = "api.conversations_exported",
        correlation_id = "api",
        exported = conversations.len(),
        "conversation backup exported"
    );
    Json(ConversationBackup { exported_at: Utc::now().to_rfc3339(), conversations })
}

pub async fn import(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> Json<ImportResponse> {
    let imported = state.sessions.import_all(request.conversations);
    info!(
        event_name = "api.conversations_imported",
        correlation_id = "api",
        imported,
        "conversation backup imported"
    );
    Json(ImportResponse { imported, resident: state.sessions.len() })
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::bootstrap::router;
    use crate::test_support::{TestApp, API_TOKEN};

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&body).expect("json body"))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {API_TOKEN}"))
            .body(Body::empty())
            .expect("request")
    }

    fn import_request(payload: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/conversations/import")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {API_TOKEN}"))
            .body(Body::from(payload.to_string()))
            .expect("request")
    }

    fn seeded() -> TestApp {
        let app = TestApp::new();
        app.state.sessions.record_turn("+15550001111", "I need a refund", "Let me help.");
        app.state.sessions.record_turn("+15550002222", "Great service", "Thank you!");
        app
    }

    #[tokio::test]
    async fn stats_on_empty_store_are_zeroed() {
        let app = TestApp::new();

        let (status, body) = call(router(app.state.clone()), get("/api/v1/conversations/stats")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active_conversations"], 0);
        assert_eq!(body["total_messages"], 0);
        assert_eq!(body["average_messages_per_conversation"], 0.0);
        assert!(body["oldest_created_at"].is_null());
        assert!(body["newest_activity"].is_null());
    }

    #[tokio::test]
    async fn search_returns_matching_conversations() {
        let app = seeded();

        let (status, body) =
            call(router(app.state.clone()), get("/api/v1/conversations/search?q=refund")).await;

        assert_eq!(status, StatusCode::OK);
        let hits = body["hits"].as_array().expect("hits array");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["customer_id"], "+15550001111");
    }

    #[tokio::test]
    async fn search_without_query_is_bad_request() {
        let app = seeded();

        let (status, body) =
            call(router(app.state.clone()), get("/api/v1/conversations/search?q=%20")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["correlation_id"].as_str().is_some_and(|id| id.starts_with("api-")));
    }

    #[tokio::test]
    async fn conversation_lookup_distinguishes_missing_customers() {
        let app = seeded();

        let (status, body) =
            call(router(app.state.clone()), get("/api/v1/conversations/%2B15550001111")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(2));

        let (status, body) =
            call(router(app.state.clone()), get("/api/v1/conversations/%2B19999999999")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "The requested conversation does not exist.");
    }

    #[tokio::test]
    async fn export_then_import_restores_an_equivalent_store() {
        let source = seeded();
        let (_, backup) =
            call(router(source.state.clone()), get("/api/v1/conversations/export")).await;

        let target = TestApp::new();
        let (status, body) =
            call(router(target.state.clone()), import_request(&backup.to_string())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["imported"], 2);
        assert_eq!(body["resident"], 2);
        assert_eq!(
            target.state.sessions.get_context("+15550002222", 6),
            source.state.sessions.get_context("+15550002222", 6)
        );
    }

    #[tokio::test]
    async fn export_requires_a_bearer_token() {
        let app = seeded();

        let anonymous = Request::builder()
            .uri("/api/v1/conversations/export")
            .body(Body::empty())
            .expect("request");
        let (status, body) = call(router(app.state.clone()), anonymous).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Missing or invalid API token.");
        assert!(body.get("conversations").is_none());

        let wrong = Request::builder()
            .uri("/api/v1/conversations/export")
            .header(header::AUTHORIZATION, "Bearer not-the-token")
            .body(Body::empty())
            .expect("request");
        let (status, _) = call(router(app.state.clone()), wrong).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) =
            call(router(app.state.clone()), get("/api/v1/conversations/export")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["conversations"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn anonymous_import_cannot_overwrite_a_conversation() {
        let app = seeded();

        let anonymous = Request::builder()
            .method("POST")
            .uri("/api/v1/conversations/import")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"conversations":[{"customer_id":"+15550001111"}]}"#))
            .expect("request");
        let (status, _) = call(router(app.state.clone()), anonymous).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(app.state.sessions.get_context("+15550001111", 10).len(), 2);
    }

    #[tokio::test]
    async fn api_is_not_mounted_without_a_token() {
        let app = TestApp::without_api_token();

        let response = router(app.state.clone())
            .oneshot(get("/api/v1/conversations/stats"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn import_fills_in_missing_message_fields() {
        let app = TestApp::new();
        let payload = r#"{"conversations":[
            {"customer_id":"+15550003333","messages":[{"role":"customer","content":"hi"}]},
            {"customer_id":"+15550004444"}
        ]}"#;

        let (status, body) = call(router(app.state.clone()), import_request(payload)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["imported"], 2);
        assert_eq!(body["resident"], 2);
        let context = app.state.sessions.get_context("+15550003333", 6);
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].content, "hi");
    }
}
