use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub active_conversations: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub port: u16,
    pub environment: String,
    pub active_conversations: usize,
    pub sms_configured: bool,
    pub llm_configured: bool,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health)).route("/status", get(status))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
        active_conversations: state.sessions.len(),
    })
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "running",
        port: state.service.port,
        environment: state.service.environment.clone(),
        active_conversations: state.sessions.len(),
        sms_configured: state.service.sms_configured,
        llm_configured: state.service.llm_configured,
    })
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, Json};

    use crate::health::{health, status};
    use crate::test_support::TestApp;

    #[tokio::test]
    async fn health_reports_resident_conversation_count() {
        let app = TestApp::new();
        app.state.sessions.record_turn("+15550001111", "hi", "hello");
        app.state.sessions.record_turn("+15550002222", "hi", "hello");

        let Json(payload) = health(State(app.state.clone())).await;

        assert_eq!(payload.status, "healthy");
        assert_eq!(payload.active_conversations, 2);
        assert!(!payload.timestamp.is_empty());
    }

    #[tokio::test]
    async fn status_reflects_integration_readiness() {
        let app = TestApp::new();

        let Json(payload) = status(State(app.state.clone())).await;

        assert_eq!(payload.status, "running");
        assert_eq!(payload.port, 3000);
        assert_eq!(payload.environment, "test");
        assert_eq!(payload.active_conversations, 0);
        assert!(!payload.sms_configured);
        assert!(!payload.llm_configured);
    }
}
