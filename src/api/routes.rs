//! HTTP route handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::Instrument;
use uuid::Uuid;

use crate::agent::Agent;

use super::types::{AskRequest, AskResponse, HealthResponse};

/// Shared application state.
pub struct AppState {
    /// `None` when the agent failed to initialise
    pub agent: Option<Arc<Agent>>,

    /// Configured model identifier, reported by `/health`
    pub model: String,
}

/// GET /health - Report readiness and the configured model.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "online".to_string(),
        model: state.model.clone(),
        agent_ready: state.agent.is_some(),
    })
}

/// POST /api/ask - Answer a question with the agent.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, (StatusCode, String)> {
    let Some(agent) = state.agent.clone() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "Agent was not initialized correctly.".to_string(),
        ));
    };

    let request_id = Uuid::new_v4();
    let answer = async move {
        tracing::info!(question_len = req.question.len(), "Received question");
        agent.process_query(&req.question).await
    }
    .instrument(tracing::info_span!("ask", %request_id))
    .await;

    Ok(Json(AskResponse {
        answer,
        citations: Vec::new(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatMessage, LlmClient, LlmError};
    use crate::tools::{ToolRegistry, Workspace};
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl LlmClient for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, messages: &[ChatMessage], _: &str) -> Result<String, LlmError> {
            let question = &messages[1].content;
            Ok(serde_json::json!({ "answer": format!("you asked: {}", question) }).to_string())
        }
    }

    fn state(agent: Option<Arc<Agent>>) -> State<Arc<AppState>> {
        State(Arc::new(AppState {
            agent,
            model: "test-model".to_string(),
        }))
    }

    #[tokio::test]
    async fn ask_without_agent_is_unavailable() {
        let err = ask(
            state(None),
            Json(AskRequest {
                question: "hi".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn ask_returns_answer_and_empty_citations() {
        let dir = tempfile::tempdir().unwrap();
        let tools = ToolRegistry::new(Workspace::open(dir.path()).unwrap());
        let agent = Arc::new(Agent::new("test-model", Arc::new(Echo), tools));

        let Json(response) = ask(
            state(Some(agent)),
            Json(AskRequest {
                question: "what?".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(
            response,
            AskResponse {
                answer: "you asked: what?".to_string(),
                citations: Vec::new(),
            }
        );
    }

    #[tokio::test]
    async fn health_reports_readiness() {
        let Json(health) = health(state(None)).await;
        assert_eq!(health.status, "online");
        assert_eq!(health.model, "test-model");
        assert!(!health.agent_ready);
    }
}
