//! API request and response types.

use serde::{Deserialize, Serialize};

/// Request to ask the agent a question.
#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    /// The user's question
    pub question: String,
}

/// The agent's answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AskResponse {
    /// Final answer text (may carry an error description)
    pub answer: String,

    /// Source references; currently always empty
    #[serde(default)]
    pub citations: Vec<String>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Configured model identifier
    pub model: String,

    /// Whether the agent initialised successfully
    pub agent_ready: bool,
}
