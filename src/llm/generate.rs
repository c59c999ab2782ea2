//! Raw-prompt backend (`POST /api/generate`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, HttpBackend, LlmClient, LlmError};

/// Client for servers that only accept a flat prompt.
pub struct GenerateClient {
    base: HttpBackend,
}

impl GenerateClient {
    pub(crate) fn new(base: HttpBackend) -> Self {
        Self { base }
    }
}

#[async_trait]
impl LlmClient for GenerateClient {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn complete(&self, messages: &[ChatMessage], model: &str) -> Result<String, LlmError> {
        let prompt = flatten_prompt(messages);
        let payload = GenerateRequest {
            model,
            prompt: &prompt,
            stream: false,
        };

        let response: GenerateResponse = self.base.post_json("/api/generate", &payload).await?;
        Ok(response.response)
    }
}

/// Render the conversation as `role: content` lines.
fn flatten_prompt(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}
