//! Chat-style backend (`POST /api/chat`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, HttpBackend, LlmClient, LlmError};

/// Client for servers exposing a native chat endpoint.
pub struct ChatClient {
    base: HttpBackend,
}

impl ChatClient {
    pub(crate) fn new(base: HttpBackend) -> Self {
        Self { base }
    }
}

#[async_trait]
impl LlmClient for ChatClient {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn complete(&self, messages: &[ChatMessage], model: &str) -> Result<String, LlmError> {
        let payload = ChatRequest {
            model,
            messages,
            stream: false,
        };

        let response: ChatResponse = self.base.post_json("/api/chat", &payload).await?;

        response
            .message
            .map(|m| m.content)
            .ok_or_else(|| self.base.invalid("missing message"))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}
