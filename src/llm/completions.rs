//! OpenAI-compatible backend (`POST /chat/completions`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, HttpBackend, LlmClient, LlmError};

/// Client for OpenAI-compatible chat completion servers.
pub struct ChatCompletionsClient {
    base: HttpBackend,
}

impl ChatCompletionsClient {
    pub(crate) fn new(base: HttpBackend) -> Self {
        Self { base }
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn complete(&self, messages: &[ChatMessage], model: &str) -> Result<String, LlmError> {
        let payload = CompletionRequest {
            model,
            messages,
            stream: false,
        };

        let response: CompletionResponse =
            self.base.post_json("/chat/completions", &payload).await?;

        first_content(response).ok_or_else(|| self.base.invalid("no choices in response"))
    }
}

fn first_content(response: CompletionResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
