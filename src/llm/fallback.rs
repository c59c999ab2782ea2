//! Ordered fallback across several backends.

use std::sync::Arc;

use async_trait::async_trait;

use super::{ChatMessage, LlmClient, LlmError};

/// Tries each backend in order, moving on only when the current one fails.
pub struct FallbackClient {
    clients: Vec<Arc<dyn LlmClient>>,
}

impl FallbackClient {
    /// # Errors
    ///
    /// Returns `LlmError::NoBackend` for an empty chain.
    pub fn new(clients: Vec<Arc<dyn LlmClient>>) -> Result<Self, LlmError> {
        if clients.is_empty() {
            return Err(LlmError::NoBackend);
        }
        Ok(Self { clients })
    }
}

#[async_trait]
impl LlmClient for FallbackClient {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn complete(&self, messages: &[ChatMessage], model: &str) -> Result<String, LlmError> {
        let mut last_error = LlmError::NoBackend;

        for client in &self.clients {
            match client.complete(messages, model).await {
                Ok(content) => return Ok(content),
                Err(e) => {
                    tracing::warn!(
                        backend = %client.name(),
                        error = %e,
                        "Backend failed, trying next"
                    );
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}
