//! Language model client adapter.
//!
//! Every backend implements [`LlmClient::complete`], which turns an ordered
//! conversation into a single text completion. Which backends are used is
//! decided once from [`LlmConfig`]; when several are configured they are
//! wrapped in a [`FallbackClient`] and tried in order.

mod chat;
mod completions;
mod fallback;
mod generate;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{BackendKind, LlmConfig};

pub use chat::ChatClient;
pub use completions::ChatCompletionsClient;
pub use fallback::FallbackClient;
pub use generate::GenerateClient;

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{backend}: request failed: {message}")]
    Network { backend: String, message: String },

    #[error("{backend}: server returned {status}: {message}")]
    Api {
        backend: String,
        status: u16,
        message: String,
    },

    #[error("{backend}: invalid response: {message}")]
    InvalidResponse { backend: String, message: String },

    #[error("no compatible model backend configured")]
    NoBackend,
}

/// A language model backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Short backend name used in logs and errors.
    fn name(&self) -> &str;

    /// Produce one completion for the given conversation.
    async fn complete(&self, messages: &[ChatMessage], model: &str) -> Result<String, LlmError>;
}

/// Build the configured client.
///
/// # Errors
///
/// Returns `LlmError::NoBackend` if no backend is configured, or
/// `LlmError::Network` if the HTTP client cannot be created.
pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let http = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| LlmError::Network {
            backend: "http".to_string(),
            message: e.to_string(),
        })?;

    let mut clients: Vec<Arc<dyn LlmClient>> = config
        .backends
        .iter()
        .map(|kind| {
            let base = HttpBackend::new(
                kind.as_str(),
                &config.base_url,
                config.api_key.clone(),
                http.clone(),
            );
            let client: Arc<dyn LlmClient> = match kind {
                BackendKind::Chat => Arc::new(ChatClient::new(base)),
                BackendKind::ChatCompletions => Arc::new(ChatCompletionsClient::new(base)),
                BackendKind::Generate => Arc::new(GenerateClient::new(base)),
            };
            client
        })
        .collect();

    match clients.len() {
        0 => Err(LlmError::NoBackend),
        1 => Ok(clients.remove(0)),
        _ => Ok(Arc::new(FallbackClient::new(clients)?)),
    }
}

/// Shared HTTP plumbing for the concrete backends.
#[derive(Clone)]
pub(crate) struct HttpBackend {
    name: String,
    base_url: String,
    api_key: Option<String>,
    http: Client,
}

impl HttpBackend {
    pub(crate) fn new(name: &str, base_url: &str, api_key: Option<String>, http: Client) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.to_string(),
            api_key,
            http,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Build URL from base URL and path.
    pub(crate) fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// POST a JSON body and decode a JSON response.
    pub(crate) async fn post_json<Req, Res>(&self, path: &str, body: &Req) -> Result<Res, LlmError>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let url = self.url(path);
        let mut req = self.http.post(&url).json(body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        tracing::debug!(backend = %self.name, url = %url, "Sending completion request");

        let response = req.send().await.map_err(|e| LlmError::Network {
            backend: self.name.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                backend: self.name.clone(),
                status: status.as_u16(),
                message,
            });
        }

        response.json().await.map_err(|e| self.invalid(e.to_string()))
    }

    pub(crate) fn invalid(&self, message: impl Into<String>) -> LlmError {
        LlmError::InvalidResponse {
            backend: self.name.clone(),
            message: message.into(),
        }
    }
}
