//! Configuration management for Nebula.
//!
//! Configuration is read from environment variables. A `.env` file in the
//! current directory is loaded first when present.
//! - `MODEL_NAME` - Optional. Model identifier sent to the backend. Defaults to `deepseek-r1-distill-llama-8b`.
//! - `LLM_BASE_URL` - Optional. Base URL of the model server. Defaults to `http://localhost:8000/v1`.
//! - `LLM_API_KEY` - Optional. Bearer token sent to the model server.
//! - `MODEL_BACKEND` - Optional. `chat`, `chat_completions`, `generate`, a comma list of those, or `auto`. Defaults to `auto`.
//! - `LLM_TIMEOUT_SECS` - Optional. Per-call HTTP timeout. Defaults to `60`.
//! - `WORKSPACE_DIR` - Optional. Directory the file tools are confined to. Defaults to `./data`.
//! - `FRONTEND_DIR` - Optional. Static frontend directory. Defaults to `frontend`.
//! - `HOST` - Optional. Server host. Defaults to `0.0.0.0`.
//! - `PORT` - Optional. Server port. Defaults to `5000`.
//! - `MAX_STEPS` - Optional. Maximum agent loop steps. Defaults to `10`.
//! - `REQUEST_TIMEOUT_SECS` - Optional. Wall-clock limit for one question. Unset means no limit.

use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::agent::DEFAULT_MAX_STEPS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Call convention used to talk to the model server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// `POST /api/chat` with a message list.
    Chat,
    /// OpenAI-style `POST /chat/completions`.
    ChatCompletions,
    /// `POST /api/generate` with a flattened prompt.
    Generate,
}

impl BackendKind {
    /// Preference order used by `MODEL_BACKEND=auto`.
    pub const AUTO: [BackendKind; 3] = [
        BackendKind::Chat,
        BackendKind::ChatCompletions,
        BackendKind::Generate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Chat => "chat",
            BackendKind::ChatCompletions => "chat_completions",
            BackendKind::Generate => "generate",
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "chat" => Ok(BackendKind::Chat),
            "chat_completions" | "completions" | "openai" => Ok(BackendKind::ChatCompletions),
            "generate" => Ok(BackendKind::Generate),
            other => Err(format!("unknown backend: {}", other)),
        }
    }
}

/// Model server configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of the model server
    pub base_url: String,

    /// Optional bearer token
    pub api_key: Option<String>,

    /// Backends to try, in order
    pub backends: Vec<BackendKind>,

    /// Per-call HTTP timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/v1".to_string(),
            api_key: None,
            backends: BackendKind::AUTO.to_vec(),
            timeout_secs: 60,
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Model identifier passed to every completion call
    pub model_name: String,

    /// Workspace directory for file operations
    pub workspace_dir: PathBuf,

    /// Static frontend directory, served when it exists
    pub frontend_dir: PathBuf,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum steps for the agent loop
    pub max_steps: usize,

    /// Wall-clock limit for one question
    pub request_timeout_secs: Option<u64>,

    /// Model server configuration
    pub llm: LlmConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a numeric variable does not parse
    /// or `MODEL_BACKEND` names no usable backend.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }

        let model_name = std::env::var("MODEL_NAME")
            .unwrap_or_else(|_| "deepseek-r1-distill-llama-8b".to_string());

        let workspace_dir = std::env::var("WORKSPACE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));

        let frontend_dir = std::env::var("FRONTEND_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("frontend"));

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = parse_var("PORT", "5000")?;

        let max_steps: usize = parse_var("MAX_STEPS", &DEFAULT_MAX_STEPS.to_string())?;
        if max_steps == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_STEPS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let request_timeout_secs = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .map(|v| {
                v.trim().parse::<u64>().map_err(|e| {
                    ConfigError::InvalidValue("REQUEST_TIMEOUT_SECS".to_string(), format!("{}", e))
                })
            })
            .transpose()?;

        let backends = parse_backends(
            &std::env::var("MODEL_BACKEND").unwrap_or_else(|_| "auto".to_string()),
        )
        .map_err(|e| ConfigError::InvalidValue("MODEL_BACKEND".to_string(), e))?;

        let llm = LlmConfig {
            base_url: std::env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000/v1".to_string()),
            api_key: std::env::var("LLM_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            backends,
            timeout_secs: parse_var("LLM_TIMEOUT_SECS", "60")?,
        };

        Ok(Self {
            model_name,
            workspace_dir,
            frontend_dir,
            host,
            port,
            max_steps,
            request_timeout_secs,
            llm,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(model_name: String, workspace_dir: PathBuf) -> Self {
        Self {
            model_name,
            workspace_dir,
            frontend_dir: PathBuf::from("frontend"),
            host: "127.0.0.1".to_string(),
            port: 5000,
            max_steps: DEFAULT_MAX_STEPS,
            request_timeout_secs: None,
            llm: LlmConfig::default(),
        }
    }
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e)))
}

/// Parse a `MODEL_BACKEND` value into an ordered, de-duplicated backend list.
fn parse_backends(value: &str) -> Result<Vec<BackendKind>, String> {
    if value.trim().eq_ignore_ascii_case("auto") {
        return Ok(BackendKind::AUTO.to_vec());
    }

    let mut backends = Vec::new();
    for part in value.split(',').filter(|p| !p.trim().is_empty()) {
        let kind: BackendKind = part.parse()?;
        if !backends.contains(&kind) {
            backends.push(kind);
        }
    }

    if backends.is_empty() {
        return Err("no backend configured".to_string());
    }
    Ok(backends)
}
