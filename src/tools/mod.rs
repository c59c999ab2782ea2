//! Tools the agent can invoke.
//!
//! The tool set is static: each advertised [`ToolDefinition`] maps to a
//! [`ToolKind`] handler when the registry is built, so a definition without a
//! handler is rejected at startup instead of failing on first use.

mod extract;
mod files;
mod glob;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

pub use extract::{extract_text, ExtractError};
pub use files::{Workspace, DEFAULT_MAX_BYTES};
pub use glob::{Glob, MATCH_ALL};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Error: access outside the workspace directory is not allowed.")]
    PathEscape,

    #[error("Error: file not found: {0}")]
    NotFound(String),

    #[error("Error: not a file: {0}")]
    NotAFile(String),

    #[error("Failed to read file {name}: {message}")]
    ReadFailed { name: String, message: String },

    #[error("Error: workspace directory does not exist.")]
    WorkspaceMissing,

    #[error("cannot prepare workspace {path}: {message}")]
    Workspace { path: String, message: String },

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("missing '{0}' argument")]
    MissingArgument(&'static str),

    #[error("no handler for advertised tool '{0}'")]
    UnknownDefinition(String),

    #[error("tool task failed: {0}")]
    Task(String),
}

/// A tool as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Handler variants backing the advertised tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    ListFiles,
    ReadFile,
}

impl ToolKind {
    pub const ALL: [ToolKind; 2] = [ToolKind::ListFiles, ToolKind::ReadFile];

    /// Resolve a tool name; hyphenated spellings (`read-file`) are accepted.
    pub fn from_name(name: &str) -> Option<Self> {
        match normalize(name).as_str() {
            "list_files" => Some(ToolKind::ListFiles),
            "read_file" => Some(ToolKind::ReadFile),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::ListFiles => "list_files",
            ToolKind::ReadFile => "read_file",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolKind::ListFiles => {
                "List file names in the workspace directory that match a glob pattern. Returns one relative path per line."
            }
            ToolKind::ReadFile => {
                "Read and convert the full content of a file (txt, md, csv, html, pdf, docx, xlsx, pptx, odt, ...) to plain text."
            }
        }
    }

    pub fn parameters_schema(&self) -> Value {
        match self {
            ToolKind::ListFiles => json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "Glob pattern relative to the workspace (e.g. *.txt, **/*). Defaults to **/*"
                    }
                }
            }),
            ToolKind::ReadFile => json!({
                "type": "object",
                "properties": {
                    "filename": {
                        "type": "string",
                        "description": "File name or path relative to the workspace"
                    },
                    "max_bytes": {
                        "type": "integer",
                        "description": "Maximum number of bytes of text to return (default: 2097152)"
                    }
                },
                "required": ["filename"]
            }),
        }
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
        }
    }

    async fn execute(
        &self,
        args: &Map<String, Value>,
        workspace: Arc<Workspace>,
    ) -> Result<String, ToolError> {
        let task = match self {
            ToolKind::ListFiles => {
                let pattern = args
                    .get("pattern")
                    .and_then(Value::as_str)
                    .unwrap_or(MATCH_ALL)
                    .to_string();
                tokio::task::spawn_blocking(move || workspace.list_files(&pattern))
            }
            ToolKind::ReadFile => {
                let filename = ["filename", "relpath", "path"]
                    .iter()
                    .find_map(|key| args.get(*key).and_then(Value::as_str))
                    .ok_or(ToolError::MissingArgument("filename"))?
                    .to_string();
                let max_bytes = args
                    .get("max_bytes")
                    .and_then(Value::as_u64)
                    .filter(|n| *n > 0)
                    .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
                    .unwrap_or(DEFAULT_MAX_BYTES);
                tokio::task::spawn_blocking(move || workspace.read_file(&filename, max_bytes))
            }
        };

        task.await.map_err(|e| ToolError::Task(e.to_string()))
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase().replace('-', "_")
}

/// The default advertised tool set.
pub fn default_definitions() -> Vec<ToolDefinition> {
    ToolKind::ALL.iter().map(ToolKind::definition).collect()
}

/// Routes tool invocations to their handlers.
pub struct ToolRegistry {
    workspace: Arc<Workspace>,
    definitions: Vec<ToolDefinition>,
    handlers: HashMap<String, ToolKind>,
}

impl ToolRegistry {
    /// Registry with the default tool set.
    pub fn new(workspace: Workspace) -> Self {
        let definitions = default_definitions();
        let handlers = ToolKind::ALL
            .iter()
            .map(|kind| (kind.name().to_string(), *kind))
            .collect();
        Self {
            workspace: Arc::new(workspace),
            definitions,
            handlers,
        }
    }

    /// Registry advertising `definitions`.
    ///
    /// # Errors
    ///
    /// Returns `ToolError::UnknownDefinition` if a definition has no handler.
    pub fn from_definitions(
        workspace: Workspace,
        definitions: Vec<ToolDefinition>,
    ) -> Result<Self, ToolError> {
        let mut handlers = HashMap::new();
        for definition in &definitions {
            let kind = ToolKind::from_name(&definition.name)
                .ok_or_else(|| ToolError::UnknownDefinition(definition.name.clone()))?;
            handlers.insert(normalize(&definition.name), kind);
        }
        Ok(Self {
            workspace: Arc::new(workspace),
            definitions,
            handlers,
        })
    }

    /// The advertised tool definitions.
    pub fn list_tools(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Run a tool and return its observation text. Never fails.
    pub async fn invoke(&self, name: &str, arguments: &Map<String, Value>) -> String {
        let Some(kind) = self.handlers.get(&normalize(name)).copied() else {
            tracing::warn!(tool = %name, "Unknown tool requested");
            return format!("unknown tool: {}", name);
        };

        tracing::info!(tool = %kind.name(), "Executing tool");
        match kind.execute(arguments, self.workspace.clone()).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(tool = %kind.name(), error = %e, "Tool execution failed");
                format!("tool execution error: {}", e)
            }
        }
    }
}
