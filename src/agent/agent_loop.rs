//! Core agent loop implementation.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::config::Config;
use crate::llm::{build_client, ChatMessage, LlmClient, LlmError};
use crate::tools::{default_definitions, ToolError, ToolRegistry, Workspace};

use super::parser::{parse, AgentDecision};
use super::prompt::build_system_prompt;

/// Default upper bound on model calls per question.
pub const DEFAULT_MAX_STEPS: usize = 10;

/// Returned when the step budget runs out.
pub const STEP_LIMIT_MESSAGE: &str = "Step limit reached without a conclusive answer.";

/// Failure to construct the agent.
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Tools(#[from] ToolError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Failure inside a single step; ends the run.
#[derive(Debug, Error)]
enum StepError {
    #[error("model call failed: {0}")]
    Llm(#[from] LlmError),
}

enum StepOutcome {
    Answer(String),
    Continue,
}

/// Outcome of one question.
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// Text returned to the caller
    pub answer: String,

    /// Full conversation at the time the loop stopped
    pub conversation: Vec<ChatMessage>,

    /// Number of model calls made
    pub steps: usize,
}

/// The file-analysis agent.
pub struct Agent {
    model: String,
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    max_steps: usize,
    request_timeout: Option<Duration>,
}

impl Agent {
    /// Create an agent from its parts.
    pub fn new(model: impl Into<String>, llm: Arc<dyn LlmClient>, tools: ToolRegistry) -> Self {
        Self {
            model: model.into(),
            llm,
            tools,
            max_steps: DEFAULT_MAX_STEPS,
            request_timeout: None,
        }
    }

    /// Build the agent described by `config`.
    ///
    /// Creates the workspace directory when missing.
    pub fn from_config(config: &Config) -> Result<Self, InitError> {
        let workspace = Workspace::open(&config.workspace_dir)?;
        let tools = ToolRegistry::from_definitions(workspace, default_definitions())?;
        let llm = build_client(&config.llm)?;

        Ok(Self::new(config.model_name.clone(), llm, tools)
            .with_max_steps(config.max_steps)
            .with_request_timeout(config.request_timeout_secs.map(Duration::from_secs)))
    }

    /// Cap the number of model calls per question (at least one).
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Limit the wall-clock time spent on one question.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Model identifier sent with every completion.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The tool registry the agent dispatches to.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Answer a question. Never fails; errors come back as text.
    pub async fn process_query(&self, question: &str) -> String {
        let Some(limit) = self.request_timeout else {
            return self.run(question).await.answer;
        };

        match tokio::time::timeout(limit, self.run(question)).await {
            Ok(run) => run.answer,
            Err(_) => {
                tracing::warn!(timeout = ?limit, "Question timed out");
                format!("Request timed out after {:?}.", limit)
            }
        }
    }

    /// Run the loop and return the answer together with the conversation.
    pub async fn run(&self, question: &str) -> AgentRun {
        let system_prompt = build_system_prompt(self.tools.list_tools());
        let mut conversation = vec![ChatMessage::system(system_prompt), ChatMessage::user(question)];

        for step in 1..=self.max_steps {
            tracing::info!("Step {}: sending conversation to the model", step);

            match self.step(&mut conversation).await {
                Ok(StepOutcome::Answer(answer)) => {
                    tracing::info!(steps = step, "Final answer produced");
                    return AgentRun {
                        answer,
                        conversation,
                        steps: step,
                    };
                }
                Ok(StepOutcome::Continue) => continue,
                Err(e) => {
                    tracing::error!(step, error = %e, "Agent step failed");
                    return AgentRun {
                        answer: format!("internal error: {}", e),
                        conversation,
                        steps: step,
                    };
                }
            }
        }

        tracing::warn!(max_steps = self.max_steps, "Step limit reached");
        AgentRun {
            answer: STEP_LIMIT_MESSAGE.to_string(),
            conversation,
            steps: self.max_steps,
        }
    }

    /// One model call, plus a tool call if the model asked for one.
    async fn step(&self, conversation: &mut Vec<ChatMessage>) -> Result<StepOutcome, StepError> {
        let content = self.llm.complete(conversation.as_slice(), &self.model).await?;
        tracing::debug!("Model replied: {}", truncate_for_log(&content, 200));

        conversation.push(ChatMessage::assistant(content.clone()));

        match parse(&content) {
            AgentDecision::Unparseable { raw_text } => {
                tracing::debug!("Reply is not a JSON action, using it as the answer");
                Ok(StepOutcome::Answer(raw_text))
            }
            AgentDecision::FinalAnswer { text } => Ok(StepOutcome::Answer(text)),
            AgentDecision::ToolInvocation {
                tool_name,
                arguments,
            } if tool_name.trim().eq_ignore_ascii_case("answer") => {
                let answer = match arguments.get("answer") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => content,
                };
                Ok(StepOutcome::Answer(answer))
            }
            AgentDecision::ToolInvocation {
                tool_name,
                arguments,
            } => {
                let result = self.tools.invoke(&tool_name, &arguments).await;
                tracing::debug!(tool = %tool_name, "Tool result: {}", truncate_for_log(&result, 200));
                conversation.push(ChatMessage::user(observation(&tool_name, &result)));
                Ok(StepOutcome::Continue)
            }
        }
    }
}

fn observation(tool_name: &str, result: &str) -> String {
    format!(
        "OBSERVATION: the tool '{}' returned: {}. Analyze it and respond with 'answer' or call another tool.",
        tool_name, result
    )
}

/// Truncate a string for logging purposes.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays canned replies; errors once the script runs out.
    struct ScriptedClient {
        replies: Mutex<VecDeque<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _: &[ChatMessage], _: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| LlmError::Network {
                    backend: "scripted".to_string(),
                    message: "connection refused".to_string(),
                })
        }
    }

    /// Always asks for the same tool.
    struct LoopingClient;

    #[async_trait]
    impl LlmClient for LoopingClient {
        fn name(&self) -> &str {
            "looping"
        }

        async fn complete(&self, _: &[ChatMessage], _: &str) -> Result<String, LlmError> {
            Ok(r#"{"tool": "list_files", "tool_args": {"pattern": "**/*"}}"#.to_string())
        }
    }

    struct SlowClient;

    #[async_trait]
    impl LlmClient for SlowClient {
        fn name(&self) -> &str {
            "slow"
        }

        async fn complete(&self, _: &[ChatMessage], _: &str) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(r#"{"answer": "too late"}"#.to_string())
        }
    }

    fn agent_with(llm: Arc<dyn LlmClient>) -> (tempfile::TempDir, Agent) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        let tools = ToolRegistry::new(Workspace::open(dir.path()).unwrap());
        (dir, Agent::new("test-model", llm, tools))
    }

    #[tokio::test]
    async fn tool_call_then_answer_takes_two_steps() {
        let llm = ScriptedClient::new(&[
            r#"{"tool": "list_files", "tool_args": {}}"#,
            r#"{"answer": "There is one file: a.txt"}"#,
        ]);
        let (_dir, agent) = agent_with(llm.clone());

        let run = agent.run("What files do I have?").await;

        assert_eq!(run.answer, "There is one file: a.txt");
        assert_eq!(run.steps, 2);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
        let roles: Vec<Role> = run.conversation.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant
            ]
        );
        assert_eq!(run.conversation[1].content, "What files do I have?");
        assert!(run.conversation[3]
            .content
            .starts_with("OBSERVATION: the tool 'list_files' returned: a.txt."));
    }

    #[tokio::test]
    async fn backend_failure_ends_the_run_with_text() {
        let llm = ScriptedClient::new(&[]);
        let (_dir, agent) = agent_with(llm.clone());

        let run = agent.run("hello?").await;

        assert!(run.answer.starts_with("internal error:"));
        assert!(run.answer.contains("connection refused"));
        assert_eq!(run.steps, 1);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
        assert_eq!(run.conversation.len(), 2);
    }

    #[tokio::test]
    async fn step_budget_is_enforced() {
        let (_dir, agent) = agent_with(Arc::new(LoopingClient));

        let run = agent.run("loop forever").await;

        assert_eq!(run.answer, STEP_LIMIT_MESSAGE);
        assert_eq!(run.steps, DEFAULT_MAX_STEPS);
        assert_eq!(run.conversation.len(), 2 + 2 * DEFAULT_MAX_STEPS);
    }

    #[tokio::test]
    async fn custom_step_budget() {
        let (_dir, agent) = agent_with(Arc::new(LoopingClient));
        let agent = agent.with_max_steps(3);

        assert_eq!(agent.process_query("loop").await, STEP_LIMIT_MESSAGE);
    }

    #[tokio::test]
    async fn free_text_reply_is_the_answer() {
        let (_dir, agent) = agent_with(ScriptedClient::new(&["The file says alpha."]));
        assert_eq!(agent.process_query("?").await, "The file says alpha.");
    }

    #[tokio::test]
    async fn answer_named_as_tool_is_final() {
        let (_dir, agent) = agent_with(ScriptedClient::new(&[
            r#"{"tool": "Answer", "tool_args": {"answer": "done"}}"#,
        ]));
        assert_eq!(agent.process_query("?").await, "done");
    }

    #[tokio::test]
    async fn tool_errors_are_fed_back_to_the_model() {
        let (_dir, agent) = agent_with(ScriptedClient::new(&[
            r#"{"tool": "rm", "tool_args": {"path": "/"}}"#,
            r#"{"tool": "read_file", "tool_args": {"filename": "../../etc/passwd"}}"#,
            r#"{"tool": "read_file", "tool_args": {"filename": "a.txt"}}"#,
            r#"{"answer": "alpha"}"#,
        ]));

        let run = agent.run("read things").await;

        assert_eq!(run.answer, "alpha");
        assert_eq!(run.steps, 4);
        assert!(run.conversation[3].content.contains("unknown tool: rm"));
        assert!(run.conversation[5]
            .content
            .contains(&ToolError::PathEscape.to_string()));
        assert!(run.conversation[7].content.contains("returned: alpha."));
    }

    #[tokio::test]
    async fn slow_backend_hits_the_request_timeout() {
        let (_dir, agent) = agent_with(Arc::new(SlowClient));
        let agent = agent.with_request_timeout(Some(Duration::from_millis(20)));

        assert_eq!(
            agent.process_query("?").await,
            "Request timed out after 20ms."
        );
    }

    #[test]
    fn from_config_creates_the_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let workspace_dir = dir.path().join("data");
        let config = Config::new("m".to_string(), workspace_dir.clone());

        let agent = Agent::from_config(&config).unwrap();

        assert!(workspace_dir.is_dir());
        assert_eq!(agent.model(), "m");
        assert_eq!(agent.tools().list_tools().len(), 2);
    }

    #[test]
    fn from_config_reports_unusable_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = Agent::from_config(&Config::new("m".to_string(), blocker)).err();

        assert!(matches!(err, Some(InitError::Tools(ToolError::Workspace { .. }))));
    }

    #[test]
    fn truncate_for_log_respects_char_boundaries() {
        assert_eq!(truncate_for_log("héllo", 2), "h... [truncated]");
        assert_eq!(truncate_for_log("short", 10), "short");
    }
}
