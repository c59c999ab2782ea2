//! Agent module - the core question-answering loop.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Build a conversation from the system prompt and the user question
//! 2. Ask the model for a JSON action
//! 3. If the model requests a tool, run it and feed the observation back
//! 4. Repeat until the model answers or the step budget is spent

mod agent_loop;
mod parser;
mod prompt;

pub use agent_loop::{Agent, AgentRun, InitError, DEFAULT_MAX_STEPS, STEP_LIMIT_MESSAGE};
pub use parser::{parse, AgentDecision};
pub use prompt::build_system_prompt;
