//! System prompt template for the agent.

use crate::tools::ToolDefinition;

/// Build the system prompt advertising `tools` and the JSON reply protocol.
pub fn build_system_prompt(tools: &[ToolDefinition]) -> String {
    let tools_schema = serde_json::to_string_pretty(tools).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"You are Nebula, an experienced file analyst.
Your mission is to explore the files in the workspace directory to answer the user's questions.

## Available Tools

{tools_schema}

## Response Format

ALWAYS REPLY WITH A SINGLE VALID JSON OBJECT AND NOTHING ELSE.

If you need to use a tool, reply with:
{{"tool": "tool_name", "tool_args": {{"parameter": "value"}}}}

If you already have the final answer, reply with:
{{"answer": "Your friendly final answer here"}}"#,
        tools_schema = tools_schema
    )
}
