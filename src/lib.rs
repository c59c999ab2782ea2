//! # Nebula
//!
//! A question-answering agent over a local document workspace.
//!
//! This library provides:
//! - An HTTP API for asking questions and checking readiness
//! - A tool-based agent loop that lists and reads workspace files
//! - Adapters for Ollama-style and OpenAI-compatible model servers
//!
//! ## Architecture
//!
//! The agent follows the "tools in a loop" pattern:
//! 1. Receive a question via the API
//! 2. Build context with system prompt and available tools
//! 3. Call the model, parse its JSON reply, execute any tool call
//! 4. Feed the observation back to the model, repeat until it answers
//!
//! ## Example
//!
//! ```rust,ignore
//! use nebula::{agent::Agent, config::Config};
//!
//! let config = Config::from_env()?;
//! let agent = Agent::from_config(&config)?;
//! let answer = agent.process_query("Which reports mention Q3 revenue?").await;
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod llm;
pub mod tools;

pub use config::Config;
