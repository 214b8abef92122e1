pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod tools;

pub use application::agent::{Agent, AgentConfig, AgentError, AgentOutcome};
pub use application::tooling::{Tool, ToolError, ToolRegistry, ToolResult};
pub use config::{AppConfig, ConfigError};
pub use infrastructure::model::{CompletionProvider, LlmClient, ModelError, TurnResult};
