//! Tool contract and registry.
//!
//! A tool declares a unique name, a description telling the model when to
//! use it, and a JSON-schema `parameters` object. The registry maps names to
//! handlers; adding a capability means registering another implementor, the
//! agent loop never changes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    Unknown(String),
    #[error("duplicate tool name: {0}")]
    Duplicate(String),
    #[error("invalid input for tool '{tool}': {reason}")]
    InvalidInput { tool: String, reason: String },
    #[error("tool '{tool}' failed: {reason}")]
    Execution { tool: String, reason: String },
    #[error("tool '{tool}' timed out after {seconds}s")]
    Timeout { tool: String, seconds: u64 },
}

impl ToolError {
    pub fn invalid_input(tool: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidInput {
            tool: tool.into(),
            reason: reason.to_string(),
        }
    }

    pub fn execution(tool: impl Into<String>, reason: impl ToString) -> Self {
        Self::Execution {
            tool: tool.into(),
            reason: reason.to_string(),
        }
    }
}

/// Success payload of a tool invocation.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub ok: bool,
    pub content: String,
    pub meta: serde_json::Map<String, Value>,
}

impl ToolResult {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            ok: true,
            content: content.into(),
            meta: serde_json::Map::new(),
        }
    }

    pub fn failed(content: impl Into<String>) -> Self {
        Self {
            ok: false,
            content: content.into(),
            meta: serde_json::Map::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }
}

/// A capability the model may invoke. The loop guarantees `invoke` only
/// ever receives syntactically valid JSON input.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the input object, offered to the model.
    fn parameters(&self) -> Value;

    async fn invoke(&self, input: Value) -> Result<ToolResult, ToolError>;
}

/// Registry mapping tool names to handlers, preserving registration order
/// in the schema list offered to the model.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn Tool>, ToolError> {
        self.index
            .get(name)
            .map(|position| &self.tools[*position])
            .ok_or_else(|| ToolError::Unknown(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool schemas in the chat-completions `tools` wire format.
    pub fn as_llm_tools(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters(),
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input back."
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }

        async fn invoke(&self, input: Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok(input.to_string()))
        }
    }

    #[test]
    fn register_and_resolve() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).expect("register");
        assert!(registry.get("echo").is_ok());
        assert!(matches!(
            registry.get("missing"),
            Err(ToolError::Unknown(_))
        ));
        assert_eq!(registry.names(), ["echo"]);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).expect("first");
        assert!(matches!(
            registry.register(Arc::new(EchoTool)),
            Err(ToolError::Duplicate(_))
        ));
    }

    #[test]
    fn llm_schema_uses_function_wire_format() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).expect("register");
        let schemas = registry.as_llm_tools();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0]["type"], "function");
        assert_eq!(schemas[0]["function"]["name"], "echo");
        assert_eq!(schemas[0]["function"]["parameters"]["type"], "object");
    }
}
