use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::application::tooling::{Tool, ToolError, ToolResult};

pub const FINISH_TOOL_NAME: &str = "finish";

#[derive(Debug, Deserialize)]
struct FinishInput {
    #[serde(default = "FinishInput::default_status")]
    status: String,
}

impl FinishInput {
    fn default_status() -> String {
        "success".to_string()
    }
}

/// No-op tool whose invocation tells the loop the investigation is over.
/// The model is instructed to call it exactly once, right before giving the
/// final answer.
pub struct FinishTool;

#[async_trait]
impl Tool for FinishTool {
    fn name(&self) -> &str {
        FINISH_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Mark the task as complete. Call this once, right before giving your \
         final answer."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "enum": ["success", "failure"],
                    "description": "Whether the investigation reached a conclusion."
                }
            },
            "required": ["status"]
        })
    }

    async fn invoke(&self, input: Value) -> Result<ToolResult, ToolError> {
        let input: FinishInput = serde_json::from_value(input)
            .map_err(|err| ToolError::invalid_input(FINISH_TOOL_NAME, err))?;
        Ok(ToolResult::ok(format!("Task marked as finished ({}).", input.status)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finish_accepts_status_and_defaults_it() {
        let tool = FinishTool;
        let explicit = tool
            .invoke(serde_json::json!({"status": "failure"}))
            .await
            .expect("invoke");
        assert!(explicit.ok);
        assert!(explicit.content.contains("failure"));

        let defaulted = tool.invoke(serde_json::json!({})).await.expect("invoke");
        assert!(defaulted.content.contains("success"));
    }
}
