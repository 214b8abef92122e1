use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::application::tooling::{Tool, ToolError, ToolResult};

const TOOL_NAME: &str = "read";
const DEFAULT_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
struct ReadInput {
    file_path: String,
    /// 0-based line offset.
    #[serde(default)]
    offset: usize,
    #[serde(default = "ReadInput::default_limit")]
    limit: usize,
}

impl ReadInput {
    fn default_limit() -> usize {
        DEFAULT_LIMIT
    }
}

/// Paged file reading confined to the workspace root. Large artifacts are
/// read a window at a time; the per-read cap keeps a single observation from
/// flooding the trajectory.
pub struct ReadTool {
    root: PathBuf,
    max_lines: usize,
}

impl ReadTool {
    pub fn new(root: PathBuf, max_lines: usize) -> Self {
        Self { root, max_lines }
    }
}

#[async_trait]
impl Tool for ReadTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Read a file slice by line offset and limit. Use offset/limit to page \
         through files too large to read at once."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the file to read, relative to the workspace."
                },
                "offset": {
                    "type": "integer",
                    "description": "0-based line number to start from. Default 0."
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to return. Default 100."
                }
            },
            "required": ["file_path"]
        })
    }

    async fn invoke(&self, input: Value) -> Result<ToolResult, ToolError> {
        let input: ReadInput = serde_json::from_value(input)
            .map_err(|err| ToolError::invalid_input(TOOL_NAME, err))?;

        let path = super::confine(TOOL_NAME, &self.root, Path::new(&input.file_path))?;
        if super::is_hidden(&path) {
            return Err(ToolError::invalid_input(
                TOOL_NAME,
                "hidden files are not readable",
            ));
        }
        if !path.is_file() {
            return Ok(ToolResult::failed(format!(
                "Not a regular file: {}",
                input.file_path
            )));
        }

        let text = std::fs::read_to_string(&path)
            .map_err(|err| ToolError::execution(TOOL_NAME, format!("{}: {err}", path.display())))?;
        let total = text.lines().count();
        if input.offset > 0 && input.offset >= total {
            return Ok(ToolResult::failed(format!(
                "Offset {} is past the end of the file ({total} lines).",
                input.offset
            )));
        }

        let limit = input.limit.min(self.max_lines).max(1);
        let window: Vec<String> = text
            .lines()
            .enumerate()
            .skip(input.offset)
            .take(limit)
            .map(|(index, line)| format!("{:>6} {line}", index + 1))
            .collect();
        let shown = window.len();
        let mut content = window.join("\n");
        let remaining = total.saturating_sub(input.offset + shown);
        if remaining > 0 {
            content.push_str(&format!(
                "\n... {remaining} more lines, continue with offset {} ...",
                input.offset + shown
            ));
        }

        Ok(ToolResult::ok(content)
            .with_meta("total_lines", json!(total))
            .with_meta("shown", json!(shown)))
    }
}
