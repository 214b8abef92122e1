use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::application::tooling::{Tool, ToolError, ToolResult};

const TOOL_NAME: &str = "glob";
const DEFAULT_PATTERN: &str = "**/*";
const DEFAULT_MAX_DEPTH: usize = 3;

#[derive(Debug, Deserialize)]
struct GlobInput {
    #[serde(default = "GlobInput::default_root")]
    root: String,
    #[serde(default)]
    patterns: Option<Vec<String>>,
    #[serde(default = "GlobInput::default_max_depth")]
    max_depth: Option<usize>,
    #[serde(default)]
    include_hidden: bool,
}

impl GlobInput {
    fn default_root() -> String {
        ".".to_string()
    }

    fn default_max_depth() -> Option<usize> {
        Some(DEFAULT_MAX_DEPTH)
    }
}

/// Directory exploration by glob pattern, for getting an overview of what a
/// log or problem directory contains.
pub struct GlobTool {
    root: PathBuf,
}

impl GlobTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "List files and directories under a root matching glob patterns. \
         Useful for discovering which artifacts exist before reading them."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "root": {
                    "type": "string",
                    "description": "Directory to explore, relative to the workspace. Default '.'."
                },
                "patterns": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Glob patterns relative to root, e.g. [\"**/*.log\"]. Default [\"**/*\"]."
                },
                "max_depth": {
                    "type": "integer",
                    "description": "Maximum recursion depth below root. Default 3."
                },
                "include_hidden": {
                    "type": "boolean",
                    "description": "Include dotfiles and dot-directories. Default false."
                }
            }
        })
    }

    async fn invoke(&self, input: Value) -> Result<ToolResult, ToolError> {
        let input: GlobInput = serde_json::from_value(input)
            .map_err(|err| ToolError::invalid_input(TOOL_NAME, err))?;

        let patterns = input
            .patterns
            .filter(|patterns| !patterns.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_PATTERN.to_string()]);
        for pattern in &patterns {
            if Path::new(pattern)
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::RootDir))
            {
                return Ok(ToolResult::failed(format!(
                    "Pattern '{pattern}' is not allowed: patterns must be relative."
                )));
            }
        }

        let root = super::confine(TOOL_NAME, &self.root, Path::new(&input.root))?;
        if !root.is_dir() {
            return Ok(ToolResult::failed("Given root is not a directory."));
        }

        let mut entries = BTreeSet::new();
        for pattern in &patterns {
            let full = root.join(pattern);
            let full = full.to_string_lossy();
            let walked = glob::glob(&full)
                .map_err(|err| ToolError::invalid_input(TOOL_NAME, err))?;
            for entry in walked {
                let path = entry.map_err(|err| ToolError::execution(TOOL_NAME, err))?;
                let relative = match path.strip_prefix(&root) {
                    Ok(relative) => relative.to_path_buf(),
                    Err(_) => continue,
                };
                // Depth counts directory levels below root; a file directly
                // inside one subdirectory sits at depth 1.
                if let Some(limit) = input.max_depth {
                    let depth = relative.components().count().saturating_sub(1);
                    if depth > limit {
                        continue;
                    }
                }
                if !input.include_hidden
                    && relative.components().any(|component| {
                        component
                            .as_os_str()
                            .to_str()
                            .is_some_and(|name| name.starts_with('.'))
                    })
                {
                    continue;
                }
                let mut label = relative.display().to_string();
                if path.is_dir() {
                    label.push('/');
                }
                entries.insert(label);
            }
        }

        if entries.is_empty() {
            return Ok(ToolResult::ok("No entries matched."));
        }
        let count = entries.len();
        let listing: Vec<String> = entries.into_iter().collect();
        Ok(ToolResult::ok(listing.join("\n")).with_meta("entries", json!(count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("logs/archive")).expect("mkdir");
        std::fs::write(dir.path().join("logs/app.log"), "x").expect("write");
        std::fs::write(dir.path().join("logs/archive/old.log"), "x").expect("write");
        std::fs::write(dir.path().join("notes.txt"), "x").expect("write");
        std::fs::write(dir.path().join(".env"), "x").expect("write");
        dir
    }

    #[tokio::test]
    async fn lists_entries_with_directory_markers() {
        let dir = fixture();
        let tool = GlobTool::new(dir.path().to_path_buf());
        let result = tool.invoke(json!({})).await.expect("invoke");
        assert!(result.ok);
        assert!(result.content.contains("logs/"));
        assert!(result.content.contains("notes.txt"));
        assert!(!result.content.contains(".env"));
    }

    #[tokio::test]
    async fn pattern_filter_applies() {
        let dir = fixture();
        let tool = GlobTool::new(dir.path().to_path_buf());
        let result = tool
            .invoke(json!({"patterns": ["**/*.log"]}))
            .await
            .expect("invoke");
        assert!(result.content.contains("logs/app.log"));
        assert!(result.content.contains("logs/archive/old.log"));
        assert!(!result.content.contains("notes.txt"));
    }

    #[tokio::test]
    async fn max_depth_prunes_deep_entries() {
        let dir = fixture();
        let tool = GlobTool::new(dir.path().to_path_buf());
        let result = tool
            .invoke(json!({"patterns": ["**/*.log"], "max_depth": 1}))
            .await
            .expect("invoke");
        assert!(result.content.contains("logs/app.log"));
        assert!(!result.content.contains("archive/old.log"));
    }

    #[tokio::test]
    async fn hidden_entries_appear_only_on_request() {
        let dir = fixture();
        let tool = GlobTool::new(dir.path().to_path_buf());
        let result = tool
            .invoke(json!({"include_hidden": true}))
            .await
            .expect("invoke");
        assert!(result.content.contains(".env"));
    }

    #[tokio::test]
    async fn parent_traversal_patterns_are_rejected() {
        let dir = fixture();
        let tool = GlobTool::new(dir.path().to_path_buf());
        let result = tool
            .invoke(json!({"patterns": ["../**"]}))
            .await
            .expect("invoke");
        assert!(!result.ok);
        assert!(result.content.contains("not allowed"));
    }
}
