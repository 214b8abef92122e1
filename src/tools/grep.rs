use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use glob::Pattern;
use regex::RegexBuilder;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::application::tooling::{Tool, ToolError, ToolResult};

const TOOL_NAME: &str = "grep";

#[derive(Debug, Deserialize)]
struct GrepInput {
    /// Files or directories to search, absolute or workspace-relative.
    paths: Vec<String>,
    pattern: String,
    #[serde(default)]
    glob: Option<Vec<String>>,
    #[serde(default)]
    ignore_case: bool,
    #[serde(default)]
    context: Option<usize>,
    #[serde(default)]
    before_context: Option<usize>,
    #[serde(default)]
    after_context: Option<usize>,
    #[serde(default)]
    max_count: Option<usize>,
}

/// Regex search over workspace text artifacts, with ripgrep-style context
/// and glob filtering.
pub struct GrepTool {
    root: PathBuf,
    max_lines: usize,
}

impl GrepTool {
    pub fn new(root: PathBuf, max_lines: usize) -> Self {
        Self { root, max_lines }
    }

    fn collect_files(
        &self,
        path: &Path,
        filters: &[Pattern],
        out: &mut BTreeSet<PathBuf>,
    ) -> Result<(), ToolError> {
        if path.is_file() {
            if filters.is_empty() || filters.iter().any(|filter| filter.matches_path(path)) {
                out.insert(path.to_path_buf());
            }
            return Ok(());
        }
        let entries = std::fs::read_dir(path)
            .map_err(|err| ToolError::execution(TOOL_NAME, format!("{}: {err}", path.display())))?;
        for entry in entries {
            let entry = entry
                .map_err(|err| ToolError::execution(TOOL_NAME, err))?;
            let child = entry.path();
            if super::is_hidden(&child) {
                continue;
            }
            let file_type = entry
                .file_type()
                .map_err(|err| ToolError::execution(TOOL_NAME, err))?;
            // Symlinks below the top level are not followed: a link can
            // cycle or point outside the workspace root.
            if file_type.is_symlink() {
                continue;
            }
            if file_type.is_dir() {
                self.collect_files(&child, filters, out)?;
            } else if filters.is_empty()
                || filters.iter().any(|filter| filter.matches_path(&child))
            {
                out.insert(child);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search for a regex pattern in one or more files or directories. \
         Returns matching lines with file path and line number, plus optional \
         context lines."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "paths": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Files or directories to search, relative to the workspace."
                },
                "pattern": {
                    "type": "string",
                    "description": "Regular expression to search for."
                },
                "glob": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Optional glob filters, e.g. [\"**/*.log\"]."
                },
                "ignore_case": {
                    "type": "boolean",
                    "description": "Case-insensitive matching. Default false."
                },
                "context": {
                    "type": "integer",
                    "description": "Lines of context before and after each match."
                },
                "before_context": {"type": "integer"},
                "after_context": {"type": "integer"},
                "max_count": {
                    "type": "integer",
                    "description": "Stop after this many matches."
                }
            },
            "required": ["paths", "pattern"]
        })
    }

    async fn invoke(&self, input: Value) -> Result<ToolResult, ToolError> {
        let input: GrepInput = serde_json::from_value(input)
            .map_err(|err| ToolError::invalid_input(TOOL_NAME, err))?;
        if input.paths.is_empty() {
            return Ok(ToolResult::failed("No paths provided."));
        }

        let regex = RegexBuilder::new(&input.pattern)
            .case_insensitive(input.ignore_case)
            .build()
            .map_err(|err| ToolError::invalid_input(TOOL_NAME, err))?;
        let filters = input
            .glob
            .unwrap_or_default()
            .iter()
            .map(|raw| Pattern::new(raw))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| ToolError::invalid_input(TOOL_NAME, err))?;

        let before = input.before_context.or(input.context).unwrap_or(0);
        let after = input.after_context.or(input.context).unwrap_or(0);

        let mut files = BTreeSet::new();
        for raw in &input.paths {
            let path = super::confine(TOOL_NAME, &self.root, Path::new(raw))?;
            self.collect_files(&path, &filters, &mut files)?;
        }

        let mut rendered: Vec<String> = Vec::new();
        let mut matches = 0usize;
        let budget = input.max_count.unwrap_or(usize::MAX);
        'files: for file in files {
            let text = match std::fs::read_to_string(&file) {
                Ok(text) => text,
                // Binary or unreadable files are skipped, not fatal.
                Err(_) => continue,
            };
            let lines: Vec<&str> = text.lines().collect();
            let display = file.display();
            for (position, line) in lines.iter().enumerate() {
                if !regex.is_match(line) {
                    continue;
                }
                for offset in (1..=before).rev() {
                    if let Some(previous) = position
                        .checked_sub(offset)
                        .and_then(|index| lines.get(index))
                    {
                        rendered.push(format!("{display}-{}-{previous}", position + 1 - offset));
                    }
                }
                rendered.push(format!("{display}:{}:{line}", position + 1));
                for offset in 1..=after {
                    if let Some(next) = lines.get(position + offset) {
                        rendered.push(format!("{display}-{}-{next}", position + 1 + offset));
                    }
                }
                matches += 1;
                if matches >= budget {
                    break 'files;
                }
            }
        }

        if rendered.is_empty() {
            return Ok(ToolResult::ok("No matches found."));
        }
        let truncated = rendered.len() > self.max_lines;
        if truncated {
            rendered.truncate(self.max_lines);
            rendered.push("... output truncated, narrow the search ...".to_string());
        }
        Ok(ToolResult::ok(rendered.join("\n"))
            .with_meta("matches", json!(matches))
            .with_meta("truncated", json!(truncated)))
    }
}
