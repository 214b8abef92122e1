//! Built-in diagnosis tools offered to the model.
//!
//! Every filesystem tool is confined to a configured workspace root;
//! requests that resolve outside it are rejected before any IO happens.

mod finish;
mod glob;
mod grep;
mod read;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use finish::{FINISH_TOOL_NAME, FinishTool};
pub use glob::GlobTool;
pub use grep::GrepTool;
pub use read::ReadTool;

use crate::application::tooling::{ToolError, ToolRegistry};
use crate::config::ToolLimits;

/// Build the standard registry: finish plus the three workspace-inspection
/// tools, with limits taken from config.
pub fn builtin_registry(
    workspace_root: PathBuf,
    limits: &ToolLimits,
) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(FinishTool))?;
    registry.register(Arc::new(GrepTool::new(
        workspace_root.clone(),
        limits.grep_max_lines,
    )))?;
    registry.register(Arc::new(GlobTool::new(workspace_root.clone())))?;
    registry.register(Arc::new(ReadTool::new(
        workspace_root,
        limits.read_max_lines,
    )))?;
    Ok(registry)
}

/// Resolve `candidate` (absolute, or relative to `root`) and verify it stays
/// inside `root`. Symlinks are resolved before the boundary check.
pub(crate) fn confine(tool: &str, root: &Path, candidate: &Path) -> Result<PathBuf, ToolError> {
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };
    let root = root
        .canonicalize()
        .map_err(|err| ToolError::invalid_input(tool, format!("workspace root: {err}")))?;
    let resolved = joined.canonicalize().map_err(|err| {
        ToolError::invalid_input(tool, format!("{}: {err}", joined.display()))
    })?;
    if !resolved.starts_with(&root) {
        return Err(ToolError::invalid_input(
            tool,
            format!("path escapes the workspace root: {}", candidate.display()),
        ));
    }
    Ok(resolved)
}

pub(crate) fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confinement_rejects_escapes_and_accepts_members() {
        let dir = tempfile::tempdir().expect("tempdir");
        let inner = dir.path().join("app.log");
        std::fs::write(&inner, "line").expect("write");

        let ok = confine("read", dir.path(), Path::new("app.log")).expect("confine");
        assert!(ok.ends_with("app.log"));

        let escape = confine("read", dir.path(), Path::new("../outside.log"));
        assert!(escape.is_err());

        let absolute_escape = confine("read", dir.path(), Path::new("/etc/hostname"));
        assert!(absolute_escape.is_err());
    }

    #[test]
    fn builtin_registry_exposes_the_four_tools() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = builtin_registry(dir.path().to_path_buf(), &ToolLimits::default())
            .expect("registry");
        let mut names = registry.names();
        names.sort_unstable();
        assert_eq!(names, vec!["finish", "glob", "grep", "read"]);
    }
}
