//! System prompt assembly.
//!
//! Prompts are plain templates with two placeholders: `{{current_date}}`
//! and `{{support_knowledge}}`. Both the template and the knowledge block
//! can come from files next to the config, with built-in fallbacks.

use std::io;
use std::path::Path;

use chrono::Local;
use tracing::debug;

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a software diagnostic agent. Today is {{current_date}}.

You are given the description of a failure and access to tools for
inspecting the workspace. Investigate step by step: form a hypothesis,
gather evidence with the tools, and refine it. Call one or more tools
each turn until you are confident in the root cause, then call the
`finish` tool and give your final answer.

Rules:
- Ground every claim in evidence you actually observed through tools.
- Prefer reading the exact files and lines implicated by the logs.
- Call the `finish` tool exactly once, when the investigation is done.

{{support_knowledge}}";

/// Fill in the template placeholders. Unknown placeholders are left
/// untouched so a malformed template degrades visibly instead of silently.
pub fn render(template: &str, support_knowledge: &str) -> String {
    let date = Local::now().format("%Y-%m-%d").to_string();
    template
        .replace("{{current_date}}", &date)
        .replace("{{support_knowledge}}", support_knowledge.trim())
        .trim()
        .to_string()
}

/// Load the system prompt, preferring an on-disk template when one is
/// configured and present.
pub fn load(
    prompt_file: Option<&Path>,
    knowledge_file: Option<&Path>,
) -> Result<String, io::Error> {
    let template = match prompt_file {
        Some(path) if path.exists() => {
            debug!(path = %path.display(), "loading system prompt template");
            std::fs::read_to_string(path)?
        }
        _ => DEFAULT_SYSTEM_PROMPT.to_string(),
    };
    let knowledge = match knowledge_file {
        Some(path) if path.exists() => {
            debug!(path = %path.display(), "loading support knowledge");
            std::fs::read_to_string(path)?
        }
        _ => String::new(),
    };
    Ok(render(&template, &knowledge))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn render_substitutes_date_and_knowledge() {
        let rendered = render("date={{current_date}} extra={{support_knowledge}}", "notes");
        assert!(!rendered.contains("{{current_date}}"));
        assert!(rendered.ends_with("extra=notes"));
    }

    #[test]
    fn render_without_knowledge_trims_trailing_placeholder() {
        let rendered = render("prompt body\n\n{{support_knowledge}}", "");
        assert_eq!(rendered, "prompt body");
    }

    #[test]
    fn load_falls_back_to_default_when_files_missing() {
        let prompt = load(
            Some(Path::new("/nonexistent/prompt.md")),
            Some(Path::new("/nonexistent/knowledge.md")),
        )
        .expect("load");
        assert!(prompt.contains("diagnostic agent"));
        assert!(!prompt.contains("{{current_date}}"));
    }

    #[test]
    fn load_prefers_on_disk_template() {
        let dir = tempfile::tempdir().expect("tempdir");
        let prompt_path = dir.path().join("prompt.md");
        let knowledge_path = dir.path().join("knowledge.md");
        let mut prompt_file = std::fs::File::create(&prompt_path).expect("create");
        write!(prompt_file, "custom on {{{{current_date}}}}: {{{{support_knowledge}}}}")
            .expect("write");
        std::fs::write(&knowledge_path, "domain notes").expect("write");

        let prompt = load(Some(&prompt_path), Some(&knowledge_path)).expect("load");
        assert!(prompt.starts_with("custom on "));
        assert!(prompt.ends_with("domain notes"));
    }
}
