const DEFAULT_MAX_STEPS: usize = 30;
const DEFAULT_STUCK_THRESHOLD: usize = 2;
const DEFAULT_FINISH_TOOL: &str = "finish";

/// Policy knobs for one agent loop.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Static system instructions seeded at the start of every run.
    pub system_prompt: String,
    /// Upper bound on completion calls before the loop gives up.
    pub max_steps: usize,
    /// When `true`, unknown-tool references and recoverable completion
    /// failures become corrective trajectory messages; when `false`, they
    /// abort the run.
    pub tolerate_hallucination: bool,
    /// Number of consecutive identical assistant messages (content and
    /// reasoning) that triggers a change-of-strategy reminder.
    pub stuck_threshold: usize,
    /// Whether a turn with no tool calls and no finish signal consumes a
    /// unit of the step budget. When disabled, total iterations are still
    /// bounded at twice `max_steps` so the loop terminates deterministically.
    pub count_idle_steps: bool,
    /// Name of the designated no-op tool whose invocation signals
    /// completion.
    pub finish_tool: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            max_steps: DEFAULT_MAX_STEPS,
            tolerate_hallucination: true,
            stuck_threshold: DEFAULT_STUCK_THRESHOLD,
            count_idle_steps: true,
            finish_tool: DEFAULT_FINISH_TOOL.to_string(),
        }
    }
}

/// Result of one agent run. Budget exhaustion is reported through the same
/// shape as success; callers are not expected to special-case it.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub final_answer: String,
}
