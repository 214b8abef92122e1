//! The reason-then-act loop.
//!
//! States: seeded → awaiting-completion → (tool-execution ⇄
//! awaiting-completion) → finished, with step-limit-exceeded as the
//! absorbing give-up state. Tool calls within one turn run strictly
//! sequentially in slot order so a later call (the finish tool in
//! particular) observes the trajectory state left by earlier calls.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::errors::AgentError;
use super::models::{AgentConfig, AgentOutcome};
use crate::application::tooling::ToolRegistry;
use crate::domain::types::{ChatMessage, MessageRole, ToolCall, Trajectory};
use crate::infrastructure::model::{CompletionProvider, TurnResult};

const STEP_LIMIT_ANSWER: &str =
    "I'm stopping due to step limit. Here is my best answer based on the progress above.";

const STUCK_REMINDER: &str = "You have produced the same response several times in a row. \
Step back, reassess the evidence gathered so far, and try a different strategy.";

const NO_FINISH_REMINDER: &str = "You produced an answer without calling the finish tool. \
Call the finish tool once the task is complete, then give your final answer.";

pub struct Agent<P: CompletionProvider> {
    provider: Arc<P>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl<P: CompletionProvider> Agent<P> {
    pub fn new(provider: Arc<P>, tools: ToolRegistry, config: AgentConfig) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Run the full loop for a single user query and return the final
    /// answer. The only failures that escape are backend failures past the
    /// retry budget and non-tolerated protocol violations; everything else
    /// self-heals inside the loop.
    pub async fn run(&self, user_query: impl Into<String>) -> Result<AgentOutcome, AgentError> {
        let mut trajectory = Trajectory::new();
        trajectory.push(ChatMessage::system(self.config.system_prompt.clone()));
        trajectory.push(ChatMessage::user(user_query));

        let tool_schemas = self.tools.as_llm_tools();
        let mut finished = false;
        let mut steps_used = 0usize;
        let mut iterations = 0usize;
        // When idle turns are exempt from the budget, a hard iteration
        // ceiling still guarantees termination.
        let iteration_limit = if self.config.count_idle_steps {
            self.config.max_steps
        } else {
            self.config.max_steps.saturating_mul(2)
        };

        while steps_used < self.config.max_steps && iterations < iteration_limit {
            iterations += 1;
            info!(step = iterations, "agent step started");

            let turn = match self
                .provider
                .complete(trajectory.messages(), &tool_schemas)
                .await
            {
                Ok(turn) => turn,
                Err(err) if err.is_protocol() && self.config.tolerate_hallucination => {
                    warn!(error = %err, "recoverable completion failure, nudging model");
                    trajectory.push(ChatMessage::user(format!(
                        "Your previous response could not be processed: {err}. \
                         Emit well-formed tool calls and continue."
                    )));
                    steps_used += 1;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            if turn.requires_tool_execution() {
                steps_used += 1;
                trajectory.push(assistant_message(&turn));
                for call in &turn.tool_calls {
                    self.dispatch(call, &mut trajectory, &mut finished).await?;
                }
                if self.is_stuck(&trajectory) {
                    warn!(step = iterations, "repeated assistant output, injecting reminder");
                    trajectory.push(ChatMessage::system(STUCK_REMINDER));
                }
                continue;
            }

            if !finished {
                warn!(step = iterations, "answer produced without finish signal");
                trajectory.push(ChatMessage::system(NO_FINISH_REMINDER));
                if self.config.count_idle_steps {
                    steps_used += 1;
                }
                continue;
            }

            info!(step = iterations, "final answer produced");
            return Ok(AgentOutcome {
                final_answer: turn.content.trim().to_string(),
            });
        }

        warn!(
            max_steps = self.config.max_steps,
            "step budget exhausted before completion"
        );
        Ok(AgentOutcome {
            final_answer: STEP_LIMIT_ANSWER.to_string(),
        })
    }

    async fn dispatch(
        &self,
        call: &ToolCall,
        trajectory: &mut Trajectory,
        finished: &mut bool,
    ) -> Result<(), AgentError> {
        let name = call.function.name.as_str();

        let tool = match self.tools.get(name) {
            Ok(tool) => tool,
            Err(_) => {
                warn!(tool = name, "model requested an unknown tool");
                if !self.config.tolerate_hallucination {
                    return Err(AgentError::UnknownTool(name.to_string()));
                }
                trajectory.push(ChatMessage::tool(
                    call.id.clone(),
                    format!(
                        "Tool '{name}' is not available. Available tools: {}. Continue.",
                        self.tools.names().join(", ")
                    ),
                ));
                return Ok(());
            }
        };

        // The completion layer guarantees the arguments parse; this is the
        // fail-closed backstop for that invariant.
        let input: Value =
            serde_json::from_str(&call.function.arguments).map_err(|source| {
                AgentError::Arguments {
                    tool: name.to_string(),
                    source,
                }
            })?;

        debug!(tool = name, arguments = %call.function.arguments, "invoking tool");
        let observation = match tool.invoke(input).await {
            Ok(result) => result.content,
            Err(err) => {
                warn!(tool = name, error = %err, "tool execution failed");
                format!("Tool error: {err}")
            }
        };
        trajectory.push(ChatMessage::tool(call.id.clone(), observation));

        if name == self.config.finish_tool {
            info!(tool = name, "finish signal received");
            *finished = true;
        }
        Ok(())
    }

    /// True when the most recent `stuck_threshold` assistant messages are
    /// identical in both content and reasoning.
    fn is_stuck(&self, trajectory: &Trajectory) -> bool {
        let threshold = self.config.stuck_threshold;
        if threshold < 2 {
            return false;
        }
        let recent: Vec<&ChatMessage> = trajectory
            .messages()
            .iter()
            .rev()
            .filter(|message| message.role == MessageRole::Assistant)
            .take(threshold)
            .collect();
        recent.len() == threshold
            && recent.windows(2).all(|pair| {
                pair[0].content == pair[1].content
                    && pair[0].reasoning_content == pair[1].reasoning_content
            })
    }
}

fn assistant_message(turn: &TurnResult) -> ChatMessage {
    let mut message = ChatMessage::new(MessageRole::Assistant, turn.content.clone());
    if !turn.reasoning.aggregated_text.is_empty() {
        message.reasoning_content = Some(turn.reasoning.aggregated_text.clone());
    }
    if !turn.reasoning.blocks.is_empty() {
        message.reasoning_details = Some(turn.reasoning.blocks.clone());
    }
    if !turn.tool_calls.is_empty() {
        message.tool_calls = Some(turn.tool_calls.clone());
    }
    message
}

#[cfg(test)]
pub(crate) mod reminders {
    pub(crate) const STEP_LIMIT_ANSWER: &str = super::STEP_LIMIT_ANSWER;
    pub(crate) const STUCK_REMINDER: &str = super::STUCK_REMINDER;
    pub(crate) const NO_FINISH_REMINDER: &str = super::NO_FINISH_REMINDER;
}
