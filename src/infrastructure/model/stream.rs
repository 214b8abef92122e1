//! Decoder for one model turn's chunked response stream.
//!
//! Fragments interleave text deltas, reasoning deltas, and tool-call deltas
//! that arrive sliced and out of order across slot indices. The decoder
//! reassembles them by index and finalizes a [`TurnResult`] whose tool calls
//! are emitted sorted by slot index ascending; downstream side effects (the
//! finish tool in particular) depend on that ordering.

use serde::Deserialize;
use tracing::debug;

use super::reasoning::{ReasoningAccumulator, aggregate_text, merge_first_wins};
use super::repair::repair;
use super::types::{ModelError, ReasoningSnapshot, TurnResult};
use crate::domain::types::{ReasoningBlock, TokenUsage, ToolCall, ToolCallFunction};

/// One streamed fragment, as deserialized from an SSE `data:` payload.
/// Unknown fields are ignored so backend-specific extras pass through
/// harmlessly.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub reasoning_details: Option<Vec<ReasoningBlock>>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolCallDelta {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub call_type: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// In-progress record for one tool-call slot.
#[derive(Debug)]
struct ToolCallSlot {
    index: u32,
    id: Option<String>,
    call_type: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Array-backed ordered map from slot index to an in-progress tool call.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    slots: Vec<ToolCallSlot>,
}

impl ToolCallAccumulator {
    fn apply(&mut self, delta: &ToolCallDelta) {
        let position = match self.slots.iter().position(|slot| slot.index == delta.index) {
            Some(position) => position,
            None => {
                self.slots.push(ToolCallSlot {
                    index: delta.index,
                    id: None,
                    call_type: None,
                    name: None,
                    arguments: String::new(),
                });
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[position];

        merge_first_wins(&mut slot.id, delta.id.as_deref());
        merge_first_wins(&mut slot.call_type, delta.call_type.as_deref());
        if let Some(function) = &delta.function {
            let name = function.name.as_deref().filter(|name| !name.is_empty());
            merge_first_wins(&mut slot.name, name);
            if let Some(arguments) = &function.arguments {
                slot.arguments.push_str(arguments);
            }
        }
    }

    /// Finalize into tool calls sorted by slot index, repairing each
    /// argument string. A slot whose arguments cannot be repaired fails the
    /// whole turn: a tool is never dispatched with unparsable input.
    fn finalize(mut self) -> Result<Vec<ToolCall>, ModelError> {
        self.slots.sort_by_key(|slot| slot.index);
        let mut calls = Vec::with_capacity(self.slots.len());
        for slot in self.slots {
            let name = slot.name.unwrap_or_default();
            let arguments = repair(&slot.arguments).map_err(|source| {
                ModelError::ToolArguments {
                    function: name.clone(),
                    source,
                }
            })?;
            calls.push(ToolCall {
                id: slot.id.unwrap_or_default(),
                call_type: slot.call_type.unwrap_or_else(ToolCall::default_type),
                function: ToolCallFunction { name, arguments },
            });
        }
        Ok(calls)
    }
}

/// Accumulates the fragments of one model turn.
#[derive(Debug, Default)]
pub(crate) struct StreamDecoder {
    content: String,
    reasoning: ReasoningAccumulator,
    tool_calls: ToolCallAccumulator,
    usage: Option<TokenUsage>,
    answering: bool,
}

impl StreamDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Apply one fragment. Safe to call in any arrival order; content is
    /// reassembled by slot index, not by fragment position.
    pub(crate) fn apply(&mut self, chunk: &CompletionChunk) {
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }

        let Some(choice) = chunk.choices.first() else {
            return;
        };
        let delta = &choice.delta;

        if let Some(tool_calls) = &delta.tool_calls {
            for tool_call in tool_calls {
                self.tool_calls.apply(tool_call);
            }
        }

        if let Some(details) = &delta.reasoning_details {
            for fragment in details {
                self.reasoning.apply(fragment);
            }
        }
        for plain in [delta.reasoning_content.as_deref(), delta.reasoning.as_deref()] {
            if let Some(text) = plain {
                if !text.is_empty() {
                    self.reasoning.apply_text(text);
                }
            }
        }

        if let Some(content) = &delta.content {
            if !content.is_empty() && !self.answering {
                // Presentation boundary only; never a control decision.
                debug!("reasoning phase ended, first answer delta received");
                self.answering = true;
            }
            self.content.push_str(content);
        }
    }

    /// Finalize the turn. An empty stream (no text, no tool calls) is a
    /// valid empty answer, not an error.
    pub(crate) fn finish(self) -> Result<TurnResult, ModelError> {
        let tool_calls = self.tool_calls.finalize()?;
        let blocks = self.reasoning.into_blocks();
        let reasoning = ReasoningSnapshot {
            aggregated_text: aggregate_text(&blocks),
            blocks,
        };
        Ok(TurnResult {
            content: self.content,
            reasoning,
            tool_calls,
            usage: self.usage,
        })
    }
}
