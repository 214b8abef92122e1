use std::time::Duration;

use thiserror::Error;

use super::repair::RepairError;
use crate::domain::types::{ReasoningBlock, TokenUsage, ToolCall};

/// Snapshot of the reasoning emitted during one turn: the merged blocks in
/// slot-index order plus the derived aggregated text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReasoningSnapshot {
    pub aggregated_text: String,
    pub blocks: Vec<ReasoningBlock>,
}

impl ReasoningSnapshot {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.aggregated_text.is_empty()
    }
}

/// Finalized output of one completion call. Immutable once produced.
#[derive(Debug, Clone, Default)]
pub struct TurnResult {
    pub content: String,
    pub reasoning: ReasoningSnapshot,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
}

impl TurnResult {
    pub fn requires_tool_execution(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("event stream failed: {0}")]
    Stream(String),
    #[error("completion timed out after {0:?}")]
    Timeout(Duration),
    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },
    #[error("backend returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid completion response: {0}")]
    InvalidResponse(String),
    #[error("tool call '{function}' carried unrepairable arguments: {source}")]
    ToolArguments {
        function: String,
        #[source]
        source: RepairError,
    },
}

impl ModelError {
    /// Transport-transient failures are worth retrying; protocol failures are
    /// not, because the backend would reproduce the same output.
    pub fn is_transient(&self) -> bool {
        match self {
            ModelError::Network(source) => {
                source.is_connect() || source.is_timeout() || source.is_request()
            }
            ModelError::Stream(_) | ModelError::Timeout(_) | ModelError::RateLimited { .. } => true,
            ModelError::Api { status, .. } => *status >= 500,
            ModelError::ToolArguments { .. } | ModelError::InvalidResponse(_) => false,
        }
    }

    /// Protocol failures the agent loop may convert into a corrective
    /// trajectory message instead of aborting the run.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            ModelError::ToolArguments { .. } | ModelError::InvalidResponse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_and_rate_limit_are_transient() {
        assert!(ModelError::Timeout(Duration::from_secs(30)).is_transient());
        assert!(ModelError::RateLimited { retry_after: None }.is_transient());
        assert!(ModelError::Stream("connection reset".into()).is_transient());
    }

    #[test]
    fn server_errors_are_transient_client_errors_are_not() {
        let overloaded = ModelError::Api {
            status: 503,
            message: "overloaded".into(),
        };
        let unauthorized = ModelError::Api {
            status: 401,
            message: "bad key".into(),
        };
        assert!(overloaded.is_transient());
        assert!(!unauthorized.is_transient());
    }

    #[test]
    fn protocol_failures_are_never_retried() {
        let arguments = ModelError::ToolArguments {
            function: "grep".into(),
            source: super::super::repair::repair("{\"a\":1").expect_err("unrepairable"),
        };
        assert!(!arguments.is_transient());
        assert!(arguments.is_protocol());

        let empty = ModelError::InvalidResponse("response contained no choices".into());
        assert!(!empty.is_transient());
        assert!(empty.is_protocol());
    }

    #[test]
    fn empty_turn_result_is_valid() {
        let turn = TurnResult::default();
        assert!(!turn.requires_tool_execution());
        assert!(turn.reasoning.is_empty());
        assert!(turn.content.is_empty());
    }
}
