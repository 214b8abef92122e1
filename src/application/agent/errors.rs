use thiserror::Error;

use crate::infrastructure::model::ModelError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("model requested unknown tool '{0}' and hallucination tolerance is disabled")]
    UnknownTool(String),
    #[error("arguments for tool '{tool}' failed to parse after validation: {source}")]
    Arguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
}
