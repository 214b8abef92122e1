mod client;
mod reasoning;
mod repair;
mod retry;
mod stream;
mod types;

pub use client::{CompletionProvider, LlmClient};
pub use repair::{RepairError, repair};
pub use retry::RetryPolicy;
pub use types::{ModelError, ReasoningSnapshot, TurnResult};
