mod errors;
mod models;
mod runner;

pub use errors::AgentError;
pub use models::{AgentConfig, AgentOutcome};
pub use runner::Agent;
