use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "deepdiver",
    version,
    about = "ReAct agent for diagnosing software failures from workspace artifacts"
)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Read the task description from a file instead of the arguments.
    #[arg(long)]
    pub task_file: Option<PathBuf>,
    /// Override the workspace root the tools are confined to.
    #[arg(long)]
    pub workspace: Option<PathBuf>,
    /// The task description. Falls back to stdin when piped.
    pub task: Vec<String>,
}
