use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::sync::Arc;

use clap::Parser;
use deepdiver::application::agent::{Agent, AgentConfig};
use deepdiver::application::prompt;
use deepdiver::cli::Cli;
use deepdiver::config::AppConfig;
use deepdiver::infrastructure::model::LlmClient;
use deepdiver::tools::builtin_registry;
use serde_json::json;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();
    debug!(config = ?cli.config, task_file = ?cli.task_file, "CLI arguments parsed");

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(workspace) = cli.workspace.clone() {
        config.workspace.root = workspace;
    }
    info!(
        model = %config.llm.model,
        workspace = %config.workspace.root.display(),
        "configuration loaded"
    );

    let task = load_task(&cli)?;
    let system_prompt = prompt::load(
        config.workspace.prompt_file.as_deref(),
        config.workspace.knowledge_file.as_deref(),
    )?;

    let tools = builtin_registry(config.workspace.root.clone(), &config.tools)?;
    let provider = Arc::new(LlmClient::new(config.llm.clone()));
    let agent = Agent::new(
        provider,
        tools,
        AgentConfig {
            system_prompt,
            max_steps: config.agent.max_steps,
            tolerate_hallucination: config.agent.tolerate_hallucination,
            stuck_threshold: config.agent.stuck_threshold,
            count_idle_steps: config.agent.count_idle_steps,
            ..AgentConfig::default()
        },
    );

    info!("starting diagnosis run");
    let outcome = agent.run(task).await?;
    let output = json!({ "final_answer": outcome.final_answer });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .init();
    });
}

fn load_task(cli: &Cli) -> Result<String, Box<dyn Error>> {
    if let Some(path) = &cli.task_file {
        info!(path = %path.display(), "loading task from file");
        let content = fs::read_to_string(path)?;
        return Ok(content.trim().to_string());
    }

    if !cli.task.is_empty() {
        return Ok(cli.task.join(" ").trim().to_string());
    }

    if atty::isnt(atty::Stream::Stdin) {
        info!("reading task from standard input");
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer.trim().to_string());
    }

    warn!("no task provided via arguments, file, or stdin");
    Err("task required via arguments, --task-file, or stdin".into())
}
