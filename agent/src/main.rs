//! Sandboxed coding agent CLI.
//!
//! Sends one prompt to the model, lets it call the sandboxed tools, and prints
//! its final answer on stdout.

use std::path::PathBuf;

use agent::exit_codes;
use agent::io::config::{DEFAULT_CONFIG_FILE, load_config};
use agent::io::gemini::GeminiModel;
use agent::io::sandbox::SandboxRoot;
use agent::logging;
use agent::looping::{AgentState, Failure, LoopEvent, run_agent};
use agent::tools::{ToolContext, ToolExecutor, ToolRegistry};
use anyhow::{Context, Result, bail};
use clap::Parser;
use clap::error::ErrorKind;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "agent",
    version,
    about = "Sandboxed tool-calling coding agent"
)]
struct Cli {
    /// What to ask the agent.
    prompt: String,

    /// Print the prompt, tool arguments, tool results and token usage.
    #[arg(long)]
    verbose: bool,

    /// Configuration file. A missing file means defaults.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Sandbox directory, overriding `sandbox_root` from the config.
    #[arg(long)]
    root: Option<PathBuf>,
}

fn main() {
    logging::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                err.exit();
            }
            let _ = err.print();
            std::process::exit(exit_codes::INVALID);
        }
    };

    let code = match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<i32> {
    if cli.prompt.trim().is_empty() {
        bail!("prompt must not be empty");
    }

    let mut config = load_config(&cli.config)?;
    if let Some(root) = &cli.root {
        config.sandbox_root = root.clone();
    }
    let root = SandboxRoot::new(&config.sandbox_root)
        .with_context(|| format!("open sandbox root {}", config.sandbox_root.display()))?;
    debug!(root = %root, "sandbox ready");

    let executor = ToolExecutor::new(ToolRegistry::builtin()?, ToolContext::new(root, &config));
    let model = GeminiModel::from_env(&config.model)?;

    if cli.verbose {
        println!("User prompt: {}", cli.prompt);
    }
    let verbose = cli.verbose;
    let outcome = run_agent(
        &model,
        &executor,
        config.max_iterations,
        &cli.prompt,
        |event| print_event(event, verbose),
    )?;

    Ok(match outcome.state {
        AgentState::Done(answer) => {
            println!("{answer}");
            exit_codes::OK
        }
        AgentState::Failed(failure) => {
            eprintln!("Error: {failure}");
            match failure {
                Failure::ModelUnavailable { .. } => exit_codes::MODEL_UNAVAILABLE,
                Failure::IterationExhausted { .. } => exit_codes::EXHAUSTED,
            }
        }
        AgentState::AwaitingModel | AgentState::HandlingTool(_) => {
            bail!("agent loop stopped in a non-terminal state")
        }
    })
}

fn print_event(event: &LoopEvent<'_>, verbose: bool) {
    match event {
        LoopEvent::ModelResponded { usage, .. } if verbose => {
            println!("Prompt tokens: {}", usage.prompt_tokens);
            println!("Response tokens: {}", usage.response_tokens);
        }
        LoopEvent::ToolStarted { call, .. } => {
            if verbose {
                println!(
                    "Calling function: {}({})",
                    call.name,
                    serde_json::Value::Object(call.args.clone())
                );
            } else {
                println!(" - Calling function: {}", call.name);
            }
        }
        LoopEvent::ToolExecuted { text, .. } if verbose => println!("-> {text}"),
        _ => {}
    }
}
