//! CLI for the iterative code generation loop.
//!
//! `run` drives one session against an isolated workspace until the task is
//! solved or the attempt budget is exhausted; `status` prints the persisted
//! status document a previous (or running) session left behind.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::warn;

use autocoder::core::types::Task;
use autocoder::cycle::{CancelToken, CycleConfig, CycleStop, run_cycle};
use autocoder::exit_codes;
use autocoder::io::config::load_config;
use autocoder::io::model::HttpModelClient;
use autocoder::io::sandbox::VenvSandbox;
use autocoder::io::search::CommandSearch;
use autocoder::io::tracker::{load_status, status_path};
use autocoder::io::workspace::Workspace;
use autocoder::logging;
use autocoder::session::Session;

#[derive(Parser)]
#[command(
    name = "autocoder",
    version,
    about = "Iterative LLM-driven code generation loop"
)]
struct Cli {
    /// Configuration file; a missing file means defaults.
    #[arg(long, global = true, default_value = "autocoder.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drive a session until the task is solved or the budget is exhausted.
    Run(RunArgs),
    /// Print the persisted status document for a workspace.
    Status {
        #[arg(long, default_value = "workspace")]
        workspace: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Natural-language description of the task.
    #[arg(long)]
    task: String,

    /// Constraints that apply to every attempt.
    #[arg(long, default_value = "")]
    notes: String,

    /// Expected stdout used for validation.
    #[arg(long)]
    expected: Option<String>,

    /// Validate against the model-proposed expected output when present.
    #[arg(long)]
    auto_expect: bool,

    /// Workspace directory, wiped on start except the interpreter environment.
    #[arg(long, default_value = "workspace")]
    workspace: PathBuf,

    /// Override the configured attempt budget.
    #[arg(long)]
    max_attempts: Option<u32>,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => cmd_run(&cli.config, args),
        Command::Status { workspace } => cmd_status(&workspace),
    }
}

fn cmd_run(config_path: &Path, args: RunArgs) -> Result<i32> {
    let mut config = load_config(config_path)?;
    if let Some(max_attempts) = args.max_attempts {
        config.max_attempts = max_attempts;
    }
    config.validate()?;

    let workspace = Workspace::new(&args.workspace)?;
    workspace.initialize().context("initialize workspace")?;
    if let Err(err) = workspace.ensure_env(
        &config.sandbox.interpreter,
        Duration::from_secs(config.sandbox.install_timeout_secs),
    ) {
        // Code still runs under the base interpreter without an environment.
        warn!(err = %format!("{err:#}"), "could not create interpreter environment");
    }

    let task = Task {
        goal: args.task,
        notes: args.notes,
        expected_output: args.expected,
        auto_expect: args.auto_expect,
    };
    let mut session = Session::new(task, workspace.root());

    let model = HttpModelClient::new(config.model.clone())?;
    let mut search = CommandSearch::new(&config.search);
    let sandbox = VenvSandbox::new(workspace, config.sandbox.to_sandbox_config());
    let cycle_config = CycleConfig {
        max_attempts: config.max_attempts,
        iteration_timeout: Duration::from_secs(config.iteration_timeout_secs),
        retry_backoff: Duration::from_secs(config.retry_backoff_secs),
    };

    let outcome = run_cycle(
        &mut session,
        &model,
        &mut search,
        &sandbox,
        &cycle_config,
        &CancelToken::new(),
        |attempt| {
            println!(
                "attempt {}/{}: action={} validated={}",
                attempt.index,
                cycle_config.max_attempts,
                attempt.action.kind(),
                attempt.validated
            );
        },
    )?;

    let solved = matches!(outcome.stop, CycleStop::Solved { .. });
    print!("{}", session.summary(solved));

    match outcome.stop {
        CycleStop::Solved { result } => {
            println!("\noutput:\n{}", result.stdout.trim_end());
            Ok(exit_codes::OK)
        }
        CycleStop::Exhausted => Ok(exit_codes::EXHAUSTED),
        CycleStop::Cancelled => Ok(exit_codes::CANCELLED),
    }
}

fn cmd_status(workspace: &Path) -> Result<i32> {
    let workspace = Workspace::new(workspace)?;
    let status = load_status(&status_path(workspace.root()))?;
    let mut payload = serde_json::to_string_pretty(&status).context("serialize status")?;
    payload.push('\n');
    print!("{payload}");
    Ok(exit_codes::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run() {
        let cli = Cli::parse_from(["autocoder", "run", "--task", "print Hello, World!"]);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.task, "print Hello, World!");
                assert!(!args.auto_expect);
                assert_eq!(args.workspace, PathBuf::from("workspace"));
                assert_eq!(args.max_attempts, None);
            }
            Command::Status { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn parse_run_with_expectations() {
        let cli = Cli::parse_from([
            "autocoder",
            "run",
            "--task",
            "t",
            "--expected",
            "42",
            "--auto-expect",
            "--max-attempts",
            "7",
        ]);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.expected.as_deref(), Some("42"));
                assert!(args.auto_expect);
                assert_eq!(args.max_attempts, Some(7));
            }
            Command::Status { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn parse_status() {
        let cli = Cli::parse_from(["autocoder", "status", "--workspace", "ws"]);
        assert!(matches!(
            cli.command,
            Command::Status { workspace } if workspace == PathBuf::from("ws")
        ));
    }
}
