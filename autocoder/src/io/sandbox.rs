//! Sandbox executor for generated code and allow-listed commands.
//!
//! The [`SandboxExec`] trait decouples the development cycle from the actual
//! execution backend. Tests use scripted sandboxes that return predetermined
//! results without spawning processes; the real backend writes files under
//! the workspace root and invokes the isolated interpreter.

use std::fs;
use std::process::Command;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::core::command::SandboxCommand;
use crate::core::types::ExecutionResult;
use crate::io::process::run_command_with_timeout;
use crate::io::workspace::Workspace;

/// Timeouts and interpreter selection for sandbox dispatch.
///
/// Package installs get their own, longer timeout; everything else runs
/// under `command_timeout`.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Base interpreter used when the workspace has no environment yet.
    pub interpreter: String,
    pub command_timeout: Duration,
    pub install_timeout: Duration,
    pub output_limit_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            command_timeout: Duration::from_secs(30),
            install_timeout: Duration::from_secs(60),
            output_limit_bytes: 100_000,
        }
    }
}

/// Abstraction over sandbox execution backends.
///
/// Both operations are total: every failure mode comes back as a failed
/// [`ExecutionResult`], never as a panic or error.
pub trait SandboxExec {
    /// Write `source` to `filename` under the workspace root (overwriting any
    /// previous file) and execute it with the isolated interpreter.
    fn run_code(&self, filename: &str, source: &str) -> ExecutionResult;

    /// Dispatch one allow-listed command. Anything outside the allow-list is
    /// rejected before any process is spawned.
    fn run_command(&self, command: &str) -> ExecutionResult;
}

/// Sandbox backed by a workspace directory and its interpreter environment.
pub struct VenvSandbox {
    workspace: Workspace,
    config: SandboxConfig,
}

impl VenvSandbox {
    pub fn new(workspace: Workspace, config: SandboxConfig) -> Self {
        Self { workspace, config }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    fn execute(&self, mut cmd: Command, timeout: Duration) -> ExecutionResult {
        cmd.current_dir(self.workspace.root());
        match run_command_with_timeout(cmd, timeout, self.config.output_limit_bytes) {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                if output.timed_out {
                    warn!(timeout_secs = timeout.as_secs(), "execution timed out");
                    return ExecutionResult {
                        succeeded: false,
                        stdout,
                        stderr,
                        exit_code: None,
                        failure: Some("timeout".to_string()),
                    };
                }
                ExecutionResult {
                    succeeded: output.status.success(),
                    stdout,
                    stderr,
                    exit_code: output.status.code(),
                    failure: None,
                }
            }
            Err(err) => ExecutionResult::failed(format!("{err:#}")),
        }
    }
}

impl SandboxExec for VenvSandbox {
    #[instrument(skip(self, source))]
    fn run_code(&self, filename: &str, source: &str) -> ExecutionResult {
        let path = self.workspace.root().join(filename);
        if let Some(parent) = path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                return ExecutionResult::failed(format!(
                    "create {}: {err}",
                    parent.display()
                ));
            }
        }
        if let Err(err) = fs::write(&path, source) {
            return ExecutionResult::failed(format!("write {}: {err}", path.display()));
        }

        let interpreter = self.workspace.interpreter_path(&self.config.interpreter);
        info!(interpreter = %interpreter.display(), "executing generated code");
        let mut cmd = Command::new(interpreter);
        cmd.arg(&path);
        self.execute(cmd, self.config.command_timeout)
    }

    #[instrument(skip(self))]
    fn run_command(&self, command: &str) -> ExecutionResult {
        let Some(parsed) = SandboxCommand::parse(command) else {
            warn!(command, "rejected command outside the allow-list");
            return ExecutionResult::failed(format!("unsupported command: {}", command.trim()));
        };

        match parsed {
            SandboxCommand::Install { package } => {
                let pip = self.workspace.package_manager_path();
                info!(package, "installing package into the environment");
                let mut cmd = Command::new(pip);
                cmd.arg("install").arg(&package);
                self.execute(cmd, self.config.install_timeout)
            }
            SandboxCommand::Run { script } => {
                let path = self.workspace.root().join(&script);
                if !path.exists() {
                    return ExecutionResult::failed(format!("script not found: {script}"));
                }
                let interpreter = self.workspace.interpreter_path(&self.config.interpreter);
                info!(script, "running existing script");
                let mut cmd = Command::new(interpreter);
                cmd.arg(&path);
                self.execute(cmd, self.config.command_timeout)
            }
        }
    }
}
