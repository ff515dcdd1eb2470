//! Shared deterministic types for the development cycle.
//!
//! These types define stable contracts between the parser, the sandbox, the
//! validator, and the controller. They carry no I/O and remain deterministic
//! across runs.

use serde::{Deserialize, Serialize};

/// Immutable description of what a session is trying to build.
///
/// Created once at session start and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Natural-language goal.
    pub goal: String,
    /// Extra constraints that apply to every attempt (may be empty).
    pub notes: String,
    /// User-supplied expected stdout, when the user provided one.
    pub expected_output: Option<String>,
    /// Validate against the model-proposed expected output when present.
    pub auto_expect: bool,
}

impl Task {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            notes: String::new(),
            expected_output: None,
            auto_expect: false,
        }
    }
}

/// Structured instruction derived from one model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write `source` to `filename` under the workspace root and execute it.
    Code { filename: String, source: String },
    /// Candidate environment command line, checked against the allow-list by
    /// the sandbox before anything is spawned.
    Command { line: String },
    /// Delegate `keywords` to the search collaborator.
    Search { keywords: String },
    /// The reply could not be classified; carries the raw text and why.
    Unparsed { raw: String, reason: String },
}

impl Action {
    /// Short label used in logs and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Code { .. } => "code",
            Action::Command { .. } => "command",
            Action::Search { .. } => "search",
            Action::Unparsed { .. } => "unparsed",
        }
    }
}

/// Outcome of one sandbox invocation. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
    /// Exit code when the child ran to completion (killed children have none).
    pub exit_code: Option<i32>,
    /// Failure reason when no process produced an exit status (timeout,
    /// unsupported command, missing script, spawn error).
    pub failure: Option<String>,
}

impl ExecutionResult {
    /// A result for a failure that happened before or instead of execution.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            failure: Some(reason.into()),
        }
    }

    /// Best available one-line explanation of why this result is not a pass.
    pub fn failure_message(&self) -> String {
        if let Some(reason) = &self.failure {
            return reason.clone();
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        if self.succeeded {
            return format!("output did not match expectation: {}", self.stdout.trim());
        }
        match self.exit_code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated without exit status".to_string(),
        }
    }
}

/// One generate→parse→act→validate iteration and its recorded outcome.
///
/// Appended to the session history, which is append-only and serves as the
/// authoritative audit log for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// 1-indexed iteration number.
    pub index: u32,
    /// The raw model reply this attempt was built from.
    pub raw_reply: String,
    /// Rationale span extracted from the reply, when present.
    pub rationale: Option<String>,
    pub action: Action,
    /// Expected output the model proposed in this reply, when present.
    pub model_expected_output: Option<String>,
    pub next_steps: Vec<String>,
    /// Present for actions that reached the sandbox.
    pub execution: Option<ExecutionResult>,
    pub validated: bool,
}

/// Externally persisted snapshot of where the session stands.
///
/// Mutated once per cycle by the controller and mirrored to disk by the
/// task tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    pub current_step: String,
    pub next_steps: Vec<String>,
    /// Completion fraction in `[0, 1]`.
    pub progress: f64,
    /// Latest model-proposed expected output (last write wins per session).
    pub model_expected_output: Option<String>,
}

impl ProgressState {
    /// State persisted before the first iteration runs.
    pub fn initial() -> Self {
        Self {
            current_step: "initialize".to_string(),
            next_steps: vec![
                "analyze the task requirements".to_string(),
                "write an initial attempt".to_string(),
            ],
            progress: 0.0,
            model_expected_output: None,
        }
    }
}
