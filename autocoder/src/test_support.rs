//! Test-only scripted collaborators for exercising the development cycle
//! without a model endpoint, a search backend, or an interpreter.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{Result, anyhow};

use crate::core::types::ExecutionResult;
use crate::io::model::{GenerateRequest, ModelClient};
use crate::io::sandbox::SandboxExec;
use crate::io::search::{SearchHit, SearchProvider};
use crate::io::workspace::Workspace;

/// Model collaborator returning a scripted sequence of replies and transport
/// failures. Exhausting the script behaves like a transport failure.
pub struct ScriptedModel {
    replies: RefCell<VecDeque<Result<String, String>>>,
    always_fail: bool,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<String, String>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            always_fail: false,
        }
    }

    /// A model whose transport never recovers.
    pub fn failing() -> Self {
        Self {
            replies: RefCell::new(VecDeque::new()),
            always_fail: true,
        }
    }
}

impl ModelClient for ScriptedModel {
    fn generate(&self, _request: &GenerateRequest) -> Result<String> {
        if self.always_fail {
            return Err(anyhow!("scripted transport failure"));
        }
        match self.replies.borrow_mut().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(reason)) => Err(anyhow!(reason)),
            None => Err(anyhow!("scripted model has no replies left")),
        }
    }
}

/// Search collaborator with predetermined outcomes; an empty script returns
/// empty result lists.
#[derive(Default)]
pub struct ScriptedSearch {
    results: VecDeque<Result<Vec<SearchHit>, String>>,
}

impl ScriptedSearch {
    pub fn new(results: Vec<Result<Vec<SearchHit>, String>>) -> Self {
        Self {
            results: results.into(),
        }
    }
}

impl SearchProvider for ScriptedSearch {
    fn search(&mut self, _keywords: &str) -> Result<Vec<SearchHit>> {
        match self.results.pop_front() {
            Some(Ok(hits)) => Ok(hits),
            Some(Err(reason)) => Err(anyhow!(reason)),
            None => Ok(Vec::new()),
        }
    }
}

/// Sandbox recording every call and replaying scripted results, so cycle
/// tests can assert exactly what reached the executor.
#[derive(Default)]
pub struct ScriptedSandbox {
    code_results: RefCell<VecDeque<ExecutionResult>>,
    command_results: RefCell<VecDeque<ExecutionResult>>,
    code_calls: RefCell<Vec<(String, String)>>,
    command_calls: RefCell<Vec<String>>,
}

impl ScriptedSandbox {
    pub fn with_code_result(self, result: ExecutionResult) -> Self {
        self.code_results.borrow_mut().push_back(result);
        self
    }

    pub fn with_command_result(self, result: ExecutionResult) -> Self {
        self.command_results.borrow_mut().push_back(result);
        self
    }

    /// `(filename, source)` pairs seen by `run_code`, in call order.
    pub fn code_calls(&self) -> Vec<(String, String)> {
        self.code_calls.borrow().clone()
    }

    /// Command lines seen by `run_command`, in call order.
    pub fn command_calls(&self) -> Vec<String> {
        self.command_calls.borrow().clone()
    }
}

impl SandboxExec for ScriptedSandbox {
    fn run_code(&self, filename: &str, source: &str) -> ExecutionResult {
        self.code_calls
            .borrow_mut()
            .push((filename.to_string(), source.to_string()));
        self.code_results
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| ExecutionResult::failed("scripted sandbox has no code result left"))
    }

    fn run_command(&self, command: &str) -> ExecutionResult {
        self.command_calls.borrow_mut().push(command.to_string());
        self.command_results.borrow_mut().pop_front().unwrap_or_else(|| {
            ExecutionResult::failed("scripted sandbox has no command result left")
        })
    }
}

/// A successful execution that printed `stdout` and exited 0.
pub fn successful_execution(stdout: &str) -> ExecutionResult {
    ExecutionResult {
        succeeded: true,
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: Some(0),
        failure: None,
    }
}

/// A failed execution with `stderr` and a non-zero exit code.
pub fn failed_execution(stderr: &str, exit_code: i32) -> ExecutionResult {
    ExecutionResult {
        succeeded: false,
        stdout: String::new(),
        stderr: stderr.to_string(),
        exit_code: Some(exit_code),
        failure: None,
    }
}

/// Create an initialized workspace inside a fresh temp directory.
pub fn temp_workspace() -> (tempfile::TempDir, Workspace) {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspace = Workspace::new(temp.path()).expect("workspace");
    workspace.initialize().expect("initialize workspace");
    (temp, workspace)
}
