//! End-to-end development cycle tests against a real workspace and sandbox.
//!
//! The model and search collaborators are scripted; everything else (file
//! writes, subprocess execution, status persistence) is real. The sandbox
//! interpreter is `sh` so the tests run without any Python installation.

use std::time::Duration;

use autocoder::core::types::Task;
use autocoder::cycle::{CancelToken, CycleConfig, CycleStop, run_cycle};
use autocoder::io::sandbox::{SandboxConfig, VenvSandbox};
use autocoder::io::search::SearchHit;
use autocoder::io::tracker::{load_status, status_path};
use autocoder::io::workspace::Workspace;
use autocoder::session::Session;
use autocoder::test_support::{ScriptedModel, ScriptedSearch, temp_workspace};

fn sh_sandbox(workspace: Workspace) -> VenvSandbox {
    VenvSandbox::new(
        workspace,
        SandboxConfig {
            interpreter: "sh".to_string(),
            command_timeout: Duration::from_secs(5),
            ..SandboxConfig::default()
        },
    )
}

fn quick_config(max_attempts: u32) -> CycleConfig {
    CycleConfig {
        max_attempts,
        iteration_timeout: Duration::from_secs(5),
        retry_backoff: Duration::from_millis(1),
    }
}

fn code_reply(filename: &str, body: &str) -> String {
    format!(
        "<think>Write and run the script.</think>\n[ACTION]\nCODE\n[CONTENT]\n# filename: {filename}\n```\n{body}\n```\n[NEXT STEPS]\n- confirm the output\n"
    )
}

/// The canonical greeting scenario: one CODE reply, executed for real,
/// validated with no expected output configured, solved on iteration 1.
#[test]
fn hello_world_session_solves_on_first_iteration() {
    let (temp, workspace) = temp_workspace();
    let mut session = Session::new(Task::new("print Hello, World!"), temp.path());
    let model = ScriptedModel::new(vec![Ok(code_reply("hello.sh", "echo 'Hello, World!'"))]);
    let mut search = ScriptedSearch::default();
    let sandbox = sh_sandbox(workspace);

    let outcome = run_cycle(
        &mut session,
        &model,
        &mut search,
        &sandbox,
        &quick_config(3),
        &CancelToken::new(),
        |_| {},
    )
    .expect("cycle");

    assert_eq!(outcome.attempts_used, 1);
    match outcome.stop {
        CycleStop::Solved { result } => {
            assert_eq!(result.stdout, "Hello, World!\n");
            assert_eq!(result.exit_code, Some(0));
        }
        other => panic!("expected solved, got {other:?}"),
    }
    assert!(temp.path().join("hello.sh").exists());
    assert!(session.summary(true).contains("task solved"));
}

/// Every CODE execution fails with a non-zero exit; after the budget is
/// consumed the persisted status shows full progress.
#[test]
fn exhaustion_after_repeated_execution_failures() {
    let (temp, workspace) = temp_workspace();
    let mut session = Session::new(Task::new("task"), temp.path());
    let failing = code_reply("broken.sh", "echo oops >&2; exit 1");
    let model = ScriptedModel::new(vec![
        Ok(failing.clone()),
        Ok(failing.clone()),
        Ok(failing),
    ]);
    let mut search = ScriptedSearch::default();
    let sandbox = sh_sandbox(workspace);

    let outcome = run_cycle(
        &mut session,
        &model,
        &mut search,
        &sandbox,
        &quick_config(3),
        &CancelToken::new(),
        |_| {},
    )
    .expect("cycle");

    assert_eq!(outcome.attempts_used, 3);
    assert_eq!(outcome.stop, CycleStop::Exhausted);
    assert_eq!(session.history().len(), 3);

    let status = load_status(&status_path(temp.path())).expect("status");
    assert_eq!(status.progress, 1.0);
    assert_eq!(status.current_step, "fix execution error");
    assert!(session.summary(false).contains("task not solved"));
}

/// Validation against a user-supplied expectation: a wrong first attempt is
/// recorded and the corrected second attempt ends the session.
#[test]
fn mismatched_output_retries_until_expected_matches() {
    let (temp, workspace) = temp_workspace();
    let task = Task {
        expected_output: Some("42".to_string()),
        ..Task::new("print the answer")
    };
    let mut session = Session::new(task, temp.path());
    let model = ScriptedModel::new(vec![
        Ok(code_reply("answer.sh", "echo 41")),
        Ok(code_reply("answer.sh", "echo 42")),
    ]);
    let mut search = ScriptedSearch::default();
    let sandbox = sh_sandbox(workspace);

    let outcome = run_cycle(
        &mut session,
        &model,
        &mut search,
        &sandbox,
        &quick_config(3),
        &CancelToken::new(),
        |_| {},
    )
    .expect("cycle");

    assert_eq!(outcome.attempts_used, 2);
    assert!(matches!(outcome.stop, CycleStop::Solved { .. }));
    // The second write fully replaced the first file.
    let contents = std::fs::read_to_string(temp.path().join("answer.sh")).expect("read");
    assert_eq!(contents, "echo 42");
    assert!(
        session
            .error_log()
            .iter()
            .any(|e| e.contains("validation failed"))
    );
}

/// An out-of-vocabulary command is rejected before touching the sandbox and
/// the loop keeps going.
#[test]
fn unsupported_command_is_rejected_and_loop_continues() {
    let (temp, workspace) = temp_workspace();
    let mut session = Session::new(Task::new("task"), temp.path());
    let command_reply =
        "[ACTION]\nCOMMAND\n[CONTENT]\npip freeze > requirements.txt\n".to_string();
    let model = ScriptedModel::new(vec![
        Ok(command_reply),
        Ok(code_reply("done.sh", "echo 'Hello, World!'")),
    ]);
    let mut search = ScriptedSearch::default();
    let sandbox = sh_sandbox(workspace);

    let outcome = run_cycle(
        &mut session,
        &model,
        &mut search,
        &sandbox,
        &quick_config(3),
        &CancelToken::new(),
        |_| {},
    )
    .expect("cycle");

    assert_eq!(outcome.attempts_used, 2);
    assert!(matches!(outcome.stop, CycleStop::Solved { .. }));
    assert!(
        session
            .error_log()
            .iter()
            .any(|e| e.contains("unsupported command"))
    );
    // Nothing was written by the rejected command.
    assert!(!temp.path().join("requirements.txt").exists());

    let status = load_status(&status_path(temp.path())).expect("status");
    assert_eq!(status.current_step, "configure environment");
}

/// A SEARCH action consults the collaborator, records the step, and the
/// session proceeds to a solving CODE action.
#[test]
fn search_then_code_session() {
    let (temp, workspace) = temp_workspace();
    let mut session = Session::new(Task::new("task"), temp.path());
    let search_reply = "[ACTION]\nSEARCH\n[CONTENT]\nshell printf formatting\n".to_string();
    let model = ScriptedModel::new(vec![
        Ok(search_reply),
        Ok(code_reply("solution.sh", "printf 'Hello, World!\\n'")),
    ]);
    let mut search = ScriptedSearch::new(vec![Ok(vec![SearchHit {
        title: "printf manual".to_string(),
        link: "https://example.com/printf".to_string(),
        snippet: "formatting directives".to_string(),
    }])]);
    let sandbox = sh_sandbox(workspace);

    let outcome = run_cycle(
        &mut session,
        &model,
        &mut search,
        &sandbox,
        &quick_config(3),
        &CancelToken::new(),
        |_| {},
    )
    .expect("cycle");

    assert_eq!(outcome.attempts_used, 2);
    assert!(matches!(outcome.stop, CycleStop::Solved { .. }));
    assert_eq!(session.history()[0].action.kind(), "search");
    assert!(session.error_log().is_empty());
}
