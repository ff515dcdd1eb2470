//! Development cycle controller: generate → parse → act → validate → retry.
//!
//! One logical worker per session. The loop is strictly sequential; a host
//! may run it off its main thread to keep a front end responsive, but no two
//! actions are ever dispatched concurrently. Every suspension point (model
//! call, subprocess) carries its own timeout, so the loop never blocks
//! indefinitely.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::parser::{self, ParsedReply};
use crate::core::types::{Action, Attempt, ExecutionResult, ProgressState};
use crate::core::validator::validate;
use crate::io::model::{GenerateRequest, ModelClient};
use crate::io::prompt::{PromptBuilder, PromptInputs, SYSTEM_INSTRUCTION};
use crate::io::sandbox::SandboxExec;
use crate::io::search::SearchProvider;
use crate::io::tracker::{StatusDocument, status_path, write_status};
use crate::session::Session;

/// Budget and pacing for one session's loop.
#[derive(Debug, Clone)]
pub struct CycleConfig {
    /// Attempt budget; the loop fails once it is consumed.
    pub max_attempts: u32,
    /// Wall-clock budget for one iteration's generation phase. Transport
    /// retries happen in place inside this window and do not consume the
    /// attempt budget; an expired window does.
    pub iteration_timeout: Duration,
    /// Pause between transport retries.
    pub retry_backoff: Duration,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            iteration_timeout: Duration::from_secs(5 * 60),
            retry_backoff: Duration::from_secs(1),
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleStop {
    /// A CODE action executed and validated; carries the triggering result.
    Solved { result: ExecutionResult },
    /// The attempt budget was consumed without a validated execution.
    Exhausted,
    /// The host requested cancellation between iterations.
    Cancelled,
}

/// Summary of a cycle invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub attempts_used: u32,
    pub stop: CycleStop,
}

/// Cooperative cancellation flag, checked at the top of each iteration.
///
/// An in-flight subprocess is not forcibly killed by cancellation; its own
/// timeout bounds it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Drive the development cycle until the task is solved, the attempt budget
/// is exhausted, or the host cancels.
///
/// Individual attempt failures (sandbox, command, search, parse) never abort
/// the session; they are recorded and surfaced into the next prompt so the
/// model can self-correct. Only I/O failures of the tracker itself propagate
/// as errors.
#[instrument(skip_all, fields(max_attempts = config.max_attempts))]
pub fn run_cycle<M, S, X, F>(
    session: &mut Session,
    model: &M,
    search: &mut S,
    sandbox: &X,
    config: &CycleConfig,
    cancel: &CancelToken,
    mut on_attempt: F,
) -> Result<CycleOutcome>
where
    M: ModelClient,
    S: SearchProvider,
    X: SandboxExec,
    F: FnMut(&Attempt),
{
    let status_file = status_path(session.workspace_root());
    let mut progress = ProgressState::initial();
    write_status(&status_file, &StatusDocument::new(session.task(), &progress))?;

    let prompts = PromptBuilder::new();

    for index in 1..=config.max_attempts {
        if cancel.is_cancelled() {
            info!(iter = index, "cancellation requested, stopping");
            return Ok(CycleOutcome {
                attempts_used: index - 1,
                stop: CycleStop::Cancelled,
            });
        }

        info!(iter = index, budget = config.max_attempts, "starting iteration");
        let deadline = Instant::now() + config.iteration_timeout;

        let request = GenerateRequest {
            system: SYSTEM_INSTRUCTION.to_string(),
            prompt: prompts.build(&prompt_inputs(session, &progress)),
        };
        let reply = match generate_with_retry(model, &request, deadline, config.retry_backoff) {
            Ok(reply) => reply,
            Err(err) => {
                // The generation window expired; this consumes the attempt.
                session.record_error(format!("generation failed: {err:#}"));
                track(&status_file, session, &mut progress, index, config, &[])?;
                continue;
            }
        };

        let parsed = parser::parse_reply(&reply);
        if let Some(expected) = &parsed.expected_output {
            debug!("adopting model-proposed expected output");
            session.note_expected_output(expected);
        }

        let action = resolve_action(parsed.action.clone());
        let ParsedReply {
            rationale,
            expected_output,
            next_steps,
            ..
        } = parsed;

        let mut execution: Option<ExecutionResult> = None;
        let mut validated = false;
        match &action {
            Action::Code { filename, source } => {
                let result = sandbox.run_code(filename, source);
                if result.succeeded {
                    let path = session.workspace_root().join(filename);
                    session.record_generated_file(path);
                }
                validated = validate(&result, session.task(), session.model_expected_output());
                if !validated {
                    session.record_error(format!(
                        "validation failed: {}",
                        result.failure_message()
                    ));
                    progress.current_step = "fix execution error".to_string();
                }
                execution = Some(result);
            }
            Action::Command { line } => {
                // Command outcomes are recorded but never end the loop.
                let result = sandbox.run_command(line);
                if result.succeeded {
                    info!(command = %line, "command succeeded");
                } else {
                    session.record_error(format!(
                        "command failed: {}",
                        result.failure_message()
                    ));
                }
                progress.current_step = "configure environment".to_string();
                execution = Some(result);
            }
            Action::Search { keywords } => {
                match search.search(keywords) {
                    Ok(hits) => {
                        info!(count = hits.len(), "search returned results");
                        for hit in hits.iter().take(3) {
                            info!(title = %hit.title, link = %hit.link, "search hit");
                        }
                    }
                    Err(err) => {
                        session.record_error(format!("search failed: {err:#}"));
                    }
                }
                progress.current_step = "gather reference material".to_string();
            }
            Action::Unparsed { reason, .. } => {
                // Still unresolvable after reclassification: skip execution
                // for this iteration entirely.
                session.record_error(format!("unparsed reply: {reason}"));
                progress.current_step = "recover from malformed reply".to_string();
            }
        }

        let attempt = Attempt {
            index,
            raw_reply: reply,
            rationale,
            action,
            model_expected_output: expected_output,
            next_steps,
            execution,
            validated,
        };
        on_attempt(&attempt);
        let solved_result = attempt
            .execution
            .clone()
            .filter(|_| attempt.validated);
        let tracked_steps = attempt.next_steps.clone();
        session.record_attempt(attempt);

        if let Some(result) = solved_result {
            info!(iter = index, "code validated, task solved");
            return Ok(CycleOutcome {
                attempts_used: index,
                stop: CycleStop::Solved { result },
            });
        }

        track(
            &status_file,
            session,
            &mut progress,
            index,
            config,
            &tracked_steps,
        )?;
    }

    warn!("attempt budget exhausted");
    Ok(CycleOutcome {
        attempts_used: config.max_attempts,
        stop: CycleStop::Exhausted,
    })
}

/// Apply the last-resort reclassification to unparsed replies.
fn resolve_action(action: Action) -> Action {
    match action {
        Action::Unparsed { raw, reason } => parser::reclassify(&raw).unwrap_or_else(|| {
            debug!("reclassification did not recover an action");
            Action::Unparsed { raw, reason }
        }),
        other => other,
    }
}

/// Tracking step: advance progress, replace next steps when the reply carried
/// some (otherwise carry the previous ones forward), persist the snapshot.
fn track(
    status_file: &std::path::Path,
    session: &Session,
    progress: &mut ProgressState,
    iterations_done: u32,
    config: &CycleConfig,
    next_steps: &[String],
) -> Result<()> {
    progress.progress =
        (f64::from(iterations_done) / f64::from(config.max_attempts)).min(1.0);
    if !next_steps.is_empty() {
        progress.next_steps = next_steps.to_vec();
    }
    progress.model_expected_output = session.model_expected_output().map(str::to_string);
    write_status(status_file, &StatusDocument::new(session.task(), progress))
        .context("persist status document")
}

fn prompt_inputs(session: &Session, progress: &ProgressState) -> PromptInputs {
    let task = session.task();
    PromptInputs {
        goal: task.goal.clone(),
        notes: task.notes.clone(),
        recent_files: session.recent_files(3),
        recent_errors: session.recent_errors(3),
        current_step: progress.current_step.clone(),
        progress: progress.progress,
        next_steps: progress.next_steps.clone(),
        expected_output: task.expected_output.clone(),
        auto_expect: task.auto_expect,
    }
}

/// Retry the model call in place until it succeeds or the iteration window
/// closes. This is the only self-retry inside the loop.
fn generate_with_retry<M: ModelClient>(
    model: &M,
    request: &GenerateRequest,
    deadline: Instant,
    backoff: Duration,
) -> Result<String> {
    loop {
        match model.generate(request) {
            Ok(reply) => return Ok(reply),
            Err(err) => {
                warn!(err = %format!("{err:#}"), "generation failed, retrying in place");
                if Instant::now() + backoff >= deadline {
                    return Err(err.context("generation retries exhausted"));
                }
                thread::sleep(backoff);
            }
        }
    }
}
